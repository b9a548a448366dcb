//! Core types for the savings-group store
//!
//! All types are designed for:
//! - Deterministic serialization (bincode at rest, JSON in the sync queue)
//! - Exact arithmetic (Decimal for money)
//! - Exhaustive matches for every tagged value shown to people

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an application user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Group leader (default for self-registration)
    Leader,
    /// Plain group member
    Member,
    /// Village planning committee member
    Vpc,
    /// Administrator
    Admin,
}

/// Credential holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque id
    pub id: String,
    /// Display name
    pub name: String,
    /// Phone number (unique)
    pub phone: String,
    /// SHA-256 hex digest of the PIN
    pub pin_hash: String,
    /// Role tag
    pub role: UserRole,
    /// Groups this user belongs to
    pub group_ids: Vec<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Kind of savings circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// Mutual savings and credit group
    Mutuelle,
    /// Rotating savings circle
    Sol,
    /// Village planning committee
    Vpc,
    /// Community-based organisation
    Cbo,
}

impl GroupType {
    /// Stable tag used in indexes and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Mutuelle => "mutuelle",
            GroupType::Sol => "sol",
            GroupType::Vpc => "vpc",
            GroupType::Cbo => "cbo",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            GroupType::Mutuelle => "Mutuelle",
            GroupType::Sol => "Sol",
            GroupType::Vpc => "VPC",
            GroupType::Cbo => "CBO",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a group meets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingFrequency {
    /// Every week
    Weekly,
    /// Every two weeks
    Biweekly,
    /// Every month
    Monthly,
}

impl MeetingFrequency {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            MeetingFrequency::Weekly => "Chak semèn",
            MeetingFrequency::Biweekly => "Chak 2 semèn",
            MeetingFrequency::Monthly => "Chak mwa",
        }
    }
}

/// Savings circle with pooled totals
///
/// `member_count`, `total_savings` and `active_loans` are denormalized
/// aggregates. They are only ever changed by the ledger operations that
/// create or remove the records they summarize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Opaque id
    pub id: String,
    /// Name
    pub name: String,
    /// Kind of circle
    #[serde(rename = "type")]
    pub group_type: GroupType,
    /// Free-form description
    pub description: String,
    /// Communal section
    pub section: String,
    /// Leader user id (may be empty)
    pub leader_id: String,
    /// Number of live members
    pub member_count: u32,
    /// Money currently in the pool
    pub total_savings: Decimal,
    /// Number of loans not yet paid
    pub active_loans: u32,
    /// Meeting day name
    pub meeting_day: String,
    /// Meeting frequency
    pub meeting_frequency: MeetingFrequency,
    /// Optional chat invite link
    pub whatsapp_link: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new group; aggregates always start at zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    /// Name
    pub name: String,
    /// Kind of circle
    #[serde(rename = "type")]
    pub group_type: GroupType,
    /// Free-form description
    pub description: String,
    /// Communal section
    pub section: String,
    /// Leader user id (may be empty)
    pub leader_id: String,
    /// Meeting day name
    pub meeting_day: String,
    /// Meeting frequency
    pub meeting_frequency: MeetingFrequency,
    /// Optional chat invite link
    pub whatsapp_link: Option<String>,
}

/// Role of a member inside their group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Leader
    Leader,
    /// Treasurer
    Treasurer,
    /// Secretary
    Secretary,
    /// Plain member
    Member,
}

impl MemberRole {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            MemberRole::Leader => "Lidè",
            MemberRole::Treasurer => "Trezorye",
            MemberRole::Secretary => "Sekretè",
            MemberRole::Member => "Manm",
        }
    }

    /// Badge color
    pub fn color(&self) -> &'static str {
        match self {
            MemberRole::Leader => "primary",
            MemberRole::Treasurer => "success",
            MemberRole::Secretary => "tertiary",
            MemberRole::Member => "medium",
        }
    }
}

/// Person belonging to exactly one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Opaque id
    pub id: String,
    /// Owning group
    pub group_id: String,
    /// Name
    pub name: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Role in the group
    pub role: MemberRole,
    /// Lifetime contributions
    pub total_contributions: Decimal,
    /// Lifetime loan principal
    pub total_loans: Decimal,
    /// Contributions minus loan principal
    pub balance: Decimal,
    /// Joined timestamp
    pub joined_at: DateTime<Utc>,
    /// Whether the member is active
    pub is_active: bool,
}

/// Caller-supplied fields for a new member; totals always start at zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    /// Name
    pub name: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Role in the group
    pub role: MemberRole,
}

/// Deposit by a member into a group's pool (immutable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// Opaque id
    pub id: String,
    /// Group the money went into
    pub group_id: String,
    /// Contributing member
    pub member_id: String,
    /// Member name at time of recording
    pub member_name: String,
    /// Amount deposited
    pub amount: Decimal,
    /// Meeting date
    pub date: DateTime<Utc>,
    /// Meeting sequence number
    pub meeting_number: u32,
    /// Optional notes
    pub notes: Option<String>,
    /// Who recorded it
    pub recorded_by: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Descriptive fields attached to a contribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionMeta {
    /// Meeting date (defaults to now)
    pub date: Option<DateTime<Utc>>,
    /// Meeting sequence number
    pub meeting_number: u32,
    /// Optional notes
    pub notes: Option<String>,
    /// Who recorded it
    pub recorded_by: String,
}

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Disbursed, not yet repaid
    Active,
    /// Fully repaid (terminal)
    Paid,
    /// Past due date while unpaid
    Overdue,
}

impl LoanStatus {
    /// Stable tag used in indexes and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Paid => "paid",
            LoanStatus::Overdue => "overdue",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Aktif",
            LoanStatus::Paid => "Peye",
            LoanStatus::Overdue => "An reta",
        }
    }

    /// Check if loan is in terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Paid)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Principal borrowed by a member against the group pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    /// Opaque id
    pub id: String,
    /// Lending group
    pub group_id: String,
    /// Borrowing member
    pub member_id: String,
    /// Member name at time of disbursement
    pub member_name: String,
    /// Principal
    pub amount: Decimal,
    /// Interest rate in percent
    pub interest_rate: Decimal,
    /// Principal plus interest, fixed at creation
    pub total_due: Decimal,
    /// Sum of all payments
    pub amount_paid: Decimal,
    /// Current status
    pub status: LoanStatus,
    /// Disbursement timestamp
    pub disbursed_at: DateTime<Utc>,
    /// Repayment deadline
    pub due_date: DateTime<Utc>,
    /// Payments in the order they were applied
    pub payments: Vec<LoanPayment>,
    /// Who approved the loan
    pub approved_by: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// `amount * (1 + interest_rate / 100)`, or `None` past the `Decimal` range
    pub fn compute_total_due(amount: Decimal, interest_rate: Decimal) -> Option<Decimal> {
        interest_rate
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|rate| Decimal::ONE.checked_add(rate))
            .and_then(|factor| amount.checked_mul(factor))
    }

    /// Amount still owed (never negative)
    pub fn outstanding(&self) -> Decimal {
        (self.total_due - self.amount_paid).max(Decimal::ZERO)
    }

    /// Whether the due date has passed without payoff
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.due_date < now
    }
}

/// Terms of a new loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    /// Principal
    pub amount: Decimal,
    /// Interest rate in percent
    pub interest_rate: Decimal,
    /// Repayment deadline
    pub due_date: DateTime<Utc>,
    /// Who approved the loan
    pub approved_by: String,
}

/// Repayment appended to a loan (immutable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPayment {
    /// Opaque id
    pub id: String,
    /// Loan being repaid
    pub loan_id: String,
    /// Amount repaid
    pub amount: Decimal,
    /// Payment date
    pub date: DateTime<Utc>,
    /// Who recorded it
    pub recorded_by: String,
}

/// Descriptive fields attached to a loan payment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMeta {
    /// Payment date (defaults to now)
    pub date: Option<DateTime<Utc>>,
    /// Who recorded it
    pub recorded_by: String,
}

// Leadership track

/// Role on the village planning committee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpcRole {
    /// Committee member
    Vpc,
    /// Coordinator
    Coordinator,
    /// Trainer
    Trainer,
}

/// Village planning committee member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcMember {
    /// Opaque id
    pub id: String,
    /// Name
    pub name: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Communal section
    pub section: String,
    /// Committee role
    pub role: VpcRole,
    /// Sum of hours over completed trainings
    pub training_hours: u32,
    /// Completed trainings
    pub trainings_completed: Vec<TrainingRecord>,
    /// Action plan ids this member leads
    pub projects_led: Vec<String>,
    /// Joined timestamp
    pub joined_at: DateTime<Utc>,
    /// Whether the member is active
    pub is_active: bool,
}

/// Caller-supplied fields for a new committee member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVpcMember {
    /// Name
    pub name: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// Communal section
    pub section: String,
    /// Committee role
    pub role: VpcRole,
}

/// Completed training attached to a committee member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    /// Opaque id
    pub id: String,
    /// Committee member
    pub vpc_member_id: String,
    /// Training taken
    pub training_id: String,
    /// Training name at time of completion
    pub training_name: String,
    /// Hours credited
    pub hours: u32,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
    /// Whether a certificate was issued
    pub certificate: bool,
}

/// Caller-supplied fields for a completed training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrainingRecord {
    /// Training taken
    pub training_id: String,
    /// Training name
    pub training_name: String,
    /// Hours credited
    pub hours: u32,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
    /// Whether a certificate was issued
    pub certificate: bool,
}

/// Training category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingCategory {
    /// Leadership
    Leadership,
    /// Project management
    ProjectManagement,
    /// Civic engagement
    Civic,
    /// Technical skills
    Technical,
    /// Entrepreneurship
    Entrepreneurship,
}

impl TrainingCategory {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            TrainingCategory::Leadership => "Lidèchip",
            TrainingCategory::ProjectManagement => "Jesyon Pwojè",
            TrainingCategory::Civic => "Angajman Sivik",
            TrainingCategory::Technical => "Teknik",
            TrainingCategory::Entrepreneurship => "Antreprenarya",
        }
    }

    /// Display icon
    pub fn icon(&self) -> &'static str {
        match self {
            TrainingCategory::Leadership => "👑",
            TrainingCategory::ProjectManagement => "📋",
            TrainingCategory::Civic => "🏛️",
            TrainingCategory::Technical => "🔧",
            TrainingCategory::Entrepreneurship => "💼",
        }
    }
}

/// Training course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    /// Opaque id
    pub id: String,
    /// Name
    pub name: String,
    /// Name in Haitian Creole
    pub name_creole: String,
    /// Description
    pub description: String,
    /// Category
    pub category: TrainingCategory,
    /// Course length in hours
    pub hours: u32,
    /// Course materials
    pub materials: Vec<String>,
    /// Whether the course is offered
    pub is_active: bool,
}

/// Caller-supplied fields for a new training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTraining {
    /// Name
    pub name: String,
    /// Name in Haitian Creole
    pub name_creole: String,
    /// Description
    pub description: String,
    /// Category
    pub category: TrainingCategory,
    /// Course length in hours
    pub hours: u32,
    /// Course materials
    pub materials: Vec<String>,
}

/// Action plan progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Being planned
    Planning,
    /// Under way
    InProgress,
    /// Done
    Completed,
}

impl PlanStatus {
    /// Stable tag used in indexes and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            PlanStatus::Planning => "Planifikasyon",
            PlanStatus::InProgress => "An kou",
            PlanStatus::Completed => "Fini",
        }
    }

    /// Badge color
    pub fn color(&self) -> &'static str {
        match self {
            PlanStatus::Planning => "warning",
            PlanStatus::InProgress => "primary",
            PlanStatus::Completed => "success",
        }
    }
}

/// Action plan priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPriority {
    /// High
    High,
    /// Medium
    Medium,
    /// Low
    Low,
}

/// Sector an action plan addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSector {
    /// Health
    Health,
    /// Education
    Education,
    /// Water
    Water,
    /// Infrastructure
    Infrastructure,
    /// Economy
    Economic,
    /// Environment
    Environment,
}

impl PlanSector {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            PlanSector::Health => "Sante",
            PlanSector::Education => "Edikasyon",
            PlanSector::Water => "Dlo",
            PlanSector::Infrastructure => "Enfrastrikti",
            PlanSector::Economic => "Ekonomi",
            PlanSector::Environment => "Anviwònman",
        }
    }
}

/// Community action plan led by a committee member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityActionPlan {
    /// Opaque id
    pub id: String,
    /// Communal section
    pub section: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Progress
    pub status: PlanStatus,
    /// Priority
    pub priority: PlanPriority,
    /// Sector
    pub sector: PlanSector,
    /// Lead committee member id
    pub lead_vpc_id: String,
    /// Participant ids
    pub participants: Vec<String>,
    /// Optional budget
    pub budget: Option<Decimal>,
    /// Start date
    pub start_date: Option<DateTime<Utc>>,
    /// Completion date (set when status becomes completed)
    pub completed_date: Option<DateTime<Utc>>,
    /// Progress notes, oldest first
    pub updates: Vec<PlanUpdate>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActionPlan {
    /// Communal section
    pub section: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Progress
    pub status: PlanStatus,
    /// Priority
    pub priority: PlanPriority,
    /// Sector
    pub sector: PlanSector,
    /// Lead committee member id
    pub lead_vpc_id: String,
    /// Participant ids
    pub participants: Vec<String>,
    /// Optional budget
    pub budget: Option<Decimal>,
    /// Start date
    pub start_date: Option<DateTime<Utc>>,
}

/// Progress note on an action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    /// Opaque id
    pub id: String,
    /// Plan this note belongs to
    pub plan_id: String,
    /// Text
    pub content: String,
    /// Author
    pub created_by: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Attached image references
    pub images: Vec<String>,
}

/// Workshop programme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkshopType {
    /// Pase Mayèt
    PaseMayet,
    /// Fanm Djanm
    FanmDjanm,
    /// Dyalòg
    Dyalog,
    /// Ankadreman
    Ankadre,
    /// Anything else
    Other,
}

impl WorkshopType {
    /// Stable tag used in indexes and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkshopType::PaseMayet => "pase_mayet",
            WorkshopType::FanmDjanm => "fanm_djanm",
            WorkshopType::Dyalog => "dyalog",
            WorkshopType::Ankadre => "ankadre",
            WorkshopType::Other => "other",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            WorkshopType::PaseMayet => "Pase Mayèt",
            WorkshopType::FanmDjanm => "Fanm Djanm",
            WorkshopType::Dyalog => "Dyalòg",
            WorkshopType::Ankadre => "Ankadreman",
            WorkshopType::Other => "Lòt",
        }
    }
}

/// Community workshop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    /// Opaque id
    pub id: String,
    /// Name
    pub name: String,
    /// Name in Haitian Creole
    pub name_creole: String,
    /// Programme
    #[serde(rename = "type")]
    pub workshop_type: WorkshopType,
    /// Date held
    pub date: DateTime<Utc>,
    /// Communal section
    pub section: String,
    /// Venue
    pub location: String,
    /// Facilitator committee member id
    pub facilitator_id: String,
    /// Number of attendees
    pub attendee_count: u32,
    /// Optional description
    pub description: Option<String>,
    /// Topics covered
    pub topics: Vec<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new workshop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkshop {
    /// Name
    pub name: String,
    /// Name in Haitian Creole
    pub name_creole: String,
    /// Programme
    #[serde(rename = "type")]
    pub workshop_type: WorkshopType,
    /// Date held
    pub date: DateTime<Utc>,
    /// Communal section
    pub section: String,
    /// Venue
    pub location: String,
    /// Facilitator committee member id
    pub facilitator_id: String,
    /// Number of attendees
    pub attendee_count: u32,
    /// Optional description
    pub description: Option<String>,
    /// Topics covered
    pub topics: Vec<String>,
}

/// Stored versus recomputed aggregates of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAudit {
    /// Group audited
    pub group_id: String,
    /// Aggregates as stored on the group record
    pub stored: GroupTotals,
    /// Aggregates recomputed from members, contributions and loans
    pub computed: GroupTotals,
    /// Members whose balance disagrees with their totals
    pub inconsistent_members: Vec<String>,
}

impl GroupAudit {
    /// Whether stored aggregates match the underlying records
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed && self.inconsistent_members.is_empty()
    }
}

/// The three denormalized aggregates of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotals {
    /// Live members
    pub member_count: u32,
    /// Money in the pool
    pub total_savings: Decimal,
    /// Loans not yet paid
    pub active_loans: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_total_due() {
        let due = Loan::compute_total_due(Decimal::from(300), Decimal::from(10));
        assert_eq!(due, Some(Decimal::from(330)));

        let due = Loan::compute_total_due(Decimal::new(100050, 2), Decimal::new(25, 1));
        assert_eq!(due, Some(Decimal::new(102551250, 5)));

        assert_eq!(Loan::compute_total_due(Decimal::MAX, Decimal::from(10)), None);
        assert_eq!(
            Loan::compute_total_due(Decimal::MAX, Decimal::ZERO),
            Some(Decimal::MAX)
        );
    }

    #[test]
    fn test_loan_status_terminal() {
        assert!(LoanStatus::Paid.is_terminal());
        assert!(!LoanStatus::Active.is_terminal());
        assert!(!LoanStatus::Overdue.is_terminal());
    }

    #[test]
    fn test_loan_past_due() {
        let now = Utc::now();
        let mut loan = Loan {
            id: "l1".into(),
            group_id: "g1".into(),
            member_id: "m1".into(),
            member_name: "Marie Jean".into(),
            amount: Decimal::from(300),
            interest_rate: Decimal::from(10),
            total_due: Decimal::from(330),
            amount_paid: Decimal::from(100),
            status: LoanStatus::Active,
            disbursed_at: now - Duration::days(40),
            due_date: now - Duration::days(10),
            payments: vec![],
            approved_by: "Rose Pierre".into(),
            created_at: now - Duration::days(40),
        };

        assert!(loan.is_past_due(now));
        assert_eq!(loan.outstanding(), Decimal::from(230));

        loan.status = LoanStatus::Paid;
        assert!(!loan.is_past_due(now));
    }

    #[test]
    fn test_labels() {
        assert_eq!(MemberRole::Treasurer.label(), "Trezorye");
        assert_eq!(MemberRole::Secretary.color(), "tertiary");
        assert_eq!(LoanStatus::Overdue.label(), "An reta");
        assert_eq!(TrainingCategory::ProjectManagement.label(), "Jesyon Pwojè");
        assert_eq!(PlanStatus::InProgress.color(), "primary");
        assert_eq!(PlanSector::Water.label(), "Dlo");
        assert_eq!(MeetingFrequency::Biweekly.label(), "Chak 2 semèn");
        assert_eq!(GroupType::Cbo.label(), "CBO");
    }

    #[test]
    fn test_tags_match_serde() {
        let tag = serde_json::to_value(PlanStatus::InProgress).unwrap();
        assert_eq!(tag, serde_json::json!(PlanStatus::InProgress.as_str()));

        let tag = serde_json::to_value(WorkshopType::PaseMayet).unwrap();
        assert_eq!(tag, serde_json::json!(WorkshopType::PaseMayet.as_str()));
    }
}
