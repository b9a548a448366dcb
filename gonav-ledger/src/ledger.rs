//! Main ledger orchestration layer
//!
//! This module ties together storage, the sync queue, and the actor into
//! the caller-facing API for savings groups.
//!
//! Every operation runs as one job on the ledger actor and commits all of
//! its writes in one [`Transaction`](crate::storage::Transaction), so the
//! denormalized aggregates on groups and members never observe a partial
//! update.
//!
//! # Example
//!
//! ```no_run
//! use gonav_ledger::{Config, Ledger};
//! use gonav_ledger::types::ContributionMeta;
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> gonav_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     // let contribution = ledger
//!     //     .record_contribution(&group_id, &member_id, Decimal::from(500), ContributionMeta::default())
//!     //     .await?;
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    storage::new_id,
    sync::{StatusSignal, SyncQueueEntry, SyncStatus},
    types::{
        Contribution, ContributionMeta, Group, GroupAudit, GroupTotals, GroupType, Loan,
        LoanPayment, LoanStatus, LoanTerms, Member, NewGroup, NewMember, PaymentMeta,
    },
    Config, Error, Result, Store,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for all store access
    handle: LedgerHandle,

    /// Sync status broadcast
    signal: StatusSignal,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("data_dir", &self.config.data_dir)
            .field("status", &self.signal.current())
            .finish()
    }
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("metrics registry: {}", e)))?;

        // Open storage
        let store = Arc::new(Store::open(&config, metrics.clone())?);
        let signal = store.sync().signal().clone();

        // Spawn actor
        let handle = spawn_ledger_actor(store, config.actor.mailbox_capacity);

        tracing::info!(
            service = %config.service_name,
            pending = signal.current().pending_changes,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            signal,
            metrics,
            config,
        })
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one operation on the actor, timing and logging it
    pub(crate) async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let started = Instant::now();
        let result = self.handle.execute(f).await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            if e.is_storage() {
                tracing::error!(operation, error = %e, "Ledger operation failed");
            } else {
                tracing::debug!(operation, error = %e, "Ledger operation rejected");
            }
        }
        result
    }

    // Compound operations

    /// Record a contribution and credit it to the member and the group pool
    pub async fn record_contribution(
        &self,
        group_id: &str,
        member_id: &str,
        amount: Decimal,
        meta: ContributionMeta,
    ) -> Result<Contribution> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();

        self.run("record_contribution", move |store| {
            ensure_positive(amount, "contribution")?;

            let mut group: Group = store.require(&group_id)?;
            let mut member = require_member_of(store, &member_id, &group.id)?;

            let now = Utc::now();
            let contribution = Contribution {
                id: String::new(),
                group_id: group.id.clone(),
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                amount,
                date: meta.date.unwrap_or(now),
                meeting_number: meta.meeting_number,
                notes: meta.notes,
                recorded_by: meta.recorded_by,
                created_at: now,
            };

            member.total_contributions =
                checked(member.total_contributions.checked_add(amount), "member contributions")?;
            member.balance = checked(member.balance.checked_add(amount), "member balance")?;

            group.total_savings =
                checked(group.total_savings.checked_add(amount), "group savings")?;
            group.updated_at = now;

            let mut txn = store.transaction();
            let contribution = txn.insert(contribution)?;
            txn.put(member)?;
            txn.put(group)?;
            txn.commit()?;

            tracing::debug!(
                group_id = %contribution.group_id,
                member_id = %contribution.member_id,
                amount = %amount,
                "Contribution recorded"
            );
            Ok(contribution)
        })
        .await
    }

    /// Disburse a loan from the group pool to a member
    pub async fn issue_loan(
        &self,
        group_id: &str,
        member_id: &str,
        terms: LoanTerms,
    ) -> Result<Loan> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();

        self.run("issue_loan", move |store| {
            ensure_positive(terms.amount, "loan")?;
            if terms.interest_rate < Decimal::ZERO {
                return Err(Error::InvalidAmount(format!(
                    "interest rate must not be negative, got {}",
                    terms.interest_rate
                )));
            }

            let mut group: Group = store.require(&group_id)?;
            let mut member = require_member_of(store, &member_id, &group.id)?;

            let total_due = checked(
                Loan::compute_total_due(terms.amount, terms.interest_rate),
                "loan total due",
            )?;

            let now = Utc::now();
            let loan = Loan {
                id: String::new(),
                group_id: group.id.clone(),
                member_id: member.id.clone(),
                member_name: member.name.clone(),
                amount: terms.amount,
                interest_rate: terms.interest_rate,
                total_due,
                amount_paid: Decimal::ZERO,
                status: LoanStatus::Active,
                disbursed_at: now,
                due_date: terms.due_date,
                payments: Vec::new(),
                approved_by: terms.approved_by,
                created_at: now,
            };

            member.total_loans =
                checked(member.total_loans.checked_add(terms.amount), "member loans")?;
            member.balance = checked(member.balance.checked_sub(terms.amount), "member balance")?;

            group.active_loans = group
                .active_loans
                .checked_add(1)
                .ok_or_else(|| Error::InvalidState(format!("group {} loan count full", group.id)))?;
            group.total_savings =
                checked(group.total_savings.checked_sub(terms.amount), "group savings")?;
            group.updated_at = now;

            let mut txn = store.transaction();
            let loan = txn.insert(loan)?;
            txn.put(member)?;
            txn.put(group)?;
            txn.commit()?;

            tracing::debug!(
                loan_id = %loan.id,
                group_id = %loan.group_id,
                total_due = %loan.total_due,
                "Loan issued"
            );
            Ok(loan)
        })
        .await
    }

    /// Apply a repayment; paying off the loan returns the payment to the pool
    pub async fn apply_payment(
        &self,
        loan_id: &str,
        amount: Decimal,
        meta: PaymentMeta,
    ) -> Result<Loan> {
        let loan_id = loan_id.to_string();

        self.run("apply_payment", move |store| {
            ensure_positive(amount, "payment")?;

            let mut loan: Loan = store.require(&loan_id)?;
            if loan.status.is_terminal() {
                return Err(Error::InvalidState(format!(
                    "loan {} is already {}",
                    loan.id, loan.status
                )));
            }

            let amount_paid = checked(loan.amount_paid.checked_add(amount), "loan amount paid")?;

            let now = Utc::now();
            loan.payments.push(LoanPayment {
                id: new_id(),
                loan_id: loan.id.clone(),
                amount,
                date: meta.date.unwrap_or(now),
                recorded_by: meta.recorded_by,
            });
            loan.amount_paid = amount_paid;

            let mut pool = None;
            if loan.amount_paid >= loan.total_due {
                loan.status = LoanStatus::Paid;

                match store.get::<Group>(&loan.group_id)? {
                    Some(mut group) => {
                        group.active_loans = group.active_loans.saturating_sub(1);
                        group.total_savings =
                            checked(group.total_savings.checked_add(amount), "group savings")?;
                        group.updated_at = now;
                        pool = Some(group);
                    }
                    None => tracing::warn!(
                        loan_id = %loan.id,
                        group_id = %loan.group_id,
                        "Paid-off loan belongs to a missing group"
                    ),
                }
            }

            let mut txn = store.transaction();
            let loan = txn.put(loan)?;
            if let Some(group) = pool {
                txn.put(group)?;
            }
            txn.commit()?;

            tracing::debug!(
                loan_id = %loan.id,
                amount_paid = %loan.amount_paid,
                status = %loan.status,
                "Payment applied"
            );
            Ok(loan)
        })
        .await
    }

    /// Add a member to a group
    pub async fn add_member(&self, group_id: &str, new_member: NewMember) -> Result<Member> {
        let group_id = group_id.to_string();

        self.run("add_member", move |store| {
            let mut group: Group = store.require(&group_id)?;

            let now = Utc::now();
            let member = Member {
                id: String::new(),
                group_id: group.id.clone(),
                name: new_member.name,
                phone: new_member.phone,
                role: new_member.role,
                total_contributions: Decimal::ZERO,
                total_loans: Decimal::ZERO,
                balance: Decimal::ZERO,
                joined_at: now,
                is_active: true,
            };

            group.member_count = group
                .member_count
                .checked_add(1)
                .ok_or_else(|| Error::InvalidState(format!("group {} member count full", group.id)))?;
            group.updated_at = now;

            let mut txn = store.transaction();
            let member = txn.insert(member)?;
            txn.put(group)?;
            txn.commit()?;

            Ok(member)
        })
        .await
    }

    /// Remove a member from their group
    pub async fn remove_member(&self, member_id: &str) -> Result<()> {
        let member_id = member_id.to_string();

        self.run("remove_member", move |store| {
            let member: Member = store.require(&member_id)?;

            let mut txn = store.transaction();
            txn.delete::<Member>(&member.id)?;

            match store.get::<Group>(&member.group_id)? {
                Some(mut group) => {
                    group.member_count = group.member_count.saturating_sub(1);
                    group.updated_at = Utc::now();
                    txn.put(group)?;
                }
                None => tracing::warn!(
                    member_id = %member.id,
                    group_id = %member.group_id,
                    "Removed member belongs to a missing group"
                ),
            }

            txn.commit()?;
            Ok(())
        })
        .await
    }

    // Groups

    /// Create a group with zeroed aggregates
    pub async fn create_group(&self, new_group: NewGroup) -> Result<Group> {
        self.run("create_group", move |store| {
            let now = Utc::now();
            store.insert(Group {
                id: String::new(),
                name: new_group.name,
                group_type: new_group.group_type,
                description: new_group.description,
                section: new_group.section,
                leader_id: new_group.leader_id,
                member_count: 0,
                total_savings: Decimal::ZERO,
                active_loans: 0,
                meeting_day: new_group.meeting_day,
                meeting_frequency: new_group.meeting_frequency,
                whatsapp_link: new_group.whatsapp_link,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    /// Get group by id
    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let group_id = group_id.to_string();
        self.run("get_group", move |store| store.get(&group_id)).await
    }

    /// All groups
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.run("list_groups", |store| store.list_all()).await
    }

    /// Groups of one kind
    pub async fn list_groups_by_type(&self, group_type: GroupType) -> Result<Vec<Group>> {
        self.run("list_groups_by_type", move |store| {
            store.list_by_key("type", group_type.as_str())
        })
        .await
    }

    /// Groups in one section
    pub async fn list_groups_by_section(&self, section: &str) -> Result<Vec<Group>> {
        let section = section.to_string();
        self.run("list_groups_by_section", move |store| {
            store.list_by_key("section", &section)
        })
        .await
    }

    /// Update a group's descriptive fields
    ///
    /// `member_count`, `total_savings` and `active_loans` are owned by the
    /// compound operations; the stored values are kept.
    pub async fn update_group(&self, group: Group) -> Result<Group> {
        self.run("update_group", move |store| {
            let stored: Group = store.require(&group.id)?;
            store.put(Group {
                member_count: stored.member_count,
                total_savings: stored.total_savings,
                active_loans: stored.active_loans,
                created_at: stored.created_at,
                updated_at: Utc::now(),
                ..group
            })
        })
        .await
    }

    /// Delete a group record
    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        let group_id = group_id.to_string();
        self.run("delete_group", move |store| store.delete::<Group>(&group_id))
            .await
    }

    // Members

    /// Get member by id
    pub async fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
        let member_id = member_id.to_string();
        self.run("get_member", move |store| store.get(&member_id)).await
    }

    /// Members of a group
    pub async fn list_members_by_group(&self, group_id: &str) -> Result<Vec<Member>> {
        let group_id = group_id.to_string();
        self.run("list_members_by_group", move |store| {
            store.list_by_key("groupId", &group_id)
        })
        .await
    }

    /// Update a member's descriptive fields
    ///
    /// Group membership and the money totals are kept from the stored record.
    pub async fn update_member(&self, member: Member) -> Result<Member> {
        self.run("update_member", move |store| {
            let stored: Member = store.require(&member.id)?;
            store.put(Member {
                group_id: stored.group_id,
                total_contributions: stored.total_contributions,
                total_loans: stored.total_loans,
                balance: stored.balance,
                joined_at: stored.joined_at,
                ..member
            })
        })
        .await
    }

    // Contributions

    /// Contributions recorded against a group
    pub async fn list_contributions_by_group(&self, group_id: &str) -> Result<Vec<Contribution>> {
        let group_id = group_id.to_string();
        self.run("list_contributions_by_group", move |store| {
            store.list_by_key("groupId", &group_id)
        })
        .await
    }

    /// Contributions made by a member
    pub async fn list_contributions_by_member(
        &self,
        member_id: &str,
    ) -> Result<Vec<Contribution>> {
        let member_id = member_id.to_string();
        self.run("list_contributions_by_member", move |store| {
            store.list_by_key("memberId", &member_id)
        })
        .await
    }

    /// Contributions dated on one calendar day (UTC)
    pub async fn list_contributions_on(&self, day: NaiveDate) -> Result<Vec<Contribution>> {
        self.run("list_contributions_on", move |store| {
            store.list_by_key("date", &day.to_string())
        })
        .await
    }

    // Loans

    /// Get loan by id
    pub async fn get_loan(&self, loan_id: &str) -> Result<Option<Loan>> {
        let loan_id = loan_id.to_string();
        self.run("get_loan", move |store| store.get(&loan_id)).await
    }

    /// Loans issued from a group
    pub async fn list_loans_by_group(&self, group_id: &str) -> Result<Vec<Loan>> {
        let group_id = group_id.to_string();
        self.run("list_loans_by_group", move |store| {
            store.list_by_key("groupId", &group_id)
        })
        .await
    }

    /// Loans taken by a member
    pub async fn list_loans_by_member(&self, member_id: &str) -> Result<Vec<Loan>> {
        let member_id = member_id.to_string();
        self.run("list_loans_by_member", move |store| {
            store.list_by_key("memberId", &member_id)
        })
        .await
    }

    /// Loans in one status
    pub async fn list_loans_by_status(&self, status: LoanStatus) -> Result<Vec<Loan>> {
        self.run("list_loans_by_status", move |store| {
            store.list_by_key("status", status.as_str())
        })
        .await
    }

    /// Mark every active loan past its due date as overdue
    pub async fn refresh_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Loan>> {
        self.run("refresh_overdue", move |store| {
            let mut txn = store.transaction();
            let mut changed = Vec::new();

            for mut loan in store.list_by_key::<Loan>("status", LoanStatus::Active.as_str())? {
                if loan.is_past_due(now) {
                    loan.status = LoanStatus::Overdue;
                    changed.push(txn.put(loan)?);
                }
            }

            txn.commit()?;
            if !changed.is_empty() {
                tracing::info!(loans = changed.len(), "Loans marked overdue");
            }
            Ok(changed)
        })
        .await
    }

    // Audit

    /// Recompute a group's aggregates from its members, contributions and loans
    pub async fn audit_group(&self, group_id: &str) -> Result<GroupAudit> {
        let group_id = group_id.to_string();

        self.run("audit_group", move |store| {
            let group: Group = store.require(&group_id)?;
            let members: Vec<Member> = store.list_by_key("groupId", &group.id)?;
            let contributions: Vec<Contribution> = store.list_by_key("groupId", &group.id)?;
            let loans: Vec<Loan> = store.list_by_key("groupId", &group.id)?;

            let contributed = checked_sum(contributions.iter().map(|c| c.amount), "contributions")?;
            let lent = checked_sum(loans.iter().map(|l| l.amount), "loans")?;
            // Only the payoff payment flows back into the pool
            let returned = checked_sum(
                loans
                    .iter()
                    .filter(|l| l.status == LoanStatus::Paid)
                    .filter_map(|l| l.payments.last().map(|p| p.amount)),
                "payoffs",
            )?;
            let total_savings = checked(
                contributed
                    .checked_sub(lent)
                    .and_then(|net| net.checked_add(returned)),
                "recomputed savings",
            )?;

            let computed = GroupTotals {
                member_count: members.len() as u32,
                total_savings,
                active_loans: loans
                    .iter()
                    .filter(|l| l.status != LoanStatus::Paid)
                    .count() as u32,
            };
            let stored = GroupTotals {
                member_count: group.member_count,
                total_savings: group.total_savings,
                active_loans: group.active_loans,
            };

            let mut inconsistent_members = Vec::new();
            for member in &members {
                let own_contributions = checked_sum(
                    contributions
                        .iter()
                        .filter(|c| c.member_id == member.id)
                        .map(|c| c.amount),
                    "member contributions",
                )?;
                let own_loans = checked_sum(
                    loans
                        .iter()
                        .filter(|l| l.member_id == member.id)
                        .map(|l| l.amount),
                    "member loans",
                )?;
                let balance = member.total_contributions.checked_sub(member.total_loans);

                if member.total_contributions != own_contributions
                    || member.total_loans != own_loans
                    || balance != Some(member.balance)
                {
                    inconsistent_members.push(member.id.clone());
                }
            }

            let audit = GroupAudit {
                group_id: group.id,
                stored,
                computed,
                inconsistent_members,
            };
            if !audit.is_consistent() {
                tracing::warn!(group_id = %audit.group_id, "Group aggregates out of balance");
            }
            Ok(audit)
        })
        .await
    }

    // Sync status

    /// Current sync status
    pub fn status(&self) -> SyncStatus {
        self.signal.current()
    }

    /// Subscribe to sync status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.signal.subscribe()
    }

    /// Sync status changes as a stream
    pub fn status_stream(&self) -> WatchStream<SyncStatus> {
        self.signal.stream()
    }

    /// Connectivity listener hook
    pub fn set_online(&self, online: bool) {
        self.signal.set_online(online);
    }

    /// Queued mutations, oldest first
    pub async fn pending_sync_entries(&self) -> Result<Vec<SyncQueueEntry>> {
        self.run("pending_sync_entries", |store| store.sync().pending_entries())
            .await
    }

    /// Drop every queued mutation and stamp the sync time
    pub async fn clear_queue(&self) -> Result<SyncStatus> {
        self.run("clear_queue", |store| store.sync().clear()).await
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

fn ensure_positive(amount: Decimal, what: &str) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "{} amount must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

/// Map an overflowed checked operation to a rejected amount
fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| {
        Error::InvalidAmount(format!("{} would exceed the representable range", what))
    })
}

fn checked_sum(mut amounts: impl Iterator<Item = Decimal>, what: &str) -> Result<Decimal> {
    amounts.try_fold(Decimal::ZERO, |total, amount| {
        checked(total.checked_add(amount), what)
    })
}

fn require_member_of(store: &Store, member_id: &str, group_id: &str) -> Result<Member> {
    let member: Member = store.require(member_id)?;
    if member.group_id != group_id {
        return Err(Error::NotFound(format!(
            "member {} in group {}",
            member_id, group_id
        )));
    }
    Ok(member)
}
