//! Leadership track: VPC members, trainings, action plans, workshops
//!
//! These records carry no cross-entity balances. Each operation is a
//! single-record write.

use crate::{
    storage::new_id,
    types::{
        CommunityActionPlan, NewActionPlan, NewTraining, NewTrainingRecord, NewVpcMember,
        NewWorkshop, PlanStatus, PlanUpdate, Training, TrainingRecord, VpcMember, Workshop,
        WorkshopType,
    },
    Error, Ledger, Result,
};
use chrono::{NaiveDate, Utc};

impl Ledger {
    // VPC members

    /// Enroll a committee member
    pub async fn create_vpc_member(&self, new_member: NewVpcMember) -> Result<VpcMember> {
        self.run("create_vpc_member", move |store| {
            store.insert(VpcMember {
                id: String::new(),
                name: new_member.name,
                phone: new_member.phone,
                section: new_member.section,
                role: new_member.role,
                training_hours: 0,
                trainings_completed: Vec::new(),
                projects_led: Vec::new(),
                joined_at: Utc::now(),
                is_active: true,
            })
        })
        .await
    }

    /// Get committee member by id
    pub async fn get_vpc_member(&self, id: &str) -> Result<Option<VpcMember>> {
        let id = id.to_string();
        self.run("get_vpc_member", move |store| store.get(&id)).await
    }

    /// All committee members
    pub async fn list_vpc_members(&self) -> Result<Vec<VpcMember>> {
        self.run("list_vpc_members", |store| store.list_all()).await
    }

    /// Committee members of one section
    pub async fn list_vpc_members_by_section(&self, section: &str) -> Result<Vec<VpcMember>> {
        let section = section.to_string();
        self.run("list_vpc_members_by_section", move |store| {
            store.list_by_key("section", &section)
        })
        .await
    }

    /// Replace a committee member record
    pub async fn update_vpc_member(&self, member: VpcMember) -> Result<VpcMember> {
        self.run("update_vpc_member", move |store| {
            store.require::<VpcMember>(&member.id)?;
            store.put(member)
        })
        .await
    }

    /// Append a completed training and credit its hours
    pub async fn record_training(
        &self,
        vpc_member_id: &str,
        record: NewTrainingRecord,
    ) -> Result<VpcMember> {
        let vpc_member_id = vpc_member_id.to_string();

        self.run("record_training", move |store| {
            let mut member: VpcMember = store.require(&vpc_member_id)?;

            member.training_hours = member
                .training_hours
                .checked_add(record.hours)
                .ok_or_else(|| {
                    Error::InvalidAmount(format!(
                        "training hours for {} would exceed {}",
                        member.id,
                        u32::MAX
                    ))
                })?;
            member.trainings_completed.push(TrainingRecord {
                id: new_id(),
                vpc_member_id: member.id.clone(),
                training_id: record.training_id,
                training_name: record.training_name,
                hours: record.hours,
                completed_at: record.completed_at,
                certificate: record.certificate,
            });

            store.put(member)
        })
        .await
    }

    // Trainings

    /// Add a course to the catalogue
    pub async fn create_training(&self, new_training: NewTraining) -> Result<Training> {
        self.run("create_training", move |store| {
            store.insert(Training {
                id: String::new(),
                name: new_training.name,
                name_creole: new_training.name_creole,
                description: new_training.description,
                category: new_training.category,
                hours: new_training.hours,
                materials: new_training.materials,
                is_active: true,
            })
        })
        .await
    }

    /// Get course by id
    pub async fn get_training(&self, id: &str) -> Result<Option<Training>> {
        let id = id.to_string();
        self.run("get_training", move |store| store.get(&id)).await
    }

    /// Whole catalogue
    pub async fn list_trainings(&self) -> Result<Vec<Training>> {
        self.run("list_trainings", |store| store.list_all()).await
    }

    // Action plans

    /// Create a community action plan
    pub async fn create_action_plan(&self, new_plan: NewActionPlan) -> Result<CommunityActionPlan> {
        self.run("create_action_plan", move |store| {
            let now = Utc::now();
            let completed_date = (new_plan.status == PlanStatus::Completed).then_some(now);
            store.insert(CommunityActionPlan {
                id: String::new(),
                section: new_plan.section,
                title: new_plan.title,
                description: new_plan.description,
                status: new_plan.status,
                priority: new_plan.priority,
                sector: new_plan.sector,
                lead_vpc_id: new_plan.lead_vpc_id,
                participants: new_plan.participants,
                budget: new_plan.budget,
                start_date: new_plan.start_date,
                completed_date,
                updates: Vec::new(),
                created_at: now,
            })
        })
        .await
    }

    /// Get action plan by id
    pub async fn get_action_plan(&self, id: &str) -> Result<Option<CommunityActionPlan>> {
        let id = id.to_string();
        self.run("get_action_plan", move |store| store.get(&id)).await
    }

    /// All action plans
    pub async fn list_action_plans(&self) -> Result<Vec<CommunityActionPlan>> {
        self.run("list_action_plans", |store| store.list_all()).await
    }

    /// Action plans of one section
    pub async fn list_action_plans_by_section(
        &self,
        section: &str,
    ) -> Result<Vec<CommunityActionPlan>> {
        let section = section.to_string();
        self.run("list_action_plans_by_section", move |store| {
            store.list_by_key("section", &section)
        })
        .await
    }

    /// Action plans in one status
    pub async fn list_action_plans_by_status(
        &self,
        status: PlanStatus,
    ) -> Result<Vec<CommunityActionPlan>> {
        self.run("list_action_plans_by_status", move |store| {
            store.list_by_key("status", status.as_str())
        })
        .await
    }

    /// Replace an action plan record
    pub async fn update_action_plan(
        &self,
        plan: CommunityActionPlan,
    ) -> Result<CommunityActionPlan> {
        self.run("update_action_plan", move |store| {
            store.require::<CommunityActionPlan>(&plan.id)?;
            store.put(plan)
        })
        .await
    }

    /// Post a progress note on a plan
    pub async fn add_plan_update(
        &self,
        plan_id: &str,
        content: &str,
        created_by: &str,
    ) -> Result<CommunityActionPlan> {
        let plan_id = plan_id.to_string();
        let content = content.to_string();
        let created_by = created_by.to_string();

        self.run("add_plan_update", move |store| {
            let mut plan: CommunityActionPlan = store.require(&plan_id)?;
            plan.updates.push(PlanUpdate {
                id: new_id(),
                plan_id: plan.id.clone(),
                content,
                created_by,
                created_at: Utc::now(),
                images: Vec::new(),
            });
            store.put(plan)
        })
        .await
    }

    /// Move a plan to a new status
    ///
    /// Entering `completed` stamps `completed_date`; leaving it clears it.
    pub async fn set_plan_status(
        &self,
        plan_id: &str,
        status: PlanStatus,
    ) -> Result<CommunityActionPlan> {
        let plan_id = plan_id.to_string();

        self.run("set_plan_status", move |store| {
            let mut plan: CommunityActionPlan = store.require(&plan_id)?;
            if plan.status == status {
                return Ok(plan);
            }

            plan.completed_date = match status {
                PlanStatus::Completed => Some(Utc::now()),
                PlanStatus::Planning | PlanStatus::InProgress => None,
            };
            plan.status = status;
            store.put(plan)
        })
        .await
    }

    // Workshops

    /// Log a workshop
    pub async fn create_workshop(&self, new_workshop: NewWorkshop) -> Result<Workshop> {
        self.run("create_workshop", move |store| {
            store.insert(Workshop {
                id: String::new(),
                name: new_workshop.name,
                name_creole: new_workshop.name_creole,
                workshop_type: new_workshop.workshop_type,
                date: new_workshop.date,
                section: new_workshop.section,
                location: new_workshop.location,
                facilitator_id: new_workshop.facilitator_id,
                attendee_count: new_workshop.attendee_count,
                description: new_workshop.description,
                topics: new_workshop.topics,
                created_at: Utc::now(),
            })
        })
        .await
    }

    /// All workshops
    pub async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        self.run("list_workshops", |store| store.list_all()).await
    }

    /// Workshops of one kind
    pub async fn list_workshops_by_type(&self, workshop_type: WorkshopType) -> Result<Vec<Workshop>> {
        self.run("list_workshops_by_type", move |store| {
            store.list_by_key("type", workshop_type.as_str())
        })
        .await
    }

    /// Workshops held on one calendar day (UTC)
    pub async fn list_workshops_on(&self, day: NaiveDate) -> Result<Vec<Workshop>> {
        self.run("list_workshops_on", move |store| {
            store.list_by_key("date", &day.to_string())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlanPriority, PlanSector, TrainingCategory, VpcRole};
    use crate::{Config, Error};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    async fn create_test_ledger() -> (Ledger, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        (Ledger::open(config).await.unwrap(), temp_dir)
    }

    fn new_vpc(name: &str, section: &str) -> NewVpcMember {
        NewVpcMember {
            name: name.to_string(),
            phone: None,
            section: section.to_string(),
            role: VpcRole::Vpc,
        }
    }

    fn new_plan(section: &str) -> NewActionPlan {
        NewActionPlan {
            section: section.to_string(),
            title: "Rebati pi a".to_string(),
            description: "Repair the village well".to_string(),
            status: PlanStatus::Planning,
            priority: PlanPriority::High,
            sector: PlanSector::Water,
            lead_vpc_id: String::new(),
            participants: vec![],
            budget: Some(Decimal::from(15_000)),
            start_date: None,
        }
    }

    #[tokio::test]
    async fn test_vpc_training_hours() {
        let (ledger, _temp) = create_test_ledger().await;

        let training = ledger
            .create_training(NewTraining {
                name: "Leadership Fundamentals".to_string(),
                name_creole: "Fondamantal Lidèchip".to_string(),
                description: String::new(),
                category: TrainingCategory::Leadership,
                hours: 8,
                materials: vec![],
            })
            .await
            .unwrap();
        assert!(training.is_active);

        let member = ledger.create_vpc_member(new_vpc("Jeanne Baptiste", "Palma")).await.unwrap();
        assert_eq!(member.training_hours, 0);

        for _ in 0..2 {
            ledger
                .record_training(
                    &member.id,
                    NewTrainingRecord {
                        training_id: training.id.clone(),
                        training_name: training.name.clone(),
                        hours: training.hours,
                        completed_at: Utc::now(),
                        certificate: true,
                    },
                )
                .await
                .unwrap();
        }

        let member = ledger.get_vpc_member(&member.id).await.unwrap().unwrap();
        assert_eq!(member.training_hours, 16);
        assert_eq!(member.trainings_completed.len(), 2);
        assert_eq!(member.trainings_completed[0].vpc_member_id, member.id);

        ledger.create_vpc_member(new_vpc("Rose Pierre", "Mapou")).await.unwrap();
        assert_eq!(ledger.list_vpc_members().await.unwrap().len(), 2);
        assert_eq!(ledger.list_vpc_members_by_section("Palma").await.unwrap().len(), 1);
        assert_eq!(ledger.list_trainings().await.unwrap().len(), 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_plan_status_and_updates() {
        let (ledger, _temp) = create_test_ledger().await;

        let plan = ledger.create_action_plan(new_plan("Palma")).await.unwrap();
        assert!(plan.completed_date.is_none());

        let plan = ledger
            .add_plan_update(&plan.id, "Materials bought", "Marie Jean")
            .await
            .unwrap();
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].plan_id, plan.id);

        let plan = ledger.set_plan_status(&plan.id, PlanStatus::Completed).await.unwrap();
        assert!(plan.completed_date.is_some());
        assert_eq!(
            ledger.list_action_plans_by_status(PlanStatus::Completed).await.unwrap().len(),
            1
        );
        assert!(ledger
            .list_action_plans_by_status(PlanStatus::Planning)
            .await
            .unwrap()
            .is_empty());

        let plan = ledger.set_plan_status(&plan.id, PlanStatus::InProgress).await.unwrap();
        assert!(plan.completed_date.is_none());

        assert_eq!(ledger.list_action_plans_by_section("Palma").await.unwrap().len(), 1);
        assert!(matches!(
            ledger.add_plan_update("missing", "x", "y").await,
            Err(Error::NotFound(_))
        ));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_updates_require_existing_records() {
        let (ledger, _temp) = create_test_ledger().await;

        let mut plan = ledger.create_action_plan(new_plan("Mapou")).await.unwrap();
        plan.title = "Netwaye kanal".to_string();
        let updated = ledger.update_action_plan(plan.clone()).await.unwrap();
        assert_eq!(
            ledger.get_action_plan(&plan.id).await.unwrap().unwrap(),
            updated
        );

        plan.id = "missing".to_string();
        assert!(matches!(
            ledger.update_action_plan(plan).await,
            Err(Error::NotFound(_))
        ));

        let mut member = ledger.create_vpc_member(new_vpc("Carla Paul", "Mapou")).await.unwrap();
        member.is_active = false;
        assert!(!ledger.update_vpc_member(member).await.unwrap().is_active);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_workshops_by_type_and_day() {
        let (ledger, _temp) = create_test_ledger().await;
        let yesterday = Utc::now() - Duration::days(1);

        for (workshop_type, date) in [
            (WorkshopType::PaseMayet, yesterday),
            (WorkshopType::FanmDjanm, yesterday),
            (WorkshopType::PaseMayet, Utc::now() + Duration::days(3)),
        ] {
            ledger
                .create_workshop(NewWorkshop {
                    name: "Passing the baton".to_string(),
                    name_creole: "Pase Mayèt".to_string(),
                    workshop_type,
                    date,
                    section: "Palma".to_string(),
                    location: "Lekòl Nasyonal".to_string(),
                    facilitator_id: String::new(),
                    attendee_count: 12,
                    description: None,
                    topics: vec!["lidèchip".to_string()],
                })
                .await
                .unwrap();
        }

        assert_eq!(ledger.list_workshops().await.unwrap().len(), 3);
        assert_eq!(
            ledger.list_workshops_by_type(WorkshopType::PaseMayet).await.unwrap().len(),
            2
        );
        assert!(ledger
            .list_workshops_by_type(WorkshopType::Dyalog)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            ledger.list_workshops_on(yesterday.date_naive()).await.unwrap().len(),
            2
        );

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_training_hours_overflow_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        let member = ledger.create_vpc_member(new_vpc("Carla Paul", "Palma")).await.unwrap();

        let record = |hours: u32| NewTrainingRecord {
            training_id: "t-civic".to_string(),
            training_name: "Civic Engagement".to_string(),
            hours,
            completed_at: Utc::now(),
            certificate: false,
        };

        let member = ledger.record_training(&member.id, record(u32::MAX)).await.unwrap();
        assert_eq!(member.training_hours, u32::MAX);

        let err = ledger.record_training(&member.id, record(1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let stored = ledger.get_vpc_member(&member.id).await.unwrap().unwrap();
        assert_eq!(stored, member);
        assert_eq!(stored.trainings_completed.len(), 1);

        ledger.shutdown().await.unwrap();
    }
}
