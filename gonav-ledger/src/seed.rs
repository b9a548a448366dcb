//! Demo dataset for first launch

use crate::{
    types::{Group, GroupType, MeetingFrequency, Member, MemberRole, Training, TrainingCategory},
    Ledger, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const DEMO_MEMBERS: [(&str, MemberRole); 5] = [
    ("Marie Jean", MemberRole::Leader),
    ("Rose Pierre", MemberRole::Treasurer),
    ("Carla Paul", MemberRole::Member),
    ("Jeanne Baptiste", MemberRole::Member),
    ("Lucie Francois", MemberRole::Member),
];

const DEMO_TRAININGS: [(&str, &str, &str, TrainingCategory, u32); 3] = [
    (
        "Leadership Fundamentals",
        "Fondamantal Lidèchip",
        "Basic leadership skills and principles",
        TrainingCategory::Leadership,
        8,
    ),
    (
        "Project Management",
        "Jesyon Pwojè",
        "Planning and executing community projects",
        TrainingCategory::ProjectManagement,
        12,
    ),
    (
        "Civic Engagement",
        "Angajman Sivik",
        "Understanding civic responsibilities and participation",
        TrainingCategory::Civic,
        6,
    ),
];

struct DemoGroup {
    name: &'static str,
    group_type: GroupType,
    description: &'static str,
    section: &'static str,
    meeting_day: &'static str,
    meeting_frequency: MeetingFrequency,
}

impl DemoGroup {
    fn into_group(self, member_count: u32, now: DateTime<Utc>) -> Group {
        Group {
            id: String::new(),
            name: self.name.to_string(),
            group_type: self.group_type,
            description: self.description.to_string(),
            section: self.section.to_string(),
            leader_id: String::new(),
            member_count,
            total_savings: Decimal::ZERO,
            active_loans: 0,
            meeting_day: self.meeting_day.to_string(),
            meeting_frequency: self.meeting_frequency,
            whatsapp_link: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Ledger {
    /// Populate the illustrative dataset when no group exists yet
    ///
    /// The check and every demo record commit in one job, so the dataset is
    /// either written whole or not at all. Returns `false` without writing
    /// anything if the store already holds a group.
    pub async fn seed_demo_data(&self) -> Result<bool> {
        let seeded = self
            .run("seed_demo_data", |store| {
                if !store.is_empty::<Group>()? {
                    return Ok(None);
                }

                let now = Utc::now();
                let mut txn = store.transaction();

                let vanyan = txn.insert(
                    DemoGroup {
                        name: "Mutuelle Fanm Vanyan",
                        group_type: GroupType::Mutuelle,
                        description: "Gwoup epay fanm nan Anse-a-Galets",
                        section: "Anse-a-Galets",
                        meeting_day: "Samdi",
                        meeting_frequency: MeetingFrequency::Weekly,
                    }
                    .into_group(DEMO_MEMBERS.len() as u32, now),
                )?;
                txn.insert(
                    DemoGroup {
                        name: "Sol Lakay Gran Sous",
                        group_type: GroupType::Sol,
                        description: "Sol kominote Gran Sous",
                        section: "Gran Sous",
                        meeting_day: "Dimanch",
                        meeting_frequency: MeetingFrequency::Biweekly,
                    }
                    .into_group(0, now),
                )?;

                for (name, role) in DEMO_MEMBERS {
                    txn.insert(Member {
                        id: String::new(),
                        group_id: vanyan.id.clone(),
                        name: name.to_string(),
                        phone: None,
                        role,
                        total_contributions: Decimal::ZERO,
                        total_loans: Decimal::ZERO,
                        balance: Decimal::ZERO,
                        joined_at: now,
                        is_active: true,
                    })?;
                }

                for (name, name_creole, description, category, hours) in DEMO_TRAININGS {
                    txn.insert(Training {
                        id: String::new(),
                        name: name.to_string(),
                        name_creole: name_creole.to_string(),
                        description: description.to_string(),
                        category,
                        hours,
                        materials: Vec::new(),
                        is_active: true,
                    })?;
                }

                txn.commit()?;
                Ok(Some(vanyan.id))
            })
            .await?;

        match seeded {
            Some(group_id) => {
                tracing::info!(group_id = %group_id, "Demo data seeded");
                Ok(true)
            }
            None => {
                tracing::debug!("Groups present, skipping demo data");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[tokio::test]
    async fn test_seed_skips_existing_groups() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let ledger = Ledger::open(config).await.unwrap();

        ledger
            .create_group(crate::types::NewGroup {
                name: "Sol Lakay Palma".to_string(),
                group_type: GroupType::Sol,
                description: String::new(),
                section: "Palma".to_string(),
                leader_id: String::new(),
                meeting_day: "Dimanch".to_string(),
                meeting_frequency: MeetingFrequency::Monthly,
                whatsapp_link: None,
            })
            .await
            .unwrap();

        assert!(!ledger.seed_demo_data().await.unwrap());
        assert_eq!(ledger.list_groups().await.unwrap().len(), 1);
        assert!(ledger.list_trainings().await.unwrap().is_empty());
        assert_eq!(ledger.status().pending_changes, 1);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let ledger = Ledger::open(config).await.unwrap();

        assert!(ledger.seed_demo_data().await.unwrap());
        // Two groups, five members, three trainings in one commit
        assert_eq!(ledger.status().pending_changes, 10);

        assert!(!ledger.seed_demo_data().await.unwrap());
        assert_eq!(ledger.status().pending_changes, 10);

        let groups = ledger.list_groups().await.unwrap();
        assert_eq!(groups.len(), 2);

        let vanyan = ledger
            .list_groups_by_type(GroupType::Mutuelle)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(vanyan.name, "Mutuelle Fanm Vanyan");
        assert_eq!(vanyan.member_count, 5);
        assert!(ledger.audit_group(&vanyan.id).await.unwrap().is_consistent());

        let members = ledger.list_members_by_group(&vanyan.id).await.unwrap();
        assert_eq!(members.len(), 5);
        assert_eq!(
            members.iter().filter(|m| m.role == MemberRole::Treasurer).count(),
            1
        );

        let hours: u32 = ledger
            .list_trainings()
            .await
            .unwrap()
            .iter()
            .map(|t| t.hours)
            .sum();
        assert_eq!(hours, 26);

        ledger.shutdown().await.unwrap();
    }
}
