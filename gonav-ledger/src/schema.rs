//! Table and index declarations
//!
//! Every persisted table and each of its secondary indexes is declared
//! here, once. The storage layer refuses to query an index a table does not
//! declare, and refuses to write a record that emits one.
//!
//! | table           | indexes                          |
//! |-----------------|----------------------------------|
//! | `users`         | `phone` (unique)                 |
//! | `groups`        | `type`, `section`                |
//! | `members`       | `groupId`                        |
//! | `contributions` | `groupId`, `memberId`, `date`    |
//! | `loans`         | `groupId`, `memberId`, `status`  |
//! | `vpcMembers`    | `section`                        |
//! | `trainings`     | —                                |
//! | `actionPlans`   | `section`, `status`              |
//! | `workshops`     | `type`, `date`                   |
//! | `syncQueue`     | —                                |
//!
//! `syncQueue` entries are keyed by a big-endian sequence number, so key
//! order is append order and no timestamp index is kept.

use crate::types::{
    CommunityActionPlan, Contribution, Group, Loan, Member, Training, User, VpcMember, Workshop,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Persisted table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Table {
    /// Credential holders
    Users,
    /// Savings circles
    Groups,
    /// Group members
    Members,
    /// Deposits
    Contributions,
    /// Loans (with embedded payments)
    Loans,
    /// Committee members (with embedded training records)
    VpcMembers,
    /// Training courses
    Trainings,
    /// Community action plans (with embedded updates)
    ActionPlans,
    /// Workshops
    Workshops,
    /// Pending-sync log
    SyncQueue,
}

/// Secondary index declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name (the record field it covers)
    pub name: &'static str,
    /// Whether two records may share a value
    pub unique: bool,
}

const fn index(name: &'static str) -> IndexSpec {
    IndexSpec {
        name,
        unique: false,
    }
}

const fn unique(name: &'static str) -> IndexSpec {
    IndexSpec { name, unique: true }
}

impl Table {
    /// All tables, in declaration order
    pub const ALL: [Table; 10] = [
        Table::Users,
        Table::Groups,
        Table::Members,
        Table::Contributions,
        Table::Loans,
        Table::VpcMembers,
        Table::Trainings,
        Table::ActionPlans,
        Table::Workshops,
        Table::SyncQueue,
    ];

    /// Table name (also the column family name)
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Groups => "groups",
            Table::Members => "members",
            Table::Contributions => "contributions",
            Table::Loans => "loans",
            Table::VpcMembers => "vpcMembers",
            Table::Trainings => "trainings",
            Table::ActionPlans => "actionPlans",
            Table::Workshops => "workshops",
            Table::SyncQueue => "syncQueue",
        }
    }

    /// Declared secondary indexes
    pub fn indexes(&self) -> &'static [IndexSpec] {
        match self {
            Table::Users => const { &[unique("phone")] },
            Table::Groups => const { &[index("type"), index("section")] },
            Table::Members => const { &[index("groupId")] },
            Table::Contributions => const { &[index("groupId"), index("memberId"), index("date")] },
            Table::Loans => const { &[index("groupId"), index("memberId"), index("status")] },
            Table::VpcMembers => const { &[index("section")] },
            Table::Trainings => const { &[] },
            Table::ActionPlans => const { &[index("section"), index("status")] },
            Table::Workshops => const { &[index("type"), index("date")] },
            Table::SyncQueue => const { &[] },
        }
    }

    /// Look up a declared index
    pub fn index(&self, name: &str) -> Result<&'static IndexSpec> {
        self.indexes()
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| {
                Error::SchemaError(format!("table {} has no index {}", self.name(), name))
            })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Check the declarations for mistakes that would only show up at query time
pub fn validate() -> Result<()> {
    let mut names = HashSet::new();
    for table in Table::ALL {
        if !names.insert(table.name()) {
            return Err(Error::SchemaError(format!(
                "table {} declared twice",
                table.name()
            )));
        }

        let mut seen = HashSet::new();
        for spec in table.indexes() {
            if spec.name.is_empty() || spec.name.contains('\0') {
                return Err(Error::SchemaError(format!(
                    "table {} has an unusable index name {:?}",
                    table.name(),
                    spec.name
                )));
            }
            if !seen.insert(spec.name) {
                return Err(Error::SchemaError(format!(
                    "table {} declares index {} twice",
                    table.name(),
                    spec.name
                )));
            }
        }
    }
    Ok(())
}

/// A record persisted in one table
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Table the record lives in
    const TABLE: Table;

    /// Opaque id (empty until inserted)
    fn id(&self) -> &str;

    /// Assign the id generated at insert time
    fn set_id(&mut self, id: String);

    /// Values for each declared index, by index name
    fn index_values(&self) -> Vec<(&'static str, String)>;
}

/// Calendar-day key used by the `date` indexes
pub fn day_key(date: &DateTime<Utc>) -> String {
    date.date_naive().to_string()
}

impl Record for User {
    const TABLE: Table = Table::Users;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("phone", self.phone.clone())]
    }
}

impl Record for Group {
    const TABLE: Table = Table::Groups;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.group_type.as_str().to_string()),
            ("section", self.section.clone()),
        ]
    }
}

impl Record for Member {
    const TABLE: Table = Table::Members;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("groupId", self.group_id.clone())]
    }
}

impl Record for Contribution {
    const TABLE: Table = Table::Contributions;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("groupId", self.group_id.clone()),
            ("memberId", self.member_id.clone()),
            ("date", day_key(&self.date)),
        ]
    }
}

impl Record for Loan {
    const TABLE: Table = Table::Loans;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("groupId", self.group_id.clone()),
            ("memberId", self.member_id.clone()),
            ("status", self.status.as_str().to_string()),
        ]
    }
}

impl Record for VpcMember {
    const TABLE: Table = Table::VpcMembers;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("section", self.section.clone())]
    }
}

impl Record for Training {
    const TABLE: Table = Table::Trainings;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

impl Record for CommunityActionPlan {
    const TABLE: Table = Table::ActionPlans;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("section", self.section.clone()),
            ("status", self.status.as_str().to_string()),
        ]
    }
}

impl Record for Workshop {
    const TABLE: Table = Table::Workshops;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.workshop_type.as_str().to_string()),
            ("date", day_key(&self.date)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_valid() {
        validate().unwrap();
    }

    #[test]
    fn test_unknown_index_is_schema_error() {
        assert!(Table::Members.index("groupId").is_ok());
        let err = Table::Members.index("phone").unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
        assert!(matches!(
            Table::Trainings.index("category"),
            Err(Error::SchemaError(_))
        ));
    }

    #[test]
    fn test_sync_queue_orders_by_key() {
        assert!(Table::SyncQueue.indexes().is_empty());
        assert!(matches!(
            Table::SyncQueue.index("timestamp"),
            Err(Error::SchemaError(_))
        ));
    }

    #[test]
    fn test_only_phone_is_unique() {
        for table in Table::ALL {
            for spec in table.indexes() {
                assert_eq!(spec.unique, table == Table::Users && spec.name == "phone");
            }
        }
    }

    #[test]
    fn test_day_key() {
        let date = DateTime::parse_from_rfc3339("2026-03-14T18:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(day_key(&date), "2026-03-14");
    }
}
