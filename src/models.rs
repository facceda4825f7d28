use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

pub type BoundaryId = i64;
pub type SchoolId = i64;
pub type UserId = i64;

/// One SMS survey submission ("state") about a school visit.
#[derive(Debug, Clone)]
pub struct StateRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub school_id: SchoolId,
    pub telephone: String,
    pub submitted_at: NaiveDateTime,
    pub is_invalid: bool,
    pub comments: Option<String>,
    pub answers: Vec<String>,
}

impl StateRecord {
    pub fn is_valid(&self) -> bool {
        !self.is_invalid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryLevel {
    District,
    Block,
    Cluster,
}

impl BoundaryLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "district" => Some(Self::District),
            "block" | "project" => Some(Self::Block),
            "cluster" | "circle" => Some(Self::Cluster),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::District => "district",
            Self::Block => "block",
            Self::Cluster => "cluster",
        }
    }

    /// Level the parent of a boundary at this level must sit at.
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Cluster => Some(Self::Block),
            Self::Block => Some(Self::District),
            Self::District => None,
        }
    }
}

impl fmt::Display for BoundaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub id: BoundaryId,
    pub name: String,
    pub parent_id: Option<BoundaryId>,
    pub level: BoundaryLevel,
}

#[derive(Debug, Clone)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    /// The cluster the school is registered under.
    pub boundary_id: BoundaryId,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub mobile_no: String,
}

#[derive(Debug, Clone)]
pub struct RoleMembership {
    pub user_id: UserId,
    pub role_name: String,
}

/// Point-in-time view of the record store a report run works on.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<StateRecord>,
    /// Every school that has ever submitted, in first-submission order.
    pub submitting_schools: Vec<SchoolId>,
}

/// A headed table, the unit the renderer serializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportSection {
    pub fn new(heading: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            heading: heading.into(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}
