//! Shared in-memory data for unit tests.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::geo::GeoHierarchyIndex;
use crate::models::{
    Boundary, BoundaryId, BoundaryLevel, RoleMembership, School, SchoolId, Snapshot,
    StateRecord, User, UserId,
};
use crate::roles::RoleDirectory;
use crate::window::ReportWindow;

pub const ROLE_A: &str = "CRP";
pub const ROLE_B: &str = "BFC";

pub const DISTRICT_NORTH: BoundaryId = 1;
pub const DISTRICT_SOUTH: BoundaryId = 2;
pub const DISTRICT_EAST: BoundaryId = 3;
pub const BLOCK_NORTH: BoundaryId = 11;
pub const BLOCK_SOUTH: BoundaryId = 21;
pub const BLOCK_EAST: BoundaryId = 31;
pub const CLUSTER_NORTH: BoundaryId = 111;
pub const CLUSTER_SOUTH: BoundaryId = 211;
pub const CLUSTER_EAST: BoundaryId = 311;

pub const SCHOOL_NORTH_1: SchoolId = 1001;
pub const SCHOOL_NORTH_2: SchoolId = 1002;
pub const SCHOOL_SOUTH_1: SchoolId = 2001;
pub const SCHOOL_SOUTH_2: SchoolId = 2002;
pub const SCHOOL_EAST_1: SchoolId = 3001;

pub const USER_ASHA: UserId = 1;
pub const USER_BALU: UserId = 2;
pub const USER_CHITRA: UserId = 3;
pub const USER_DEVI: UserId = 4;

pub fn boundary(
    id: BoundaryId,
    name: &str,
    parent_id: Option<BoundaryId>,
    level: BoundaryLevel,
) -> Boundary {
    Boundary {
        id,
        name: name.to_string(),
        parent_id,
        level,
    }
}

pub fn school(id: SchoolId, boundary_id: BoundaryId) -> School {
    School {
        id,
        name: format!("GLPS {id}"),
        boundary_id,
    }
}

pub fn user(id: UserId, name: &str, mobile_no: &str) -> User {
    User {
        id,
        display_name: name.to_string(),
        mobile_no: mobile_no.to_string(),
    }
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid fixture timestamp")
}

pub fn record(
    user_id: UserId,
    school_id: SchoolId,
    submitted_at: NaiveDateTime,
    is_invalid: bool,
    comments: Option<&str>,
) -> StateRecord {
    StateRecord {
        id: Uuid::new_v4(),
        user_id,
        school_id,
        telephone: format!("98450{user_id:05}"),
        submitted_at,
        is_invalid,
        comments: comments.map(str::to_string),
        answers: vec![school_id.to_string(), "1".to_string(), "4".to_string()],
    }
}

pub fn geography() -> GeoHierarchyIndex {
    GeoHierarchyIndex::new(
        vec![
            boundary(DISTRICT_NORTH, "Northgate", None, BoundaryLevel::District),
            boundary(DISTRICT_SOUTH, "Southfield", None, BoundaryLevel::District),
            boundary(DISTRICT_EAST, "Eastvale", None, BoundaryLevel::District),
            boundary(BLOCK_NORTH, "Hosur Road", Some(DISTRICT_NORTH), BoundaryLevel::Block),
            boundary(BLOCK_SOUTH, "Kanakapura", Some(DISTRICT_SOUTH), BoundaryLevel::Block),
            boundary(BLOCK_EAST, "Whitefield", Some(DISTRICT_EAST), BoundaryLevel::Block),
            boundary(CLUSTER_NORTH, "Madiwala", Some(BLOCK_NORTH), BoundaryLevel::Cluster),
            boundary(CLUSTER_SOUTH, "Harohalli", Some(BLOCK_SOUTH), BoundaryLevel::Cluster),
            boundary(CLUSTER_EAST, "Kadugodi", Some(BLOCK_EAST), BoundaryLevel::Cluster),
        ],
        vec![
            school(SCHOOL_NORTH_1, CLUSTER_NORTH),
            school(SCHOOL_NORTH_2, CLUSTER_NORTH),
            school(SCHOOL_SOUTH_1, CLUSTER_SOUTH),
            school(SCHOOL_SOUTH_2, CLUSTER_SOUTH),
            school(SCHOOL_EAST_1, CLUSTER_EAST),
        ],
    )
}

pub fn directory() -> RoleDirectory {
    RoleDirectory::new(
        vec![
            user(USER_ASHA, "Asha Rao", "9845000001"),
            user(USER_BALU, "Balu Naik", "9845000002"),
            user(USER_CHITRA, "Chitra K", "9845000003"),
            user(USER_DEVI, "Devi M", "9845000004"),
        ],
        vec![
            RoleMembership {
                user_id: USER_ASHA,
                role_name: ROLE_A.to_string(),
            },
            RoleMembership {
                user_id: USER_BALU,
                role_name: ROLE_A.to_string(),
            },
            RoleMembership {
                user_id: USER_DEVI,
                role_name: ROLE_B.to_string(),
            },
        ],
        ROLE_A,
        ROLE_B,
    )
}

pub fn window() -> ReportWindow {
    ReportWindow::explicit(
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid start"),
        NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid end"),
    )
    .expect("ordered window")
}

/// Ten in-window submissions split five and five between Northgate and
/// Southfield, four of them invalid, plus one older Eastvale submission.
pub fn snapshot() -> Snapshot {
    let records = vec![
        record(USER_ASHA, SCHOOL_NORTH_1, at(1, 9), false, None),
        record(USER_ASHA, SCHOOL_SOUTH_1, at(2, 9), false, None),
        record(USER_ASHA, SCHOOL_NORTH_2, at(2, 11), false, None),
        record(USER_ASHA, SCHOOL_SOUTH_1, at(3, 10), true, None),
        record(USER_BALU, SCHOOL_NORTH_2, at(3, 12), false, None),
        record(USER_BALU, SCHOOL_NORTH_1, at(4, 9), false, None),
        record(USER_BALU, SCHOOL_SOUTH_2, at(5, 9), true, Some("Accepted")),
        record(USER_CHITRA, SCHOOL_NORTH_1, at(5, 14), false, None),
        record(
            USER_CHITRA,
            SCHOOL_SOUTH_1,
            at(6, 10),
            true,
            Some("Telephone not registered"),
        ),
        record(
            USER_CHITRA,
            SCHOOL_SOUTH_2,
            at(7, 18),
            true,
            Some("Not registered"),
        ),
    ];

    let mut older = record(USER_ASHA, SCHOOL_EAST_1, at(1, 9), false, None);
    older.submitted_at = NaiveDate::from_ymd_opt(2026, 1, 15)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .expect("valid fixture timestamp");

    let mut all = vec![older];
    all.extend(records);

    Snapshot {
        records: all,
        submitting_schools: vec![
            SCHOOL_EAST_1,
            SCHOOL_NORTH_1,
            SCHOOL_SOUTH_1,
            SCHOOL_NORTH_2,
            SCHOOL_SOUTH_2,
        ],
    }
}
