use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::classify::ErrorClassifier;
use crate::geo::GeoHierarchyIndex;
use crate::models::{BoundaryId, BoundaryLevel, ReportSection, SchoolId, StateRecord, UserId};
use crate::roles::{ReportingRole, RoleDirectory};

/// Distinct district, block and cluster names a set of schools falls under,
/// each joined into one display string in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    pub districts: String,
    pub blocks: String,
    pub clusters: String,
}

impl Footprint {
    pub fn of(geo: &GeoHierarchyIndex, schools: &[SchoolId], separator: &str) -> Self {
        let joined = |level| {
            geo.ancestors_at_level(schools.iter().copied(), level)
                .iter()
                .map(|boundary| boundary.name.as_str())
                .collect::<Vec<_>>()
                .join(separator)
        };
        Self {
            districts: joined(BoundaryLevel::District),
            blocks: joined(BoundaryLevel::Block),
            clusters: joined(BoundaryLevel::Cluster),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContributorRow {
    pub name: String,
    pub contact: String,
    pub footprint: Footprint,
    pub role: String,
    pub valid: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVolumeRow {
    pub block_id: BoundaryId,
    pub block: String,
    pub district: String,
    pub valid: usize,
}

#[derive(Debug, Clone)]
pub struct MemberDetailRow {
    pub name: String,
    pub contact: String,
    pub footprint: Footprint,
    pub total: usize,
    pub invalid: usize,
    pub top_errors: Vec<(String, usize)>,
    pub schools_touched: usize,
    pub distinct_schools: usize,
}

#[derive(Debug, Clone)]
pub struct RoleDetail {
    pub role_name: String,
    pub members: Vec<MemberDetailRow>,
    pub top_errors: usize,
}

/// Per-user record lists, users kept in order of their first record.
fn group_by_user<'s>(records: &[&'s StateRecord]) -> Vec<(UserId, Vec<&'s StateRecord>)> {
    let mut position: HashMap<UserId, usize> = HashMap::new();
    let mut groups: Vec<(UserId, Vec<&StateRecord>)> = Vec::new();
    for &record in records {
        let slot = *position.entry(record.user_id).or_insert_with(|| {
            groups.push((record.user_id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

fn contact_of(roles: &RoleDirectory, user_id: UserId) -> (String, String) {
    match roles.user(user_id) {
        Some(user) => (user.display_name.clone(), user.mobile_no.clone()),
        None => {
            warn!(user_id, "records reference a user missing from the directory");
            (String::new(), String::new())
        }
    }
}

/// Users with the most valid records. Ties keep first-submission order.
pub fn top_contributors(
    records: &[&StateRecord],
    geo: &GeoHierarchyIndex,
    roles: &RoleDirectory,
    separator: &str,
    limit: usize,
) -> Vec<ContributorRow> {
    let mut ranked: Vec<(UserId, Vec<&StateRecord>, usize)> = group_by_user(records)
        .into_iter()
        .map(|(user_id, mine)| {
            let total = mine.len();
            let valid: Vec<&StateRecord> = mine.into_iter().filter(|r| r.is_valid()).collect();
            (user_id, valid, total)
        })
        .filter(|(_, valid, _)| !valid.is_empty())
        .collect();
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    ranked.truncate(limit);

    ranked
        .into_iter()
        .map(|(user_id, valid, total)| {
            let (name, contact) = contact_of(roles, user_id);
            let schools: Vec<SchoolId> = valid.iter().map(|r| r.school_id).collect();
            ContributorRow {
                name,
                contact,
                footprint: Footprint::of(geo, &schools, separator),
                role: roles.role_label(user_id).to_string(),
                valid: valid.len(),
                total,
            }
        })
        .collect()
}

/// Blocks with the most valid records, exclusions not applied.
pub fn top_blocks(
    records: &[&StateRecord],
    geo: &GeoHierarchyIndex,
    limit: usize,
) -> Vec<BlockVolumeRow> {
    let mut position: HashMap<BoundaryId, usize> = HashMap::new();
    let mut rows: Vec<BlockVolumeRow> = Vec::new();

    for record in records.iter().filter(|r| r.is_valid()) {
        let Some(block) = geo.boundary_of(record.school_id, BoundaryLevel::Block) else {
            continue;
        };
        let slot = *position.entry(block.id).or_insert_with(|| {
            rows.push(BlockVolumeRow {
                block_id: block.id,
                block: block.name.clone(),
                district: geo
                    .parent_of(block)
                    .map(|district| district.name.clone())
                    .unwrap_or_default(),
                valid: 0,
            });
            rows.len() - 1
        });
        rows[slot].valid += 1;
    }

    rows.sort_by(|a, b| b.valid.cmp(&a.valid));
    rows.truncate(limit);
    rows
}

/// Activity of every member of `role`, busiest first.
pub fn role_detail(
    role: ReportingRole,
    records: &[&StateRecord],
    geo: &GeoHierarchyIndex,
    roles: &RoleDirectory,
    classifier: &ErrorClassifier,
    separator: &str,
    top_errors: usize,
) -> RoleDetail {
    let by_user: HashMap<UserId, Vec<&StateRecord>> = group_by_user(records).into_iter().collect();
    let role_name = roles.role_name(role);

    let mut members: Vec<MemberDetailRow> = roles
        .members_of(role_name)
        .into_iter()
        .map(|user| {
            let mine = by_user.get(&user.id).map(Vec::as_slice).unwrap_or_default();
            let schools: Vec<SchoolId> = mine.iter().map(|r| r.school_id).collect();
            let invalid: Vec<&&StateRecord> = mine.iter().filter(|r| r.is_invalid).collect();
            let errors = classifier.tally(invalid.iter().map(|r| r.comments.as_deref()));

            MemberDetailRow {
                name: user.display_name.clone(),
                contact: user.mobile_no.clone(),
                footprint: Footprint::of(geo, &schools, separator),
                total: mine.len(),
                invalid: invalid.len(),
                top_errors: errors.top(top_errors),
                schools_touched: schools.len(),
                distinct_schools: schools.iter().collect::<HashSet<_>>().len(),
            }
        })
        .collect();
    members.sort_by(|a, b| b.total.cmp(&a.total));

    RoleDetail {
        role_name: role_name.to_string(),
        members,
        top_errors,
    }
}

pub fn contributors_section(limit: usize, rows: &[ContributorRow]) -> ReportSection {
    let mut section = ReportSection::new(
        format!("Top {limit} contributors"),
        &[
            "Name",
            "Contact",
            "Districts",
            "Blocks",
            "Clusters",
            "Role",
            "Valid records",
            "Total records",
        ],
    );
    for row in rows {
        section.push_row(vec![
            row.name.clone(),
            row.contact.clone(),
            row.footprint.districts.clone(),
            row.footprint.blocks.clone(),
            row.footprint.clusters.clone(),
            row.role.clone(),
            row.valid.to_string(),
            row.total.to_string(),
        ]);
    }
    section
}

pub fn top_blocks_section(limit: usize, rows: &[BlockVolumeRow]) -> ReportSection {
    let mut section = ReportSection::new(
        format!("Top {limit} blocks by valid records"),
        &["Block", "District", "Valid records"],
    );
    for row in rows {
        section.push_row(vec![
            row.block.clone(),
            row.district.clone(),
            row.valid.to_string(),
        ]);
    }
    section
}

pub fn role_detail_section(detail: &RoleDetail) -> ReportSection {
    let mut columns: Vec<String> = ["Name", "Contact", "Districts", "Blocks", "Clusters"]
        .into_iter()
        .chain(["Total records", "Invalid records"])
        .map(str::to_string)
        .collect();
    for rank in 1..=detail.top_errors {
        columns.push(format!("Error {rank}"));
        columns.push(format!("Count {rank}"));
    }
    columns.push("Schools touched".to_string());
    columns.push("Distinct schools".to_string());

    let mut section = ReportSection {
        heading: format!("{} details", detail.role_name),
        columns,
        rows: Vec::new(),
    };
    for member in &detail.members {
        let mut cells = vec![
            member.name.clone(),
            member.contact.clone(),
            member.footprint.districts.clone(),
            member.footprint.blocks.clone(),
            member.footprint.clusters.clone(),
            member.total.to_string(),
            member.invalid.to_string(),
        ];
        for rank in 0..detail.top_errors {
            match member.top_errors.get(rank) {
                Some((category, count)) => {
                    cells.push(category.clone());
                    cells.push(count.to_string());
                }
                None => cells.extend([String::new(), String::new()]),
            }
        }
        cells.push(member.schools_touched.to_string());
        cells.push(member.distinct_schools.to_string());
        section.push_row(cells);
    }
    section
}
