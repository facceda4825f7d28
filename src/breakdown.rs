use std::collections::HashSet;

use crate::aggregate::WindowRecords;
use crate::geo::GeoHierarchyIndex;
use crate::models::{Boundary, BoundaryLevel, ReportSection};
use crate::roles::{ReportingRole, RoleDirectory};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryMetrics {
    pub total: usize,
    pub role_a: usize,
    pub role_b: usize,
    pub invalid: usize,
    pub invalid_role_a: usize,
    pub invalid_role_b: usize,
    pub schools_with_invalid: usize,
}

#[derive(Debug, Clone)]
pub struct BoundaryRow {
    pub name: String,
    pub parent_name: Option<String>,
    pub metrics: BoundaryMetrics,
}

/// One row per boundary, busiest first. Equal totals keep the input order.
pub fn boundary_rows(
    boundaries: &[&Boundary],
    records: &WindowRecords<'_>,
    geo: &GeoHierarchyIndex,
    roles: &RoleDirectory,
) -> Vec<BoundaryRow> {
    let mut rows: Vec<BoundaryRow> = boundaries
        .iter()
        .map(|boundary| {
            let schools = geo.schools_under(boundary.id);
            let mut metrics = BoundaryMetrics::default();
            let mut invalid_schools = HashSet::new();

            for record in records.at_schools(&schools) {
                let in_a = roles.is_member(record.user_id, ReportingRole::A);
                let in_b = roles.is_member(record.user_id, ReportingRole::B);

                metrics.total += 1;
                metrics.role_a += usize::from(in_a);
                metrics.role_b += usize::from(in_b);
                if record.is_invalid {
                    metrics.invalid += 1;
                    metrics.invalid_role_a += usize::from(in_a);
                    metrics.invalid_role_b += usize::from(in_b);
                    invalid_schools.insert(record.school_id);
                }
            }
            metrics.schools_with_invalid = invalid_schools.len();

            BoundaryRow {
                name: boundary.name.clone(),
                parent_name: geo.parent_of(boundary).map(|parent| parent.name.clone()),
                metrics,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.metrics.total.cmp(&a.metrics.total));
    rows
}

pub fn section(
    level: BoundaryLevel,
    rows: &[BoundaryRow],
    role_a: &str,
    role_b: &str,
) -> ReportSection {
    let (heading, label, parent_label) = match level {
        BoundaryLevel::District => ("District summary", "District", None),
        BoundaryLevel::Block => ("Block summary", "Block", Some("District")),
        BoundaryLevel::Cluster => ("Cluster summary", "Cluster", Some("Block")),
    };
    let from_a = format!("{role_a} records");
    let from_b = format!("{role_b} records");
    let invalid_a = format!("Invalid from {role_a}");
    let invalid_b = format!("Invalid from {role_b}");

    let mut columns = vec![label];
    columns.extend(parent_label);
    columns.extend([
        "Total records",
        from_a.as_str(),
        from_b.as_str(),
        "Invalid records",
        invalid_a.as_str(),
        invalid_b.as_str(),
        "Schools with invalid records",
    ]);

    let mut section = ReportSection::new(heading, &columns);
    for row in rows {
        let mut cells = vec![row.name.clone()];
        if parent_label.is_some() {
            cells.push(row.parent_name.clone().unwrap_or_default());
        }
        let m = &row.metrics;
        cells.extend(
            [
                m.total,
                m.role_a,
                m.role_b,
                m.invalid,
                m.invalid_role_a,
                m.invalid_role_b,
                m.schools_with_invalid,
            ]
            .map(|value| value.to_string()),
        );
        section.push_row(cells);
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn section_columns_name_the_roles() {
        let geo = fixtures::geography();
        let roles = fixtures::directory();
        let snapshot = fixtures::snapshot();
        let records = WindowRecords::select(&snapshot, &fixtures::window());
        let blocks =
            geo.ancestors_at_level(snapshot.submitting_schools.clone(), BoundaryLevel::Block);
        let rows = boundary_rows(&blocks, &records, &geo, &roles);

        let section = section(BoundaryLevel::Block, &rows, "CRP", "BFC");
        assert_eq!(section.heading, "Block summary");
        assert_eq!(section.columns[0], "Block");
        assert_eq!(section.columns[1], "District");
        assert_eq!(section.columns[3], "CRP records");
        assert_eq!(section.columns.len(), 9);
        assert_eq!(
            section.rows[0],
            vec!["Hosur Road", "Northgate", "5", "4", "0", "0", "0", "0", "0"]
        );
    }

    #[test]
    fn ties_keep_candidate_order() {
        let geo = fixtures::geography();
        let roles = fixtures::directory();
        let snapshot = fixtures::snapshot();
        let records = WindowRecords::select(&snapshot, &fixtures::window());
        let districts = geo.ancestors_at_level(
            [fixtures::SCHOOL_SOUTH_1, fixtures::SCHOOL_NORTH_1],
            BoundaryLevel::District,
        );
        let rows = boundary_rows(&districts, &records, &geo, &roles);
        assert_eq!(rows[0].name, "Southfield");
        assert_eq!(rows[1].name, "Northgate");
        assert!(rows[0].parent_name.is_none());
    }
}
