use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::breakdown::{self, BoundaryRow};
use crate::classify::{ErrorClassifier, ErrorTally};
use crate::geo::{ExclusionList, GeoHierarchyIndex};
use crate::models::{BoundaryLevel, ReportSection, SchoolId, Snapshot, StateRecord};
use crate::ranking::{self, BlockVolumeRow, ContributorRow, RoleDetail};
use crate::roles::{ReportingRole, RoleDirectory};
use crate::window::ReportWindow;

pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub role_details: bool,
    pub join_separator: String,
    pub top_limit: usize,
    pub top_errors: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            role_details: false,
            join_separator: "; ".to_string(),
            top_limit: 5,
            top_errors: 3,
        }
    }
}

/// In-window records in submission order, also indexed by school.
#[derive(Debug)]
pub struct WindowRecords<'s> {
    records: Vec<&'s StateRecord>,
    by_school: HashMap<SchoolId, Vec<&'s StateRecord>>,
}

impl<'s> WindowRecords<'s> {
    pub fn select(snapshot: &'s Snapshot, window: &ReportWindow) -> Self {
        let mut records: Vec<&StateRecord> = snapshot
            .records
            .iter()
            .filter(|record| window.contains(record.submitted_at))
            .collect();
        records.sort_by_key(|record| (record.submitted_at, record.id));

        let mut by_school: HashMap<SchoolId, Vec<&StateRecord>> = HashMap::new();
        for record in &records {
            by_school.entry(record.school_id).or_default().push(record);
        }

        Self { records, by_school }
    }

    pub fn all(&self) -> &[&'s StateRecord] {
        &self.records
    }

    pub fn at_schools<'a>(
        &'a self,
        schools: &'a HashSet<SchoolId>,
    ) -> impl Iterator<Item = &'s StateRecord> + 'a {
        schools
            .iter()
            .filter_map(|school| self.by_school.get(school))
            .flatten()
            .copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverallCounts {
    pub total: usize,
    pub invalid: usize,
    pub valid: usize,
    /// `None` when there were no records to take a share of.
    pub invalid_percentage: Option<f64>,
    pub valid_role_a: usize,
    pub valid_role_b: usize,
    pub schools_with_valid: usize,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub window: ReportWindow,
    pub role_names: [String; 2],
    pub top_limit: usize,
    pub overall: OverallCounts,
    pub errors: ErrorTally,
    pub districts: Vec<BoundaryRow>,
    pub blocks: Vec<BoundaryRow>,
    pub top_contributors: Vec<ContributorRow>,
    pub top_blocks: Vec<BlockVolumeRow>,
    pub role_details: Option<Vec<RoleDetail>>,
}

/// Computes every report section from one immutable snapshot.
pub struct ReportAggregator<'a> {
    geo: &'a GeoHierarchyIndex,
    roles: &'a RoleDirectory,
    exclusions: &'a ExclusionList,
    classifier: ErrorClassifier,
    options: AggregateOptions,
}

impl<'a> ReportAggregator<'a> {
    pub fn new(
        geo: &'a GeoHierarchyIndex,
        roles: &'a RoleDirectory,
        exclusions: &'a ExclusionList,
        options: AggregateOptions,
    ) -> Self {
        Self {
            geo,
            roles,
            exclusions,
            classifier: ErrorClassifier::new(),
            options,
        }
    }

    pub fn compute(&self, snapshot: &Snapshot, window: &ReportWindow) -> Report {
        let started = Instant::now();
        let records = WindowRecords::select(snapshot, window);
        info!(
            window = %window,
            days = window.days(),
            records = records.len(),
            "aggregating report"
        );

        let ((overall, errors), ((districts, blocks), (top_contributors, (top_blocks, role_details)))) =
            rayon::join(
                || rayon::join(|| self.overall(&records), || self.error_breakdown(&records)),
                || {
                    rayon::join(
                        || {
                            rayon::join(
                                || self.boundary_table(snapshot, &records, BoundaryLevel::District),
                                || self.boundary_table(snapshot, &records, BoundaryLevel::Block),
                            )
                        },
                        || {
                            rayon::join(
                                || {
                                    ranking::top_contributors(
                                        records.all(),
                                        self.geo,
                                        self.roles,
                                        &self.options.join_separator,
                                        self.options.top_limit,
                                    )
                                },
                                || {
                                    rayon::join(
                                        || {
                                            ranking::top_blocks(
                                                records.all(),
                                                self.geo,
                                                self.options.top_limit,
                                            )
                                        },
                                        || self.role_details(&records),
                                    )
                                },
                            )
                        },
                    )
                },
            );

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "report aggregated");

        Report {
            window: *window,
            role_names: ReportingRole::ordered().map(|role| self.roles.role_name(role).to_string()),
            top_limit: self.options.top_limit,
            overall,
            errors,
            districts,
            blocks,
            top_contributors,
            top_blocks,
            role_details,
        }
    }

    pub fn overall(&self, records: &WindowRecords<'_>) -> OverallCounts {
        let total = records.len();
        let invalid = records.all().iter().filter(|r| r.is_invalid).count();
        let valid_records = || records.all().iter().filter(|r| r.is_valid());

        let invalid_percentage = if total == 0 {
            warn!("no records in window; invalid percentage is undefined");
            None
        } else {
            Some(invalid as f64 / total as f64 * 100.0)
        };

        let valid_from = |role: ReportingRole| {
            valid_records()
                .filter(|r| self.roles.is_member(r.user_id, role))
                .count()
        };

        OverallCounts {
            total,
            invalid,
            valid: total - invalid,
            invalid_percentage,
            valid_role_a: valid_from(ReportingRole::A),
            valid_role_b: valid_from(ReportingRole::B),
            schools_with_valid: valid_records()
                .map(|r| r.school_id)
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    pub fn error_breakdown(&self, records: &WindowRecords<'_>) -> ErrorTally {
        self.classifier.tally(
            records
                .all()
                .iter()
                .filter(|r| r.is_invalid)
                .map(|r| r.comments.as_deref()),
        )
    }

    pub fn boundary_table(
        &self,
        snapshot: &Snapshot,
        records: &WindowRecords<'_>,
        level: BoundaryLevel,
    ) -> Vec<BoundaryRow> {
        let candidates = self
            .geo
            .ancestors_at_level(snapshot.submitting_schools.iter().copied(), level);
        let boundaries = self.geo.apply_exclusions(candidates, self.exclusions);
        breakdown::boundary_rows(&boundaries, records, self.geo, self.roles)
    }

    pub fn role_details(&self, records: &WindowRecords<'_>) -> Option<Vec<RoleDetail>> {
        if !self.options.role_details {
            return None;
        }
        Some(
            ReportingRole::ordered()
                .into_iter()
                .map(|role| {
                    ranking::role_detail(
                        role,
                        records.all(),
                        self.geo,
                        self.roles,
                        &self.classifier,
                        &self.options.join_separator,
                        self.options.top_errors,
                    )
                })
                .collect(),
        )
    }
}

impl Report {
    /// Sections in the fixed order the report is delivered in.
    pub fn sections(&self) -> Vec<ReportSection> {
        let [role_a, role_b] = &self.role_names;
        let mut sections = Vec::new();

        let valid_a = format!("Valid from {role_a}");
        let valid_b = format!("Valid from {role_b}");
        let mut overall = ReportSection::new(
            format!("Overall ({})", self.window),
            &[
                "Total records",
                "Invalid records",
                "Valid records",
                "Invalid %",
                valid_a.as_str(),
                valid_b.as_str(),
                "Schools with valid records",
            ],
        );
        overall.push_row(vec![
            self.overall.total.to_string(),
            self.overall.invalid.to_string(),
            self.overall.valid.to_string(),
            self.overall
                .invalid_percentage
                .map(|pct| format!("{pct:.1}"))
                .unwrap_or_else(|| UNDEFINED.to_string()),
            self.overall.valid_role_a.to_string(),
            self.overall.valid_role_b.to_string(),
            self.overall.schools_with_valid.to_string(),
        ]);
        sections.push(overall);

        let mut errors = ReportSection::new("Error breakdown", &["Error", "Count"]);
        for (category, count) in self.errors.entries() {
            errors.push_row(vec![category.clone(), count.to_string()]);
        }
        sections.push(errors);

        sections.push(breakdown::section(
            BoundaryLevel::District,
            &self.districts,
            role_a,
            role_b,
        ));
        sections.push(breakdown::section(
            BoundaryLevel::Block,
            &self.blocks,
            role_a,
            role_b,
        ));
        sections.push(ranking::contributors_section(
            self.top_limit,
            &self.top_contributors,
        ));
        sections.push(ranking::top_blocks_section(self.top_limit, &self.top_blocks));

        if let Some(details) = &self.role_details {
            sections.extend(details.iter().map(ranking::role_detail_section));
        }

        sections
    }
}
