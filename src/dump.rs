use chrono::NaiveDate;

use crate::geo::GeoHierarchyIndex;
use crate::models::{BoundaryLevel, StateRecord};

/// Survey prompts, in the order answers arrive after the school id.
pub const QUESTION_HEADINGS: &[&str] = &[
    "Was the school open?",
    "Class visited",
    "Was Math class happening on the day of your visit?",
    "Which chapter of the textbook was taught?",
    "Which Ganitha Kalika Andolana TLM was being used by teacher?",
    "Did you see children using the Ganitha Kalika Andolana TLM?",
    "Was group work happening in the class on the day of your visit?",
    "Were children using square line book during math class?",
    "Are all the toilets in the school functional?",
    "Does the school have a separate functional toilet for girls?",
    "Does the school have drinking water?",
    "Is a Mid Day Meal served in the school?",
];

const FIXED_HEADINGS: &[&str] = &[
    "Sl. No",
    "School ID",
    "District",
    "Block",
    "Cluster",
    "Telephone",
    "Date Of Visit",
    "Invalid",
];

/// Artifact name for a day's export, e.g. `05_Mar_2026.csv`.
pub fn file_name(day: NaiveDate) -> String {
    format!("{}.csv", day.format("%d_%b_%Y"))
}

fn boundary_name(geo: &GeoHierarchyIndex, record: &StateRecord, level: BoundaryLevel) -> String {
    geo.boundary_of(record.school_id, level)
        .map(|boundary| boundary.name.replace(',', "-"))
        .unwrap_or_else(|| "None".to_string())
}

/// One line per submission of the day, raw answers included.
pub fn render_day(records: &[StateRecord], geo: &GeoHierarchyIndex) -> String {
    let mut lines = vec![FIXED_HEADINGS
        .iter()
        .chain(QUESTION_HEADINGS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")];

    for (number, record) in records.iter().enumerate() {
        let mut values = vec![
            (number + 1).to_string(),
            record.school_id.to_string(),
            boundary_name(geo, record, BoundaryLevel::District),
            boundary_name(geo, record, BoundaryLevel::Block),
            boundary_name(geo, record, BoundaryLevel::Cluster),
            record.telephone.clone(),
            record.submitted_at.date().to_string(),
            if record.is_invalid { "True" } else { "False" }.to_string(),
        ];
        // The first answer repeats the school id.
        values.extend(record.answers.iter().skip(1).cloned());
        lines.push(values.join(","));
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}
