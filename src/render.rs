use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::RenderError;
use crate::models::ReportSection;

/// How report rows are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvStyle {
    /// Fields joined with bare commas, matching historical reports. Commas
    /// inside names shift every later column.
    #[default]
    Legacy,
    /// RFC 4180 quoting where a field needs it.
    Quoted,
}

impl FromStr for CsvStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "quoted" | "strict" => Ok(Self::Quoted),
            other => Err(format!("unknown csv style '{other}', expected legacy or quoted")),
        }
    }
}

pub fn render(sections: &[ReportSection], style: CsvStyle) -> Result<Vec<u8>, RenderError> {
    match style {
        CsvStyle::Legacy => Ok(render_legacy(sections).into_bytes()),
        CsvStyle::Quoted => render_quoted(sections),
    }
}

fn render_legacy(sections: &[ReportSection]) -> String {
    let mut output = String::new();
    for section in sections {
        output.push_str(&section.heading);
        output.push('\n');
        output.push_str(&section.columns.join(","));
        output.push('\n');
        for row in &section.rows {
            output.push_str(&row.join(","));
            output.push('\n');
        }
        output.push('\n');
    }
    output
}

fn render_quoted(sections: &[ReportSection]) -> Result<Vec<u8>, RenderError> {
    let mut output = Vec::new();
    for section in sections {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut output);
        writer.write_record([section.heading.as_str()])?;
        writer.write_record(&section.columns)?;
        for row in &section.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        drop(writer);
        // A lone empty field encodes as `""`; the separator line is written raw.
        output.push(b'\n');
    }
    Ok(output)
}

/// Writes `bytes` to `path` through a temporary sibling file, so readers
/// see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let write_err = |source: std::io::Error| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;

    info!(path = %path.display(), bytes = bytes.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ReportSection> {
        let mut first = ReportSection::new(
            "Top 5 blocks by valid records",
            &["Block", "District", "Valid records"],
        );
        first.push_row(vec![
            "Hosur Road".to_string(),
            "Bangalore, Urban".to_string(),
            "5".to_string(),
        ]);
        let second = ReportSection::new("Error breakdown", &["Error", "Count"]);
        vec![first, second]
    }

    #[test]
    fn legacy_output_is_unescaped() {
        let bytes = render(&sample(), CsvStyle::Legacy).expect("renders");
        let text = String::from_utf8(bytes).expect("utf8");
        assert_eq!(
            text,
            "Top 5 blocks by valid records\n\
             Block,District,Valid records\n\
             Hosur Road,Bangalore, Urban,5\n\
             \n\
             Error breakdown\n\
             Error,Count\n\
             \n"
        );
    }

    #[test]
    fn quoted_output_escapes_embedded_commas() {
        let bytes = render(&sample(), CsvStyle::Quoted).expect("renders");
        let text = String::from_utf8(bytes).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Top 5 blocks by valid records");
        assert_eq!(lines[2], "Hosur Road,\"Bangalore, Urban\",5");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Error breakdown");
        assert!(text.ends_with("Error,Count\n\n"));
        assert!(!text.contains("\"\""));
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("report.csv");

        write_atomic(&path, b"first\n").expect("first write");
        write_atomic(&path, b"second\n").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "second\n");
        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn csv_style_parses() {
        assert_eq!("legacy".parse::<CsvStyle>(), Ok(CsvStyle::Legacy));
        assert_eq!("Quoted".parse::<CsvStyle>(), Ok(CsvStyle::Quoted));
        assert!("tsv".parse::<CsvStyle>().is_err());
    }
}
