//! Output formatting and persistence for summary tables.
//!
//! Supports pretty-printing, JSON serialization, and CSV tables.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::CleanStats;
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Logs cleaning statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &CleanStats) {
    debug!("{:#?}", stats);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A row type written as a CSV table.
///
/// `HEADERS` lists the serialized field names in order. It is written on its
/// own when a table has no rows.
pub trait Table: Serialize {
    const HEADERS: &'static [&'static str];
}

impl<T: Table> Table for &T {
    const HEADERS: &'static [&'static str] = T::HEADERS;
}

/// Serializes `rows` as CSV, with a header row, into `writer`.
pub fn write_table_to<W: Write, T: Table>(writer: W, rows: &[T]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    if rows.is_empty() {
        writer.write_record(T::HEADERS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `rows` as a CSV file at `path`, replacing any existing file.
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV table");
    let file = File::create(path)?;
    write_table_to(file, rows)
}

/// Writes `rows` to `path` if given, otherwise to stdout.
pub fn emit_table<T: Table>(path: Option<&str>, rows: &[T]) -> Result<()> {
    match path {
        Some(p) => write_table(Path::new(p), rows),
        None => write_table_to(std::io::stdout().lock(), rows),
    }
}

/// Serializes a value to pretty JSON and writes it to `path`.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    debug!(path = %path.display(), "Writing JSON");
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::analyzer::build_report;
    use crate::analyzers::types::{OpportunityCost, Percent};
    use crate::cleaner::clean;
    use crate::config::RaterConfig;
    use crate::parser::read_raw_rows;
    use crate::record::{RejectReason, Rejection};
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        change: Percent,
        week: Option<u32>,
    }

    impl Table for Row {
        const HEADERS: &'static [&'static str] = &["name", "change", "week"];
    }

    fn header_line<T: Table>(rows: &[T]) -> String {
        let mut buf = Vec::new();
        write_table_to(&mut buf, rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        text.lines().next().unwrap_or_default().to_string()
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        let stats = CleanStats::default();
        print_pretty(&stats);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let stats = CleanStats::default();
        print_json(&stats).unwrap();
    }

    #[test]
    fn test_write_table_to_buffer() {
        let rows = [
            Row {
                name: "Email",
                change: Percent::Defined(-89.5),
                week: Some(1),
            },
            Row {
                name: "Call",
                change: Percent::Undefined,
                week: None,
            },
        ];
        let mut buf = Vec::new();
        write_table_to(&mut buf, &rows).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "name,change,week\nEmail,-89.5,1\nCall,undefined,\n");
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let mut buf = Vec::new();
        write_table_to(&mut buf, &Vec::<Rejection>::new()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "row,customer_id,field,reason\n"
        );

        let mut buf = Vec::new();
        write_table_to(&mut buf, &Vec::<&OpportunityCost>::new()).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("from,to,time_invested,"));
    }

    #[test]
    fn test_headers_match_serialized_fields() {
        let data = "\
week,sales_method,customer_id,nb_sold,revenue,years_as_customer,nb_site_visits,state
1,Email,a1,10,95.0,2,24,Arizona
1,Call,a2,8,40.5,1,22,Texas
2,Email + Call,a3,12,150.0,5,28,Ohio
2,Call,a4,9,45.0,1,23,Utah
";
        let config = RaterConfig::default();
        let cleaned = clean(read_raw_rows(data.as_bytes()).unwrap(), &config).unwrap();
        let report = build_report(cleaned, &config).unwrap();
        let rejection = Rejection {
            row: 3,
            customer_id: None,
            field: "customer_id",
            reason: RejectReason::MissingIdentifier,
        };

        fn check<T: Table>(rows: &[T]) {
            assert!(!rows.is_empty());
            assert_eq!(header_line(rows), T::HEADERS.join(","));
        }

        check(&report.cleaned.transactions);
        check(&[rejection]);
        check(&report.by_method);
        check(&report.distribution.rows);
        check(&report.temporal.weekly);
        check(&report.temporal.trends);
        check(&report.temporal.crossovers);
        check(&report.efficiency.methods);
        check(&report.efficiency.opportunity.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_write_table_replaces_file() {
        let path = temp_path("sales_method_rater_test_table.csv");
        let _ = fs::remove_file(&path);

        let row = Row {
            name: "Email",
            change: Percent::Defined(1.0),
            week: Some(2),
        };
        write_table(&path, &[row]).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        write_table(
            &path,
            &[Row {
                name: "Email",
                change: Percent::Defined(1.0),
                week: Some(2),
            }],
        )
        .unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_json() {
        let path = temp_path("sales_method_rater_test_summary.json");
        let _ = fs::remove_file(&path);

        write_json(&path, &CleanStats::default()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"rows_read\": 0"));

        fs::remove_file(&path).unwrap();
    }
}
