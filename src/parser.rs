//! CSV reader for raw sales transactions.
//!
//! Checks the header against the expected schema and deserializes every row
//! into untyped cells. Typing and domain checks happen in [`crate::cleaner`].

use crate::error::{RaterError, RaterResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

/// The columns every input file must carry, in canonical output order.
pub const COLUMNS: [&str; 8] = [
    "week",
    "sales_method",
    "customer_id",
    "nb_sold",
    "revenue",
    "years_as_customer",
    "nb_site_visits",
    "state",
];

/// One input row before typing. Empty cells deserialize to `None`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRow {
    pub week: Option<String>,
    pub sales_method: Option<String>,
    pub customer_id: Option<String>,
    pub nb_sold: Option<String>,
    pub revenue: Option<String>,
    pub years_as_customer: Option<String>,
    pub nb_site_visits: Option<String>,
    pub state: Option<String>,
}

/// Reads and schema-checks raw rows from any reader.
///
/// # Errors
///
/// Returns [`RaterError::MissingColumn`] or [`RaterError::ExtraColumn`] when
/// the header does not match [`COLUMNS`], or a CSV error for malformed input.
pub fn read_raw_rows<R: Read>(reader: R) -> RaterResult<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    check_headers(rdr.headers()?)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RawRow = result?;
        rows.push(row);
    }

    debug!(rows = rows.len(), "Raw rows read");
    Ok(rows)
}

/// Opens `path` and reads its raw rows.
pub fn read_raw_file(path: &str) -> RaterResult<Vec<RawRow>> {
    let file = File::open(path)?;
    read_raw_rows(file)
}

fn check_headers(headers: &csv::StringRecord) -> RaterResult<()> {
    let mut seen = HashSet::new();
    for header in headers.iter() {
        if !COLUMNS.contains(&header) || !seen.insert(header) {
            return Err(RaterError::ExtraColumn {
                column: header.to_string(),
            });
        }
    }

    if let Some(missing) = COLUMNS.iter().find(|c| !seen.contains(**c)) {
        return Err(RaterError::MissingColumn {
            column: missing.to_string(),
        });
    }

    Ok(())
}

/// Returns the trimmed cell, treating blank cells as missing.
pub fn cell(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses a present cell as `T`, failing with a schema error that names the
/// row and field.
pub fn parse_cell<T: FromStr>(
    row: u64,
    field: &str,
    value: &Option<String>,
    expected: &'static str,
) -> RaterResult<Option<T>> {
    match cell(value) {
        None => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| RaterError::InvalidType {
                row,
                field: field.to_string(),
                value: text.to_string(),
                expected,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "week,sales_method,customer_id,nb_sold,revenue,years_as_customer,nb_site_visits,state";

    #[test]
    fn test_reads_rows_with_missing_cells() {
        let data = format!("{HEADER}\n2,Email,abc,10,,1,24,Arizona\n");
        let rows = read_raw_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_id.as_deref(), Some("abc"));
        assert_eq!(cell(&rows[0].revenue), None);
    }

    #[test]
    fn test_accepts_any_column_order() {
        let data = "state,nb_site_visits,years_as_customer,revenue,nb_sold,customer_id,sales_method,week\n\
                    Ohio,20,3,95.5,9,x1,Call,4\n";
        let rows = read_raw_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].week.as_deref(), Some("4"));
        assert_eq!(rows[0].state.as_deref(), Some("Ohio"));
    }

    #[test]
    fn test_missing_column() {
        let data = "week,sales_method,customer_id,nb_sold,revenue,years_as_customer,nb_site_visits\n";
        let err = read_raw_rows(data.as_bytes()).unwrap_err();
        assert!(matches!(err, RaterError::MissingColumn { ref column } if column == "state"));
    }

    #[test]
    fn test_extra_column() {
        let data = format!("{HEADER},discount\n");
        let err = read_raw_rows(data.as_bytes()).unwrap_err();
        assert!(matches!(err, RaterError::ExtraColumn { ref column } if column == "discount"));
    }

    #[test]
    fn test_duplicate_column() {
        let data = format!("{HEADER},week\n");
        let err = read_raw_rows(data.as_bytes()).unwrap_err();
        assert!(matches!(err, RaterError::ExtraColumn { ref column } if column == "week"));
    }

    #[test]
    fn test_parse_cell_invalid_type() {
        let value = Some("three".to_string());
        let err = parse_cell::<i64>(7, "week", &value, "integer").unwrap_err();
        assert!(matches!(err, RaterError::InvalidType { row: 7, .. }));
    }

    #[test]
    fn test_parse_cell_blank_is_missing() {
        let value = Some("   ".to_string());
        assert_eq!(parse_cell::<i64>(1, "week", &value, "integer").unwrap(), None);
    }
}
