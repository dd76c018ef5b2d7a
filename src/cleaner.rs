//! Validation, normalization and revenue imputation.
//!
//! Turns [`RawRow`]s into [`Transaction`]s. Schema problems and
//! unrecognized method labels abort the load; per-row domain problems become
//! [`Rejection`]s. Every input row ends up either kept or rejected.
//!
//! Missing revenue is imputed with the median observed revenue of rows that
//! share the same method and units sold, falling back to the method median.

use crate::analyzers::utility::median;
use crate::config::RaterConfig;
use crate::error::{RaterError, RaterResult};
use crate::parser::{RawRow, cell, parse_cell, read_raw_file};
use crate::record::{RejectReason, Rejection, SalesMethod, Transaction, normalize_state};
use crate::stats::CleanStats;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Output of the cleaning stage.
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    /// Kept rows, sorted ascending by `customer_id`.
    pub transactions: Vec<Transaction>,
    /// Rejected rows, in input order.
    pub rejections: Vec<Rejection>,
    pub stats: CleanStats,
}

impl CleanedDataset {
    /// Methods that appear in the cleaned data, in canonical order.
    pub fn methods(&self) -> Vec<SalesMethod> {
        let present: HashSet<SalesMethod> =
            self.transactions.iter().map(|t| t.sales_method).collect();
        SalesMethod::ALL
            .into_iter()
            .filter(|m| present.contains(m))
            .collect()
    }
}

/// A typed row that passed every check except revenue imputation.
struct Pending {
    row: u64,
    customer_id: String,
    sales_method: SalesMethod,
    week: u32,
    nb_sold: u32,
    revenue: Option<f64>,
    years_as_customer: u32,
    nb_site_visits: u32,
    state: String,
    method_relabeled: bool,
    region_relabeled: bool,
}

/// Reads `path` and cleans it.
#[tracing::instrument(skip(config))]
pub fn load_and_clean(path: &str, config: &RaterConfig) -> RaterResult<CleanedDataset> {
    let rows = read_raw_file(path)?;
    clean(rows, config)
}

/// Validates and normalizes raw rows.
///
/// # Errors
///
/// Fails on the first unparseable cell, the first unrecognized method label,
/// an empty input, or when the rejected share exceeds
/// `config.max_reject_rate`.
pub fn clean(rows: Vec<RawRow>, config: &RaterConfig) -> RaterResult<CleanedDataset> {
    let mut stats = CleanStats {
        rows_read: rows.len(),
        ..Default::default()
    };
    if rows.is_empty() {
        return Err(RaterError::EmptyDataset);
    }

    let mut rejections = Vec::new();
    let mut pending = Vec::with_capacity(rows.len());
    let mut seen_ids = HashSet::new();

    for (index, raw) in rows.iter().enumerate() {
        let row = index as u64 + 1;
        match check_row(row, raw, config, &mut seen_ids)? {
            Ok(p) => pending.push(p),
            Err(rejection) => rejections.push(rejection),
        }
    }

    let (transactions, unimputable) = impute_revenue(pending, &mut stats);
    rejections.extend(unimputable);
    rejections.sort_by_key(|r| r.row);

    stats.rows_kept = transactions.len();
    stats.record_rejections(&rejections);

    if stats.reject_rate() > config.max_reject_rate {
        warn!(
            rejected = stats.rows_rejected,
            total = stats.rows_read,
            threshold = config.max_reject_rate,
            "Reject rate above threshold"
        );
        return Err(RaterError::RejectRateExceeded {
            rejected: stats.rows_rejected,
            total: stats.rows_read,
            threshold: config.max_reject_rate,
        });
    }
    if transactions.is_empty() {
        return Err(RaterError::EmptyDataset);
    }

    info!(
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        rows_rejected = stats.rows_rejected,
        revenue_imputed = stats.revenue_imputed,
        methods_relabeled = stats.methods_relabeled,
        "Cleaning complete"
    );

    Ok(CleanedDataset {
        transactions,
        rejections,
        stats,
    })
}

/// Types and checks a single row.
///
/// The outer `Result` carries fatal errors, the inner one a rejection.
fn check_row(
    row: u64,
    raw: &RawRow,
    config: &RaterConfig,
    seen_ids: &mut HashSet<String>,
) -> RaterResult<Result<Pending, Rejection>> {
    // Parse every cell first so schema errors surface even on rows that would
    // be rejected anyway.
    let week = parse_cell::<i64>(row, "week", &raw.week, "integer")?;
    let nb_sold = parse_cell::<i64>(row, "nb_sold", &raw.nb_sold, "integer")?;
    let revenue = parse_revenue(row, &raw.revenue)?;
    let years = parse_cell::<i64>(row, "years_as_customer", &raw.years_as_customer, "integer")?;
    let visits = parse_cell::<i64>(row, "nb_site_visits", &raw.nb_site_visits, "integer")?;

    let method = match cell(&raw.sales_method) {
        Some(label) => {
            let method = SalesMethod::normalize(label).ok_or_else(|| {
                RaterError::NormalizationAmbiguity {
                    row,
                    label: label.to_string(),
                }
            })?;
            Some((method, label != method.label()))
        }
        None => None,
    };

    let customer_id = cell(&raw.customer_id).map(str::to_string);
    let reject = |field: &'static str, reason: RejectReason| Rejection {
        row,
        customer_id: customer_id.clone(),
        field,
        reason,
    };

    let Some(id) = customer_id.clone() else {
        return Ok(Err(reject("customer_id", RejectReason::MissingIdentifier)));
    };
    // An id is only claimed once its row passes every check.
    if seen_ids.contains(&id) {
        return Ok(Err(reject("customer_id", RejectReason::DuplicateIdentifier)));
    }

    let Some((sales_method, method_relabeled)) = method else {
        return Ok(Err(reject("sales_method", RejectReason::MissingValue)));
    };

    let Some(week) = week else {
        return Ok(Err(reject("week", RejectReason::MissingValue)));
    };
    if week < i64::from(config.first_week) || week > i64::from(config.last_week) {
        return Ok(Err(reject("week", RejectReason::WeekOutOfRange)));
    }

    let counts = [
        ("nb_sold", nb_sold),
        ("years_as_customer", years),
        ("nb_site_visits", visits),
    ];
    let mut typed = [0u32; 3];
    for (slot, (field, value)) in typed.iter_mut().zip(counts) {
        match value {
            None => return Ok(Err(reject(field, RejectReason::MissingValue))),
            Some(v) => match u32::try_from(v) {
                Ok(v) => *slot = v,
                Err(_) if v < 0 => return Ok(Err(reject(field, RejectReason::NegativeCount))),
                Err(_) => {
                    return Err(RaterError::InvalidType {
                        row,
                        field: field.to_string(),
                        value: v.to_string(),
                        expected: "32-bit count",
                    });
                }
            },
        }
    }
    let [nb_sold, years_as_customer, nb_site_visits] = typed;

    if years_as_customer > config.max_tenure_years {
        return Ok(Err(reject("years_as_customer", RejectReason::TenureOutOfRange)));
    }

    if revenue.is_some_and(|r| r < 0.0) {
        return Ok(Err(reject("revenue", RejectReason::NegativeRevenue)));
    }

    let Some(raw_state) = cell(&raw.state) else {
        return Ok(Err(reject("state", RejectReason::MissingValue)));
    };
    let Some(state) = normalize_state(raw_state) else {
        return Ok(Err(reject("state", RejectReason::UnknownRegion)));
    };
    seen_ids.insert(id.clone());
    Ok(Ok(Pending {
        row,
        customer_id: id,
        sales_method,
        week: week as u32,
        nb_sold,
        revenue,
        years_as_customer,
        nb_site_visits,
        state: state.to_string(),
        method_relabeled,
        region_relabeled: raw_state != state,
    }))
}

/// `NaN` in the source means "not recorded", the same as an empty cell.
/// Infinite values are a schema error.
fn parse_revenue(row: u64, value: &Option<String>) -> RaterResult<Option<f64>> {
    match parse_cell::<f64>(row, "revenue", value, "number")? {
        Some(v) if v.is_nan() => Ok(None),
        Some(v) if v.is_infinite() => Err(RaterError::InvalidType {
            row,
            field: "revenue".to_string(),
            value: v.to_string(),
            expected: "finite number",
        }),
        other => Ok(other),
    }
}

/// Fills missing revenue and sorts the kept rows by identifier.
fn impute_revenue(
    pending: Vec<Pending>,
    stats: &mut CleanStats,
) -> (Vec<Transaction>, Vec<Rejection>) {
    let mut by_cell: BTreeMap<(SalesMethod, u32), Vec<f64>> = BTreeMap::new();
    let mut by_method: BTreeMap<SalesMethod, Vec<f64>> = BTreeMap::new();
    for p in &pending {
        if let Some(revenue) = p.revenue {
            by_cell
                .entry((p.sales_method, p.nb_sold))
                .or_default()
                .push(revenue);
            by_method.entry(p.sales_method).or_default().push(revenue);
        }
    }

    let cell_medians: BTreeMap<_, _> = by_cell
        .into_iter()
        .filter_map(|(k, v)| median(&v).map(|m| (k, m)))
        .collect();
    let method_medians: BTreeMap<_, _> = by_method
        .into_iter()
        .filter_map(|(k, v)| median(&v).map(|m| (k, m)))
        .collect();

    let mut transactions = Vec::with_capacity(pending.len());
    let mut rejections = Vec::new();

    for p in pending {
        let (revenue, revenue_imputed) = match p.revenue {
            Some(r) => (r, false),
            None => {
                let imputed = cell_medians
                    .get(&(p.sales_method, p.nb_sold))
                    .or_else(|| method_medians.get(&p.sales_method));
                match imputed {
                    Some(m) => (*m, true),
                    None => {
                        rejections.push(Rejection {
                            row: p.row,
                            customer_id: Some(p.customer_id),
                            field: "revenue",
                            reason: RejectReason::NoImputationSource,
                        });
                        continue;
                    }
                }
            }
        };

        if revenue_imputed {
            stats.revenue_imputed += 1;
        }
        if p.method_relabeled {
            stats.methods_relabeled += 1;
        }
        if p.region_relabeled {
            stats.regions_relabeled += 1;
        }

        transactions.push(Transaction {
            week: p.week,
            sales_method: p.sales_method,
            customer_id: p.customer_id,
            nb_sold: p.nb_sold,
            revenue,
            years_as_customer: p.years_as_customer,
            nb_site_visits: p.nb_site_visits,
            state: p.state,
            revenue_imputed,
        });
    }

    transactions.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    (transactions, rejections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, method: &str, week: &str, revenue: &str) -> RawRow {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawRow {
            week: opt(week),
            sales_method: opt(method),
            customer_id: opt(id),
            nb_sold: Some("10".to_string()),
            revenue: opt(revenue),
            years_as_customer: Some("2".to_string()),
            nb_site_visits: Some("24".to_string()),
            state: Some("Ohio".to_string()),
        }
    }

    fn lenient() -> RaterConfig {
        RaterConfig {
            max_reject_rate: 1.0,
            ..RaterConfig::default()
        }
    }

    #[test]
    fn test_normalizes_three_methods() {
        let rows = vec![
            raw("a", "EM", "1", "100"),
            raw("b", "em + call", "1", "200"),
            raw("c", "call", "1", "50"),
        ];
        let cleaned = clean(rows, &RaterConfig::default()).unwrap();

        assert_eq!(cleaned.transactions.len(), 3);
        assert!(cleaned.rejections.is_empty());
        assert_eq!(cleaned.stats.methods_relabeled, 3);
        assert_eq!(
            cleaned.methods(),
            vec![SalesMethod::Email, SalesMethod::Call, SalesMethod::EmailCall]
        );
    }

    #[test]
    fn test_sorted_by_identifier() {
        let rows = vec![
            raw("z", "Email", "1", "1"),
            raw("m", "Email", "1", "2"),
            raw("a", "Email", "1", "3"),
        ];
        let cleaned = clean(rows, &RaterConfig::default()).unwrap();
        let ids: Vec<_> = cleaned
            .transactions
            .iter()
            .map(|t| t.customer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_unknown_method_is_fatal() {
        let rows = vec![raw("a", "Email", "1", "1"), raw("b", "carrier pigeon", "1", "2")];
        let err = clean(rows, &lenient()).unwrap_err();
        assert!(
            matches!(err, RaterError::NormalizationAmbiguity { row: 2, ref label } if label == "carrier pigeon")
        );
    }

    #[test]
    fn test_unparseable_cell_is_fatal() {
        let rows = vec![raw("a", "Email", "one", "1")];
        let err = clean(rows, &lenient()).unwrap_err();
        assert!(matches!(err, RaterError::InvalidType { row: 1, ref field, .. } if field == "week"));
    }

    #[test]
    fn test_rejections_are_counted() {
        let mut bad_state = raw("e", "Email", "1", "5");
        bad_state.state = Some("Atlantis".to_string());
        let mut negative_visits = raw("f", "Email", "1", "5");
        negative_visits.nb_site_visits = Some("-3".to_string());

        let rows = vec![
            raw("a", "Email", "1", "10"),
            raw("", "Email", "1", "10"),
            raw("a", "Call", "2", "10"),
            raw("c", "Email", "9", "10"),
            raw("d", "Email", "1", "-4"),
            bad_state,
            negative_visits,
        ];
        let cleaned = clean(rows, &lenient()).unwrap();

        assert_eq!(cleaned.transactions.len(), 1);
        let reasons: Vec<_> = cleaned.rejections.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RejectReason::MissingIdentifier,
                RejectReason::DuplicateIdentifier,
                RejectReason::WeekOutOfRange,
                RejectReason::NegativeRevenue,
                RejectReason::UnknownRegion,
                RejectReason::NegativeCount,
            ]
        );
        assert!(cleaned.stats.is_balanced());
        assert_eq!(cleaned.stats.rows_rejected, 6);
    }

    #[test]
    fn test_rejected_first_occurrence_does_not_claim_id() {
        let rows = vec![
            raw("dup", "Email", "9", "10"),
            raw("dup", "Email", "1", "20"),
            raw("ok", "Call", "1", "5"),
        ];
        let cleaned = clean(rows, &lenient()).unwrap();

        let ids: Vec<_> = cleaned
            .transactions
            .iter()
            .map(|t| t.customer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["dup", "ok"]);
        assert_eq!(cleaned.transactions[0].revenue, 20.0);
        assert_eq!(cleaned.rejections.len(), 1);
        assert_eq!(cleaned.rejections[0].row, 1);
        assert_eq!(cleaned.rejections[0].reason, RejectReason::WeekOutOfRange);
    }

    #[test]
    fn test_relabels_counted_for_kept_rows_only() {
        let mut coded = raw("b", "em", "1", "10");
        coded.state = Some("oh".to_string());
        let rows = vec![raw("a", "Email", "1", "10"), raw("a", "em", "1", "10"), coded];
        let cleaned = clean(rows, &lenient()).unwrap();

        assert_eq!(cleaned.transactions.len(), 2);
        assert_eq!(cleaned.stats.methods_relabeled, 1);
        assert_eq!(cleaned.stats.regions_relabeled, 1);
    }

    #[test]
    fn test_reject_rate_threshold() {
        let rows = vec![raw("a", "Email", "1", "10"), raw("", "Email", "1", "10")];
        let err = clean(rows, &RaterConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            RaterError::RejectRateExceeded {
                rejected: 1,
                total: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_imputes_from_method_and_units_median() {
        let mut other_units = raw("d", "Email", "1", "1000");
        other_units.nb_sold = Some("12".to_string());
        let rows = vec![
            raw("a", "Email", "1", "90"),
            raw("b", "Email", "2", "100"),
            raw("c", "Email", "3", ""),
            other_units,
        ];
        let cleaned = clean(rows, &RaterConfig::default()).unwrap();

        let imputed = cleaned
            .transactions
            .iter()
            .find(|t| t.customer_id == "c")
            .unwrap();
        assert!(imputed.revenue_imputed);
        assert_eq!(imputed.revenue, 95.0);
        assert_eq!(cleaned.stats.revenue_imputed, 1);
        assert_eq!(cleaned.stats.rows_kept, 4);
    }

    #[test]
    fn test_imputes_from_method_median_when_units_unseen() {
        let mut unseen = raw("c", "Call", "1", "");
        unseen.nb_sold = Some("15".to_string());
        let rows = vec![
            raw("a", "Call", "1", "40"),
            raw("b", "Call", "1", "60"),
            unseen,
        ];
        let cleaned = clean(rows, &RaterConfig::default()).unwrap();
        let imputed = cleaned
            .transactions
            .iter()
            .find(|t| t.customer_id == "c")
            .unwrap();
        assert_eq!(imputed.revenue, 50.0);
    }

    #[test]
    fn test_nan_revenue_is_missing() {
        let rows = vec![raw("a", "Call", "1", "40"), raw("b", "Call", "1", "NaN")];
        let cleaned = clean(rows, &RaterConfig::default()).unwrap();
        assert_eq!(cleaned.stats.revenue_imputed, 1);
    }

    #[test]
    fn test_no_imputation_source_rejects() {
        let rows = vec![raw("a", "Email", "1", "10"), raw("b", "Call", "1", "")];
        let cleaned = clean(rows, &lenient()).unwrap();
        assert_eq!(cleaned.rejections.len(), 1);
        assert_eq!(cleaned.rejections[0].reason, RejectReason::NoImputationSource);
        assert!(cleaned.stats.is_balanced());
    }

    #[test]
    fn test_empty_input() {
        let err = clean(Vec::new(), &RaterConfig::default()).unwrap_err();
        assert!(matches!(err, RaterError::EmptyDataset));
    }
}
