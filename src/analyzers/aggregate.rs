use crate::analyzers::labels;
use crate::analyzers::types::{GroupSummary, Percent};
use crate::analyzers::utility::median;
use crate::record::{SalesMethod, Transaction};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Built-in groupings of the cleaned transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Method,
    Week,
    MethodWeek,
}

impl GroupKey {
    /// The `(method, week)` key of a transaction under this grouping.
    pub fn key_of(self, t: &Transaction) -> (Option<SalesMethod>, Option<u32>) {
        match self {
            GroupKey::Method => (Some(t.sales_method), None),
            GroupKey::Week => (None, Some(t.week)),
            GroupKey::MethodWeek => (Some(t.sales_method), Some(t.week)),
        }
    }
}

/// Partitions transactions by `key_fn`, keeping input order inside each group.
///
/// Every transaction lands in exactly one group.
pub fn group_by<'a, K, F>(transactions: &'a [Transaction], key_fn: F) -> BTreeMap<K, Vec<&'a Transaction>>
where
    K: Ord,
    F: Fn(&Transaction) -> K,
{
    let mut groups: BTreeMap<K, Vec<&Transaction>> = BTreeMap::new();
    for t in transactions {
        groups.entry(key_fn(t)).or_default().push(t);
    }
    groups
}

/// Counts and revenue per group, in key order.
///
/// Shares are of the total row count. The allocation label is only filled in
/// for [`GroupKey::Method`].
pub fn summarize_groups(transactions: &[Transaction], key: GroupKey) -> Vec<GroupSummary> {
    let total = transactions.len();
    let groups = group_by(transactions, |t| key.key_of(t));

    let summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|((sales_method, week), rows)| {
            let revenues: Vec<f64> = rows.iter().map(|t| t.revenue).collect();
            let total_revenue: f64 = revenues.iter().sum();
            let unique_customers = rows
                .iter()
                .map(|t| t.customer_id.as_str())
                .collect::<HashSet<_>>()
                .len();
            let share_pct = Percent::of(rows.len() as f64, total as f64);

            GroupSummary {
                sales_method,
                week,
                count: rows.len(),
                unique_customers,
                share_pct,
                total_revenue,
                mean_revenue: total_revenue / rows.len() as f64,
                median_revenue: median(&revenues).unwrap_or(0.0),
                units_sold: rows.iter().map(|t| u64::from(t.nb_sold)).sum(),
                allocation: match (key, share_pct) {
                    (GroupKey::Method, Percent::Defined(p)) => Some(labels::allocation(p)),
                    _ => None,
                },
            }
        })
        .collect();

    debug!(?key, groups = summaries.len(), "Groups summarized");
    summaries
}
