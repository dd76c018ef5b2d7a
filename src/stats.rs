use serde::Serialize;
use std::collections::BTreeMap;

use crate::record::{RejectReason, Rejection};

/// Row accounting for one cleaning pass.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CleanStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_rejected: usize,

    // repairs
    pub revenue_imputed: usize,
    pub methods_relabeled: usize,
    pub regions_relabeled: usize,

    pub rejected_by_reason: BTreeMap<RejectReason, usize>,
}

impl CleanStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn reject_pct(&self) -> f64 {
        Self::pct(self.rows_rejected, self.rows_read)
    }

    pub fn imputed_pct(&self) -> f64 {
        Self::pct(self.revenue_imputed, self.rows_kept)
    }

    /// Fraction (0.0–1.0) of input rows that were rejected.
    pub fn reject_rate(&self) -> f64 {
        self.reject_pct() / 100.0
    }

    /// Tallies rejections by reason.
    pub fn record_rejections(&mut self, rejections: &[Rejection]) {
        self.rows_rejected = rejections.len();
        for r in rejections {
            *self.rejected_by_reason.entry(r.reason).or_default() += 1;
        }
    }

    /// Every input row is either kept or rejected.
    pub fn is_balanced(&self) -> bool {
        self.rows_kept + self.rows_rejected == self.rows_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(CleanStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(CleanStats::pct(50, 100), 50.0);
        assert_eq!(CleanStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_record_rejections() {
        let mut stats = CleanStats {
            rows_read: 4,
            rows_kept: 2,
            ..Default::default()
        };
        let reject = |row, reason| Rejection {
            row,
            customer_id: None,
            field: "customer_id",
            reason,
        };
        stats.record_rejections(&[
            reject(1, RejectReason::MissingIdentifier),
            reject(3, RejectReason::MissingIdentifier),
        ]);

        assert_eq!(stats.rows_rejected, 2);
        assert_eq!(stats.rejected_by_reason[&RejectReason::MissingIdentifier], 2);
        assert_eq!(stats.reject_pct(), 50.0);
        assert_eq!(stats.reject_rate(), 0.5);
        assert!(stats.is_balanced());
    }
}
