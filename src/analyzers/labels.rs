use crate::analyzers::types::Percent;

/// Reads a method's share of customers as an allocation decision.
///
/// | Share      | Label                          |
/// |------------|--------------------------------|
/// | >= 45%     | High-volume scalability bet    |
/// | >= 30%     | Significant investment         |
/// | < 30%      | Limited allocation/pilot test  |
pub fn allocation(share_pct: f64) -> &'static str {
    match share_pct {
        p if p >= 45.0 => "High-volume scalability bet",
        p if p >= 30.0 => "Significant investment",
        _ => "Limited allocation/pilot test",
    }
}

/// Labels a group mean relative to the overall mean.
pub fn performance(vs_overall: Percent) -> &'static str {
    match vs_overall {
        Percent::Undefined => "Undefined",
        Percent::Defined(p) if p > 20.0 => "Strong outperformer",
        Percent::Defined(p) if p > 0.0 => "Above average",
        Percent::Defined(p) if p > -20.0 => "Below average",
        Percent::Defined(_) => "Significant underperformer",
    }
}

/// Labels a first-to-last-week revenue change.
pub fn trend(change: Percent) -> &'static str {
    match change {
        Percent::Undefined => "Undefined",
        Percent::Defined(p) if p > 100.0 => "Explosive growth",
        Percent::Defined(p) if p > 20.0 => "Strong growth",
        Percent::Defined(p) if p > 0.0 => "Positive growth",
        Percent::Defined(p) if p > -20.0 => "Slight decline",
        Percent::Defined(_) => "Significant decline",
    }
}
