//! Canonical transaction types shared by every stage.

use crate::output::Table;
use crate::parser::COLUMNS;
use serde::Serialize;
use std::fmt;

/// The three sales approaches tested in the experiment.
///
/// Declaration order is the canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SalesMethod {
    #[serde(rename = "Email")]
    Email,
    #[serde(rename = "Call")]
    Call,
    #[serde(rename = "Email + Call")]
    EmailCall,
}

const EMAIL_SYNONYMS: &[&str] = &["email", "em", "e-mail", "mail"];
const CALL_SYNONYMS: &[&str] = &["call", "phone", "phone call", "telephone"];

impl SalesMethod {
    pub const ALL: [SalesMethod; 3] = [SalesMethod::Email, SalesMethod::Call, SalesMethod::EmailCall];

    pub fn label(self) -> &'static str {
        match self {
            SalesMethod::Email => "Email",
            SalesMethod::Call => "Call",
            SalesMethod::EmailCall => "Email + Call",
        }
    }

    /// Maps a raw label onto a canonical method.
    ///
    /// Folds case and whitespace, treats `&` and `and` as `+`, then matches
    /// the known synonyms. Returns `None` when the label is not recognized.
    pub fn normalize(raw: &str) -> Option<SalesMethod> {
        let lowered = raw.to_lowercase();
        let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
        let joined = collapsed
            .replace(" and ", "+")
            .replace('&', "+")
            .replace(" +", "+")
            .replace("+ ", "+");

        match joined.split_once('+') {
            Some((first, second)) => {
                let first = first.trim();
                let second = second.trim();
                if EMAIL_SYNONYMS.contains(&first) && CALL_SYNONYMS.contains(&second) {
                    Some(SalesMethod::EmailCall)
                } else {
                    None
                }
            }
            None if EMAIL_SYNONYMS.contains(&joined.as_str()) => Some(SalesMethod::Email),
            None if CALL_SYNONYMS.contains(&joined.as_str()) => Some(SalesMethod::Call),
            None => None,
        }
    }
}

impl fmt::Display for SalesMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// USPS code and full name for every accepted region.
static STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Resolves a state name or USPS code (any case) to its full name.
pub fn normalize_state(raw: &str) -> Option<&'static str> {
    let wanted = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    STATES
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(&wanted) || name.eq_ignore_ascii_case(&wanted))
        .map(|(_, name)| *name)
}

/// A cleaned customer-method-week observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub week: u32,
    pub sales_method: SalesMethod,
    pub customer_id: String,
    pub nb_sold: u32,
    pub revenue: f64,
    pub years_as_customer: u32,
    pub nb_site_visits: u32,
    pub state: String,
    #[serde(skip)]
    pub revenue_imputed: bool,
}

/// Why a row was left out of the cleaned dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingIdentifier,
    DuplicateIdentifier,
    MissingValue,
    NegativeCount,
    NegativeRevenue,
    WeekOutOfRange,
    TenureOutOfRange,
    UnknownRegion,
    NoImputationSource,
}

/// A per-row domain error. Counted and reported, never silently included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub row: u64,
    pub customer_id: Option<String>,
    pub field: &'static str,
    pub reason: RejectReason,
}

impl Table for Transaction {
    const HEADERS: &'static [&'static str] = &COLUMNS;
}

impl Table for Rejection {
    const HEADERS: &'static [&'static str] = &["row", "customer_id", "field", "reason"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_canonical_labels() {
        assert_eq!(SalesMethod::normalize("Email"), Some(SalesMethod::Email));
        assert_eq!(SalesMethod::normalize("Call"), Some(SalesMethod::Call));
        assert_eq!(
            SalesMethod::normalize("Email + Call"),
            Some(SalesMethod::EmailCall)
        );
    }

    #[test]
    fn test_normalize_folds_variants() {
        assert_eq!(SalesMethod::normalize("EM"), Some(SalesMethod::Email));
        assert_eq!(SalesMethod::normalize("  email "), Some(SalesMethod::Email));
        assert_eq!(SalesMethod::normalize("call"), Some(SalesMethod::Call));
        assert_eq!(
            SalesMethod::normalize("em + call"),
            Some(SalesMethod::EmailCall)
        );
        assert_eq!(
            SalesMethod::normalize("Email+Call"),
            Some(SalesMethod::EmailCall)
        );
        assert_eq!(
            SalesMethod::normalize("email  and   phone"),
            Some(SalesMethod::EmailCall)
        );
    }

    #[test]
    fn test_normalize_rejects_unknown() {
        assert_eq!(SalesMethod::normalize("fax"), None);
        assert_eq!(SalesMethod::normalize("call + email"), None);
        assert_eq!(SalesMethod::normalize(""), None);
    }

    #[test]
    fn test_canonical_order() {
        let mut methods = vec![SalesMethod::EmailCall, SalesMethod::Call, SalesMethod::Email];
        methods.sort();
        assert_eq!(methods, SalesMethod::ALL.to_vec());
    }

    #[test]
    fn test_normalize_state() {
        assert_eq!(normalize_state("Arizona"), Some("Arizona"));
        assert_eq!(normalize_state("new  york"), Some("New York"));
        assert_eq!(normalize_state("tx"), Some("Texas"));
        assert_eq!(normalize_state("Atlantis"), None);
    }
}
