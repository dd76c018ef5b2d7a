//! Analysis stages over the cleaned transactions.
//!
//! Grouping, revenue distributions, week-over-week comparison and
//! revenue-per-minute efficiency, plus the orchestration that runs them all
//! and writes the resulting tables.

pub mod aggregate;
pub mod analyzer;
pub mod distribution;
pub mod efficiency;
pub mod labels;
pub mod temporal;
pub mod types;
pub mod utility;
