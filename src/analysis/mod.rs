//! Form guide analysis.
//!
//! `aggregator` builds one division's form guide from raw rows;
//! `assembler` runs it across every configured division.

pub mod aggregator;
pub mod assembler;

pub use assembler::{assemble_report, DivisionSpec, FailurePolicy, RunConfig};
