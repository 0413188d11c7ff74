//! Terminal output formatting for whostream
//!
//! This crate provides the table and JSON formatters used by the `search`,
//! `collect` and `report` commands.

pub mod output;

pub use output::{JsonFormatter, OutputFormatter, ReportView, TableFormatter, get_formatter};
