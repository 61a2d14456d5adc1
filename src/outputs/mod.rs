//! Output generation for run results.
//!
//! - [`json`]: writes the [`RunReport`](crate::models::RunReport) of a run to disk
//!
//! Stored summaries themselves go to the database through [`crate::store`];
//! this module only covers local artifacts.

pub mod json;
