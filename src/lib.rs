//! Portfolio aggregation and reporting for a project/task tracker.
//!
//! Records flow one way: [`loader`] normalizes raw exports into
//! [`types::ProjectRecord`]s, [`reports`] aggregates them (using [`status`]
//! and [`calendar`]), and [`render`] turns the aggregates into chart payloads
//! and Markdown/CSV/email documents. Every step is a pure function of its
//! inputs plus the caller's notion of "today".

pub mod cache;
pub mod calendar;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod render;
pub mod reports;
pub mod status;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
