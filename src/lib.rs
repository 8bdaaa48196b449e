//! Activity tracking daemon/cli that turns foreground window samples into
//! bounded activity sessions, classifies them, and rolls them up into
//! per-application and per-category summaries with a productivity score.
//!

pub mod aggregate;
pub mod category;
pub mod cli;
pub mod daemon;
pub mod utils;
pub mod window_api;
