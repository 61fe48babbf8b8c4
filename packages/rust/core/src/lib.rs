//! Pipeline orchestration for leadscout.
//!
//! Ties together signal sources, analysis, the lead ledger, and delivery into
//! one run per target company. [`wiring`] builds the production collaborators
//! from [`leadscout_shared::AppConfig`].

pub mod pipeline;
pub mod wiring;

pub use pipeline::{
    AreaResult, AreaStatus, Collaborators, CompanyRun, ProgressReporter, RunOutcome, RunReport,
    SilentProgress, run_all, run_company,
};
pub use wiring::build_collaborators;
