//! Planning module.
//!
//! This module compares the desired graph with recorded state, producing
//! ordered plans, and caches the latest plan while its inputs are unchanged.

mod cache;
mod diff;
mod plan;

pub use cache::PlanCache;
pub use diff::{DiffEngine, changed_paths};
pub use plan::{ChangeAction, ChangeEntry, Plan, PlanSummary};
