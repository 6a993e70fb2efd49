// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Fleetform
//!
//! Plan and state reconciliation engine for the Fleetform infrastructure-as-code tool.
//!
//! ## Overview
//!
//! Fleetform compares declared infrastructure with the last recorded
//! real-world state and produces a deterministic, reviewable plan:
//!
//! - Declare resources in HCL, JSON or YAML files organised as module directories
//! - Compute ordered changesets (create, update, delete, no-op)
//! - Record observed state with optimistic versioning, locally or in S3
//! - Stream plan and state changes to subscribers
//!
//! ## Architecture
//!
//! 1. **Desired graph**: loaded from the module tree by the [`config::ModuleRegistry`]
//! 2. **Recorded state**: owned by the [`state::StateStore`]
//! 3. **Plan**: computed by the [`planner::DiffEngine`] and cached until either input changes
//! 4. **Engine**: wires the above together and notifies subscribers
//!
//! ## Modules
//!
//! - [`resource`]: Resource identities and attribute values
//! - [`config`]: Module loading, validation and engine settings
//! - [`state`]: State store and backends (local, S3, memory)
//! - [`planner`]: Diff computation, plans and the plan cache
//! - [`notifier`]: Event fan-out to subscribers
//! - [`engine`]: The engine facade
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```hcl
//! resource "aws_s3_bucket" "my_bucket" {
//!   acl = "private"
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod planner;
pub mod resource;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{DesiredGraph, EngineSettings, Module, ModuleRegistry, SettingsParser};
pub use engine::{Engine, StateProvider};
pub use error::{FleetformError, Result};
pub use notifier::{ChangeNotifier, EngineEvent, EventErrorKind, Subscription};
pub use planner::{ChangeAction, ChangeEntry, DiffEngine, Plan, PlanCache, PlanSummary};
pub use resource::{AttributeValue, Attributes, Resource, ResourceId};
pub use state::{LocalStateBackend, MemoryStateBackend, S3StateBackend, StateBackend, StateRecord, StateStore, StateSummary};
