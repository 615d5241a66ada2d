//! # Tickwire Wiring
//!
//! Static analysis of a wiring before anything is dispatched:
//!
//! - [`DependencyGraph`]: producer -> consumer edges derived from worker
//!   declarations, cycle detection and leveled ordering
//! - [`WiringValidator`]: proves that every wired consumer has a wired
//!   producer for each artifact it requires
//! - [`ExecutionPlan`]: the leveled order handed to the scheduler

pub mod graph;
pub mod plan;
pub mod validator;

pub use graph::DependencyGraph;
pub use plan::ExecutionPlan;
pub use validator::WiringValidator;
