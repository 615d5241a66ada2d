//! CLI Commands

pub mod plan;
pub mod run;
pub mod validate;

pub use plan::PlanCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;
