//! CLI command implementations

pub mod inspect;
pub mod plan;
pub mod run;

pub use inspect::execute as inspect;
pub use plan::execute as plan;
pub use run::execute as run;
