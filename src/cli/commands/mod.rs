//! CLI command implementations

pub mod config;
pub mod inspect;
pub mod remove;
pub mod report;
pub mod rerun;
pub mod run;

pub use config::execute as config;
pub use inspect::execute as inspect;
pub use remove::execute as remove;
pub use report::execute as report;
pub use rerun::execute as rerun;
pub use run::execute as run;
