//! Conf module — configuration model, loading, and command-line flags.

pub mod model;
pub mod load;
pub mod cli;

pub use cli::Cli;
pub use load::ConfigError;
pub use model::StatConfig;
