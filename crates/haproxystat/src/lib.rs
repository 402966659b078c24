// Domain-driven module structure for haproxystat.

// Core infrastructure
pub mod parser;
pub mod pipeline;
pub mod transport;

// Domain modules
pub mod runtime;
pub mod conf;
pub mod stats;
pub mod job;
