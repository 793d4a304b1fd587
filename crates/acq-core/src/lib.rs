pub mod config;
pub mod logging;

// Coordination core
pub mod batch;
pub mod control;
pub mod coordinator;
pub mod limit;
