//! CLI command handlers. Each command is in its own file.

mod fetch;
mod limit;
mod pull;

pub use fetch::{run_fetch, FetchArgs};
pub use limit::run_limit;
pub use pull::run_pull;
