//! CLI command implementations

mod config;
mod run;
mod shutdown;
mod start;
mod status;
mod stop;

pub use config::{config, ConfigArgs};
pub use run::{run, RunArgs};
pub use shutdown::shutdown;
pub use start::start;
pub use status::{stats, status};
pub use stop::stop;
