pub mod config_loader;
pub mod logging;

pub use config_loader::*;
pub use logging::init_tracing;
