pub mod engine;
pub mod logging;
pub mod persist;
pub mod plugin;
pub mod server;
pub mod settings;
pub mod watch;
pub mod zone;

pub use engine::{run, run_with_shutdown};
pub use settings::Settings;
