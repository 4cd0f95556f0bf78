pub mod daemon;
pub mod tracing;

pub use daemon::{append_lines, wait_until, TestDaemon};
pub use tracing::{captured_messages, init_test_tracing};
