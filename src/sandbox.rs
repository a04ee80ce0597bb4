pub mod box_pool;
pub mod driver;
mod meta;

pub use box_pool::{BoxIdGuard, BoxIdPool};
pub use driver::{IoMode, RunOutcome, SandboxConfig, SandboxDriver};
