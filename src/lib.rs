//! printdest library
//!
//! 打印目标发现与自动选择的命令行入口所用的启动逻辑。

pub mod bootstrap;

pub use bootstrap::{run_session, SessionOutcome, SessionPaths};
