pub mod system_clock;
pub mod timer;

pub use system_clock::SystemClock;
pub use timer::TokioTimer;
