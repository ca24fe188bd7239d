pub mod loader;

pub use loader::{default_config_path, default_state_path, load_settings};
