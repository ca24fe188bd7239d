//! Tracing configuration for printdest
//!
//! Logs go to stderr so that stdout carries only the session outcome.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Default filter directives when `RUST_LOG` is not set.
///
/// ## Behavior / 行为
/// - **Development**: debug for the workspace crates
/// - **Production**: info for the workspace crates
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    let level = if is_dev { "debug" } else { "info" };
    vec![
        "warn".to_string(),
        format!("printdest_lib={level}"),
        format!("pd_core={level}"),
        format!("pd_app={level}"),
        format!("pd_infra={level}"),
    ]
}

/// Initialize the global tracing subscriber.
///
/// ## Errors / 错误
///
/// Returns `Err` if a subscriber is already registered.
pub fn init_tracing_subscriber() -> anyhow::Result<()> {
    let filter_directives = build_filter_directives(is_development());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives.join(",")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()?;
    Ok(())
}
