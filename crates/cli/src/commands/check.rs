//! `check-config` - load and validate the environment configuration.

use redline_dashboard::config::DashboardConfig;

/// Load the configuration and report what the dashboard would run with.
///
/// # Errors
///
/// Returns the configuration error when loading fails, so the process
/// exits non-zero for missing/invalid variables.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::from_env()?;

    tracing::info!(addr = %config.socket_addr(), base_url = %config.base_url, "dashboard config OK");
    match &config.supabase {
        Some(supabase) => {
            tracing::info!(url = %supabase.url, "backend configured");
        }
        None => {
            tracing::warn!(
                "backend NOT configured - sign-in will be disabled (set SUPABASE_URL and SUPABASE_ANON_KEY)"
            );
        }
    }
    match &config.sentry_dsn {
        Some(_) => tracing::info!("sentry configured"),
        None => tracing::info!("sentry not configured"),
    }
    Ok(())
}
