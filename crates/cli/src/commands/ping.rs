//! `ping` - verify the hosted backend answers.

use redline_dashboard::config::DashboardConfig;
use redline_dashboard::supabase::SupabaseClient;

/// Issue one cheap read against the backend and report the outcome.
///
/// # Errors
///
/// Returns an error when the backend is not configured or does not answer.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::from_env()?;
    let Some(supabase_config) = &config.supabase else {
        return Err("backend not configured (set SUPABASE_URL and SUPABASE_ANON_KEY)".into());
    };

    let client = SupabaseClient::new(supabase_config)?;
    let started = std::time::Instant::now();
    client
        .postgrest()
        .from("profiles")
        .select("id")
        .limit(1)
        .fetch::<serde_json::Value>()
        .await?;

    tracing::info!(
        url = %supabase_config.url,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "backend answered"
    );
    Ok(())
}
