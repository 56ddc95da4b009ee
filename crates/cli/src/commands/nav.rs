//! `nav` - preview the sidebar a role would see.
//!
//! This is the consumer of the navigation resolver's override parameter:
//! it renders any role's menu without a session. An unrecognized role
//! previews the documented Front Desk fallback.

#![allow(clippy::print_stdout)]

use redline_core::Role;
use redline_dashboard::navigation::{FALLBACK_ROLE, resolve_navigation};

/// Print the navigation tree for a role.
///
/// # Errors
///
/// Returns an error when JSON serialization fails (it does not).
pub fn run(role: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = role.and_then(|raw| raw.parse::<Role>().ok());
    if let Some(raw) = role
        && parsed.is_none()
    {
        tracing::warn!(
            role = raw,
            fallback = FALLBACK_ROLE.as_str(),
            "unrecognized role, previewing the fallback tree"
        );
    }

    let tree = resolve_navigation(parsed);

    if json {
        println!("{}", serde_json::to_string_pretty(tree)?);
        return Ok(());
    }

    let label = parsed.unwrap_or(FALLBACK_ROLE);
    println!("Navigation for {label}:");
    for item in tree {
        println!("  {} ({})", item.title, item.href);
        for child in item.submenu {
            println!("    {} ({})", child.title, child.href);
        }
    }
    Ok(())
}
