//! Final run summary
//!
//! Rendered once, to stdout, after a successful run. This is the only place
//! the generated secret is ever shown.

use stepkit::RunSummary;

/// Plain-text rendering of the summary
pub fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    let endpoint = summary
        .service_endpoint
        .as_deref()
        .unwrap_or("unknown (could not determine host address)");
    out.push_str(&format!("  {:<12}{endpoint}\n", "Console:"));

    match &summary.credential {
        Some(credential) => {
            out.push_str(&format!("  {:<12}{}\n", "User:", credential.user));
            out.push_str(&format!(
                "  {:<12}{}  (shown once, not stored)\n",
                "Password:",
                credential.secret.expose()
            ));
        }
        None => out.push_str(&format!(
            "  {:<12}unchanged (set by an earlier run)\n",
            "Password:"
        )),
    }

    let versions = if summary.installed_versions.is_empty() {
        "none".to_string()
    } else {
        summary.installed_versions.join(", ")
    };
    out.push_str(&format!("  {:<12}{versions}\n", "PHP:"));

    let extensions = if summary.installed_extensions.is_empty() {
        "none".to_string()
    } else {
        summary
            .installed_extensions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    out.push_str(&format!("  {:<12}{extensions}\n", "Extensions:"));

    out
}
