//! Overlay config rendering
//!
//! Produces the per-node overlay file in the runtime's term syntax:
//!
//! ```text
//! [
//!     {onepanel, [
//!         {oz_worker_cmd, "service oz_worker"},
//!         {onepanel_cmd, "service oz_panel"}
//!     ]}
//! ].
//! ```

use crate::domain::entities::{Application, CONFIG_ROOT};

const INDENT: &str = "    ";

/// Render the overlay config for an ordered application list.
///
/// Output is deterministic: applications in list order, attributes in the
/// order their role defines them.
pub fn render_overlay_config(apps: &[Application]) -> String {
    let entries: Vec<(String, String)> = apps.iter().flat_map(Application::keyed_attributes).collect();

    let mut out = String::new();
    out.push_str("[\n");
    out.push_str(&format!("{INDENT}{{{CONFIG_ROOT}, [\n"));
    for (i, (key, value)) in entries.iter().enumerate() {
        let separator = if i + 1 == entries.len() { "" } else { "," };
        out.push_str(&format!(
            "{INDENT}{INDENT}{}{separator}\n",
            format_entry(key, value)
        ));
    }
    out.push_str(&format!("{INDENT}]}}\n"));
    out.push_str("].\n");
    out
}

/// `{Key, "Value"}`
pub fn format_entry(key: &str, value: &str) -> String {
    format!("{{{}, \"{}\"}}", key, escape_string(value))
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
