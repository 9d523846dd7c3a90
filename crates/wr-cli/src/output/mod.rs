//! Output formatting utilities for the CLI
//!
//! Tables for tenant sessions, gateway and tenant status, pairing
//! notifications, and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use wr_core::time::elapsed_secs;
use wr_core::{Notification, Phone, SessionView};

use crate::ipc::GatewayStatus;

/// Format tenant sessions as an ASCII table
///
/// Returns "No tenant sessions" if the list is empty.
pub fn format_sessions(sessions: &[SessionView]) -> String {
    if sessions.is_empty() {
        return "No tenant sessions".to_string();
    }

    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "PHONE")]
        phone: String,
        #[tabled(rename = "SESSION")]
        id: String,
        #[tabled(rename = "STATE")]
        state: String,
        #[tabled(rename = "STARTED")]
        started: String,
        #[tabled(rename = "AGE")]
        age: String,
    }

    let rows: Vec<SessionRow> = sessions
        .iter()
        .map(|s| SessionRow {
            phone: s.phone.to_string(),
            id: truncate(&s.id.to_string(), 8),
            state: session_state(s.active, s.authenticated).to_string(),
            started: s.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format_duration(elapsed_secs(s.started_at)),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn session_state(active: bool, authenticated: bool) -> &'static str {
    match (active, authenticated) {
        (true, true) => "connected",
        (true, false) => "pairing",
        (false, true) => "inactive (paired)",
        (false, false) => "inactive",
    }
}

/// Format gateway status as a human-readable string
pub fn format_status(status: &GatewayStatus) -> String {
    let mut output = String::new();

    output.push_str("Gateway Status: Running\n");
    output.push_str(&format!("Version: {}\n", status.version));
    output.push_str(&format!(
        "Uptime: {}\n",
        format_duration(status.uptime_secs)
    ));
    output.push_str(&format!("Tenant Sessions: {}\n", status.session_count));
    output.push_str(&format!("Active: {}\n", status.active_count));
    output.push_str(&format!("Authenticated: {}\n", status.authenticated_count));

    output
}

/// Format one tenant's activation and authentication flags
pub fn format_tenant_status(phone: &Phone, active: bool, authenticated: bool) -> String {
    format!(
        "Tenant: {}\nActive: {}\nAuthenticated: {}\n",
        phone,
        yes_no(active),
        yes_no(authenticated)
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// One-line description of a pairing notification
pub fn format_notification(notification: &Notification) -> String {
    match notification {
        Notification::Authenticating { qr_path } => {
            format!("Scan the pairing code: {}", qr_path)
        }
        Notification::Authenticated => "Device paired".to_string(),
        Notification::Timeout { code } => format!("Pairing timed out ({})", code),
        Notification::Connected => "Connected with stored credential".to_string(),
    }
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn print_tagged(mut out: impl std::io::Write, color: crossterm::style::Color, tag: &str, msg: &str) {
    use crossterm::style::{Print, ResetColor, SetForegroundColor};

    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(tag),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_tagged(std::io::stdout(), crossterm::style::Color::Green, "✓ ", msg);
}

/// Print an error message to stderr in red with an X prefix
pub fn print_error(msg: &str) {
    print_tagged(std::io::stderr(), crossterm::style::Color::Red, "✗ ", msg);
}

/// Print a warning message to stderr in yellow
pub fn print_warning(msg: &str) {
    print_tagged(std::io::stderr(), crossterm::style::Color::Yellow, "⚠ ", msg);
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    print_tagged(std::io::stdout(), crossterm::style::Color::Cyan, "ℹ ", msg);
}
