//! Shared helpers and constants.

use chrono::Utc;

pub const APP_NAME: &str = "forumbridge_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn print_banner() {
    eprintln!("{APP_NAME} {}", env!("CARGO_PKG_VERSION"));
}
