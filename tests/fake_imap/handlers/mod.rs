//! Command handlers for the fake server.
//!
//! Handlers do no I/O: each one returns the lines to send back and the
//! server writes them out in one go.

mod list;
mod select;

pub use list::list;
pub use select::open;
pub use session::{bad, capability, login, logout, noop};

/// Response lines for one command, each terminated by CRLF.
pub type Reply = Vec<String>;

/// The tagged completion line.
fn done(tag: &str, status: &str, text: &str) -> String {
    format!("{tag} {status} {text}\r\n")
}
