//! Fake IMAP server for integration tests
//!
//! Speaks enough IMAP over STARTTLS for `ImapStore` to list and
//! examine folders:
//!
//! - `server` -- listener, TLS upgrade and command dispatch
//! - `handlers/` -- reply builders, one module per command group
//! - `mailbox` -- folder hierarchy, counts and credentials
//! - `io` -- writing replies

mod handlers;
mod io;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
