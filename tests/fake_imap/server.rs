//! In-process fake IMAP server
//!
//! ```text
//!   greeting ─► STARTTLS ─► TLS handshake ─► LOGIN ─► LIST / EXAMINE … ─► LOGOUT
//! ```
//!
//! The plaintext phase only understands STARTTLS. After the handshake
//! commands are decoded with `imap-codec` and dispatched to the pure
//! handlers in `handlers/`. Anything but CAPABILITY, NOOP, LOGIN and
//! LOGOUT is refused until LOGIN succeeds.

use super::handlers::{self, Reply};
use super::io::send;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port.
///
/// A self-signed certificate is generated at startup with `rcgen`.
/// The accept loop is aborted when the server is dropped.
pub struct FakeImapServer {
    port: u16,
    connections: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        // Several tests race to install the provider; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = tls_acceptor();
        let mailbox = Arc::new(mailbox);
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let acceptor = acceptor.clone();
                let mailbox = mailbox.clone();
                tokio::spawn(async move {
                    if let Some(tls) = starttls(stream, &acceptor).await {
                        serve(tls, &mailbox).await;
                    }
                });
            }
        });

        Self {
            port,
            connections,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn tls_acceptor() -> TlsAcceptor {
    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key.into())
        .expect("build server TLS config");
    TlsAcceptor::from(Arc::new(config))
}

/// Greet, wait for STARTTLS and complete the handshake.
async fn starttls(
    stream: TcpStream,
    acceptor: &TlsAcceptor,
) -> Option<tokio_rustls::server::TlsStream<TcpStream>> {
    let mut reader = BufReader::new(stream);
    let greeting = vec!["* OK IMAP4rev1 Fake server ready\r\n".to_string()];
    send(reader.get_mut(), &greeting).await.ok()?;

    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let (tag, command) = line.trim().split_once(' ')?;

    if !command.eq_ignore_ascii_case("STARTTLS") {
        let _ = send(reader.get_mut(), &handlers::bad(tag, "Expected STARTTLS")).await;
        return None;
    }
    let ok = vec![format!("{tag} OK Begin TLS negotiation now\r\n")];
    send(reader.get_mut(), &ok).await.ok()?;

    acceptor.accept(reader.into_inner()).await.ok()
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => String::from_utf8_lossy(other.as_ref()).into_owned(),
    }
}

/// Command loop over the encrypted stream.
async fn serve<S: AsyncRead + AsyncWrite + Unpin>(stream: S, mailbox: &Mailbox) {
    let mut reader = BufReader::new(stream);
    let codec = CommandCodec::default();
    let mut authenticated = false;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = line.split_whitespace().next().unwrap_or("*");
            if send(reader.get_mut(), &handlers::bad(tag, "Parse error")).await.is_err() {
                break;
            }
            continue;
        };
        let tag = command.tag.inner();

        let (reply, close): (Reply, bool) = match command.body {
            CommandBody::Capability => (handlers::capability(tag), false),
            CommandBody::Noop => (handlers::noop(tag), false),
            CommandBody::Logout => (handlers::logout(tag), true),
            CommandBody::Login { password, .. } => {
                let password = String::from_utf8_lossy(password.declassify().as_ref()).into_owned();
                let (reply, ok) = handlers::login(tag, &password, mailbox);
                authenticated = ok;
                (reply, false)
            }
            _ if !authenticated => (handlers::bad(tag, "Not authenticated"), false),
            CommandBody::List { .. } => (handlers::list(tag, mailbox), false),
            CommandBody::Select { mailbox: mb, .. } => {
                (handlers::open(tag, &mailbox_name(&mb), false, mailbox), false)
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                (handlers::open(tag, &mailbox_name(&mb), true, mailbox), false)
            }
            _ => (handlers::bad(tag, "Unknown command"), false),
        };

        if send(reader.get_mut(), &reply).await.is_err() || close {
            break;
        }
    }
}
