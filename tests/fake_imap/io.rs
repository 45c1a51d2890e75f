//! Writing replies to the client.

use super::handlers::Reply;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Write every line of `reply`, then flush.
pub async fn send<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> std::io::Result<()> {
    for line in reply {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await
}
