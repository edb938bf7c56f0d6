use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::JsonRpcRequest;
use crate::server::McpServer;

/// Serve newline-delimited JSON-RPC until the reader hits EOF.
///
/// Each response is written as a single line and flushed right away.
/// Lines that are not a JSON object are dropped without a reply. Write
/// failures end the loop with the I/O error.
pub async fn serve<R, W>(mut reader: R, mut writer: W, server: &McpServer) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            tracing::info!("stdin closed, shutting down");
            return Ok(());
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let Some(request) = parse_request(line) else {
            continue;
        };

        let Some(response) = server.handle_request(request).await else {
            continue;
        };

        let mut out = match serde_json::to_vec(&response) {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                continue;
            }
        };
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }
}

fn parse_request(line: &[u8]) -> Option<JsonRpcRequest> {
    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "dropping unparseable line");
            return None;
        }
    };
    if !value.is_object() {
        tracing::debug!("dropping non-object message");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed request");
            None
        }
    }
}
