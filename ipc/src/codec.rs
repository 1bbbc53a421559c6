// Frames are a Content-Length header block followed by a UTF-8 JSON body:
//
//   Content-Length: <n>\r\n
//   \r\n
//   <n bytes of JSON>

use peerlink_core::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const CONTENT_LENGTH: &str = "content-length:";

/// Largest frame body accepted from the module.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serializes `message` and writes it as one frame, flushing the writer.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_string(message)?;
    let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
    debug!(bytes = body.len(), "Writing frame");
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame body. Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> BridgeResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            if saw_header {
                return Err(BridgeError::ChannelClosed(
                    "stream ended while reading frame headers".to_string(),
                ));
            }
            return Ok(None);
        }

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            // tolerate blank lines between frames
            continue;
        }
        saw_header = true;

        if trimmed.to_ascii_lowercase().starts_with(CONTENT_LENGTH) {
            let value = trimmed[CONTENT_LENGTH.len()..].trim();
            let length = value.parse::<usize>().map_err(|_| {
                BridgeError::Framing(format!("invalid Content-Length value '{}'", value))
            })?;
            content_length = Some(length);
        } else {
            debug!(header = trimmed, "Ignoring unknown frame header");
        }
    }

    let length = content_length
        .ok_or_else(|| BridgeError::Framing("missing Content-Length header".to_string()))?;
    if length > MAX_FRAME_LEN {
        return Err(BridgeError::Framing(format!(
            "frame of {} bytes exceeds the {} byte limit",
            length, MAX_FRAME_LEN
        )));
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|e| BridgeError::Framing(format!("frame body is not UTF-8: {}", e)))
}

/// Decodes a frame body.
pub fn decode<T: DeserializeOwned>(body: &str) -> BridgeResult<T> {
    serde_json::from_str(body).map_err(|e| {
        warn!("Failed to decode frame body: {}", e);
        BridgeError::from(e)
    })
}

/// Reads and decodes one frame.
pub async fn read_message<R, T>(reader: &mut R) -> BridgeResult<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => decode(&body).map(Some),
        None => Ok(None),
    }
}
