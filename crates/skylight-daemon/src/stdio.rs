//! Line-delimited JSON control channel.
//!
//! Each input line is one trigger message. Messages that expect a response
//! (downloads) get exactly one JSON line back, in completion order.
//! Malformed lines are logged and skipped.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use skylight_shared::{DownloadResponse, Envelope, TriggerMessage};

/// Forward messages read from `reader` to the background service and write
/// responses to `writer`. Returns the writer once the input is exhausted and
/// every outstanding response has been written.
pub async fn serve_lines<R, W>(
    reader: R,
    mut writer: W,
    messages: mpsc::Sender<Envelope>,
) -> io::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::channel::<String>(16);

    let output = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, io::Error>(writer)
    });

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match TriggerMessage::from_json(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "ignoring malformed trigger message");
                continue;
            }
        };

        if !message.expects_response() {
            if messages.send(Envelope::notify(message)).await.is_err() {
                warn!("background service stopped, closing control channel");
                break;
            }
            continue;
        }

        let (envelope, reply) = Envelope::request(message);
        if messages.send(envelope).await.is_err() {
            warn!("background service stopped, closing control channel");
            break;
        }

        let out = out_tx.clone();
        tokio::spawn(async move {
            let response = reply
                .await
                .unwrap_or_else(|_| DownloadResponse::failed("background service stopped"));
            match serde_json::to_string(&response) {
                Ok(json) => {
                    let _ = out.send(json).await;
                }
                Err(e) => warn!(error = %e, "failed to encode response"),
            }
        });
    }

    debug!("control input closed");
    drop(out_tx);

    output.await.map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_messages_and_writes_responses() {
        let input: &[u8] = b"{\"action\":\"updateWallpaper\",\"topicId\":\"nature\"}\n\
            not json at all\n\
            \n\
            {\"action\":\"downloadWallpaper\",\"wallpaperUrl\":\"https://img/x.jpg\",\"filename\":\"x.jpg\"}\n";
        let (tx, mut rx) = mpsc::channel::<Envelope>(8);

        let service = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            assert_eq!(
                first.message,
                TriggerMessage::UpdateWallpaper {
                    topic_id: Some("nature".into())
                }
            );
            assert!(first.reply.is_none());

            let second = rx.recv().await.unwrap();
            assert!(second.message.expects_response());
            second
                .reply
                .unwrap()
                .send(DownloadResponse::completed(3))
                .unwrap();

            assert!(rx.recv().await.is_none());
        });

        let written = serve_lines(input, Vec::new(), tx).await.unwrap();
        service.await.unwrap();

        assert_eq!(
            String::from_utf8(written).unwrap(),
            "{\"success\":true,\"downloadId\":3}\n"
        );
    }

    #[tokio::test]
    async fn test_dropped_reply_reports_failure() {
        let input: &[u8] =
            b"{\"action\":\"downloadWallpaper\",\"wallpaperUrl\":\"https://img/x.jpg\",\"filename\":\"x.jpg\"}\n";
        let (tx, mut rx) = mpsc::channel::<Envelope>(8);

        let service = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            drop(envelope);
        });

        let written = serve_lines(input, Vec::new(), tx).await.unwrap();
        service.await.unwrap();

        let response: DownloadResponse = serde_json::from_slice(&written).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("background service stopped"));
    }
}
