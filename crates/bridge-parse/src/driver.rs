use tokio::sync::mpsc;

use crate::bounded::{BoundedLine, BoundedLineAccumulator};
use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::OutputParser;

/// Default per-line cap fed to each [`BoundedLineAccumulator`] (§4.5).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

fn emit_line(
    parser: &mut dyn OutputParser,
    channel: Channel,
    line: BoundedLine,
    out: &mut Vec<ParsedEvent>,
) {
    match line {
        BoundedLine::Line(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            out.extend(parser.parse_line(channel, &text));
        }
        BoundedLine::TooLong {
            observed_bytes,
            max_line_bytes,
        } => out.push(ParsedEvent::Warning {
            message: format!(
                "dropped oversized {channel:?} line: {observed_bytes} bytes exceeds the {max_line_bytes}-byte limit"
            ),
        }),
    }
}

/// Drives both of an invocation's raw byte streams through `parser` until
/// they close, optionally forwarding every [`ParsedEvent`] to `events` as it
/// is produced (§4.5's `parseStream`). Passing `None` for `events` is
/// `parseBatch`: the caller only sees the aggregate [`ParsedResult`].
///
/// Returns the [`ParsedResult`] from [`OutputParser::finalize`] once both
/// streams have closed and any trailing partial lines have been flushed.
pub async fn drive(
    stdout_rx: &mut mpsc::Receiver<Vec<u8>>,
    stderr_rx: &mut mpsc::Receiver<Vec<u8>>,
    parser: &mut dyn OutputParser,
    max_line_bytes: usize,
    events: Option<mpsc::Sender<ParsedEvent>>,
) -> ParsedResult {
    let mut stdout_acc = BoundedLineAccumulator::new(max_line_bytes);
    let mut stderr_acc = BoundedLineAccumulator::new(max_line_bytes);
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        let mut produced = Vec::new();
        tokio::select! {
            chunk = stdout_rx.recv(), if stdout_open => {
                match chunk {
                    Some(chunk) => {
                        for line in stdout_acc.push_chunk(&chunk) {
                            emit_line(parser, Channel::Stdout, line, &mut produced);
                        }
                    }
                    None => {
                        stdout_open = false;
                        if let Some(line) = stdout_acc.finish() {
                            emit_line(parser, Channel::Stdout, line, &mut produced);
                        }
                    }
                }
            }
            chunk = stderr_rx.recv(), if stderr_open => {
                match chunk {
                    Some(chunk) => {
                        for line in stderr_acc.push_chunk(&chunk) {
                            emit_line(parser, Channel::Stderr, line, &mut produced);
                        }
                    }
                    None => {
                        stderr_open = false;
                        if let Some(line) = stderr_acc.finish() {
                            emit_line(parser, Channel::Stderr, line, &mut produced);
                        }
                    }
                }
            }
        }

        if let Some(sender) = &events {
            for event in produced {
                if sender.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    parser.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::JsonParser;

    #[tokio::test]
    async fn batch_mode_aggregates_without_an_event_subscriber() {
        let (stdout_tx, mut stdout_rx) = mpsc::channel(8);
        let (stderr_tx, mut stderr_rx) = mpsc::channel(8);
        stdout_tx.send(b"{\"ok\":true}\n".to_vec()).await.unwrap();
        drop(stdout_tx);
        drop(stderr_tx);

        let mut parser = JsonParser::new(vec![]);
        let result = drive(&mut stdout_rx, &mut stderr_rx, &mut parser, DEFAULT_MAX_LINE_BYTES, None).await;
        assert!(result.success);
        assert_eq!(result.data, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn stream_mode_forwards_events_as_they_are_produced() {
        let (stdout_tx, mut stdout_rx) = mpsc::channel(8);
        let (stderr_tx, mut stderr_rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        stdout_tx.send(b"{\"a\":1}\n".to_vec()).await.unwrap();
        stdout_tx.send(b"{\"b\":2}\n".to_vec()).await.unwrap();
        drop(stdout_tx);
        drop(stderr_tx);

        let mut parser = JsonParser::new(vec![]);
        let drive_task = tokio::spawn(async move {
            drive(
                &mut stdout_rx,
                &mut stderr_rx,
                &mut parser,
                DEFAULT_MAX_LINE_BYTES,
                Some(events_tx),
            )
            .await
        });

        let mut seen = 0;
        while events_rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        let result = drive_task.await.unwrap();
        assert!(result.success);
    }
}
