//! Push channel over standard streams.
//!
//! Each input line is `open`, `close`, or a JSON frame such as
//! `{"event": "status_update", "data": {"deriv_status": "Connected"}}`.
//! Outbound frames are written one JSON object per line.

use std::io::Write;

use async_trait::async_trait;
use futures::StreamExt;
use linkboard_client::{PushSink, PushSource, PushSourceEvent};
use linkboard_core::PushFrame;
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_LINE_BYTES: usize = 64 * 1024;

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<PushSourceEvent>, serde_json::Error> {
    let line = line.trim();
    match line {
        "" => Ok(None),
        "open" => Ok(Some(PushSourceEvent::Opened)),
        "close" => Ok(Some(PushSourceEvent::Closed)),
        _ => serde_json::from_str::<PushFrame>(line).map(|f| Some(PushSourceEvent::Frame(f))),
    }
}

/// [`PushSource`] reading newline-delimited input.
///
/// Cancels `exhausted` once the input ends.
pub struct LinesPushSource<R> {
    lines: FramedRead<R, LinesCodec>,
    exhausted: CancellationToken,
}

impl<R: AsyncRead + Unpin + Send> LinesPushSource<R> {
    pub fn new(reader: R, exhausted: CancellationToken) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
            exhausted,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PushSource for LinesPushSource<R> {
    async fn next_event(&mut self) -> Option<PushSourceEvent> {
        loop {
            match self.lines.next().await {
                Some(Ok(line)) => match parse_line(&line) {
                    Ok(Some(event)) => return Some(event),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "skipping unparseable input line"),
                },
                Some(Err(e)) => {
                    warn!(error = %e, "push input failed");
                    break;
                }
                None => break,
            }
        }
        debug!("push input ended");
        self.exhausted.cancel();
        None
    }
}

/// [`PushSink`] writing one JSON frame per line.
pub struct WriterPushSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterPushSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl WriterPushSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> PushSink for WriterPushSink<W> {
    fn emit(&self, frame: PushFrame) {
        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, &frame)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(writer))
            .and_then(|()| writer.flush());
        if let Err(e) = result {
            warn!(event = %frame.event, error = %e, "failed to write outbound frame");
        }
    }
}

#[cfg(test)]
impl<W> WriterPushSink<W> {
    fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_words() {
        assert_eq!(parse_line("open").unwrap(), Some(PushSourceEvent::Opened));
        assert_eq!(parse_line("  close \n").unwrap(), Some(PushSourceEvent::Closed));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn json_frame() {
        let event = parse_line(r#"{"event":"status_update","data":{"mqtt_status":"Connected"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            PushSourceEvent::Frame(PushFrame::new(
                "status_update",
                json!({"mqtt_status": "Connected"})
            ))
        );
    }

    #[test]
    fn frame_without_data_gets_null() {
        let event = parse_line(r#"{"event":"request_status_update"}"#).unwrap().unwrap();
        assert_eq!(
            event,
            PushSourceEvent::Frame(PushFrame::new("request_status_update", serde_json::Value::Null))
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_line("connect please").is_err());
        assert!(parse_line(r#"{"data":{}}"#).is_err());
    }

    #[tokio::test]
    async fn source_skips_bad_lines_and_signals_end() {
        let input: &[u8] = b"open\nnot json\n\n{\"event\":\"new_signal\",\"data\":{}}\nclose\n";
        let done = CancellationToken::new();
        let mut source = LinesPushSource::new(input, done.clone());

        assert_eq!(source.next_event().await, Some(PushSourceEvent::Opened));
        assert_eq!(
            source.next_event().await,
            Some(PushSourceEvent::Frame(PushFrame::new("new_signal", json!({}))))
        );
        assert_eq!(source.next_event().await, Some(PushSourceEvent::Closed));
        assert!(!done.is_cancelled());
        assert_eq!(source.next_event().await, None);
        assert!(done.is_cancelled());
    }

    #[test]
    fn sink_writes_json_lines() {
        let sink = WriterPushSink::new(Vec::new());
        sink.emit(PushFrame::new("request_status_update", serde_json::Value::Null));
        sink.emit(PushFrame::new("ping", json!({"n": 1})));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"event":"request_status_update","data":null}"#);
        let second: PushFrame = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.data["n"], 1);
    }
}
