use std::collections::VecDeque;

use futures::{stream::BoxStream, Stream, StreamExt};
use tracing::trace;

use crate::{
    api::{ApiError, EventRecord},
    domain::DownloadError,
};

const DATA_PREFIX: &[u8] = b"data: ";

/// Splits a chunked byte stream into `data: ` frames.
///
/// Bytes after the last newline are held back until the next chunk arrives,
/// so a frame (or a multi-byte character) split across chunks is decoded
/// exactly once.
#[derive(Debug, Default)]
pub struct StreamFrameDecoder {
    pending: Vec<u8>,
    lines: VecDeque<Vec<u8>>,
}

impl StreamFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Complete lines become available through
    /// [`next_record`](Self::next_record).
    pub fn push(&mut self, chunk: &[u8]) {
        // Held-back bytes never contain a newline, so only the new chunk is scanned.
        let mut search = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.pending[search..].iter().position(|&b| b == b'\n') {
            let end = search + offset;
            self.lines.push_back(self.pending[start..end].to_vec());
            start = end + 1;
            search = start;
        }
        self.pending.drain(..start);
    }

    /// Next decoded record from the lines received so far, in arrival order.
    /// Lines without the `data: ` prefix are skipped.
    pub fn next_record(&mut self) -> Option<Result<EventRecord, DownloadError>> {
        while let Some(line) = self.lines.pop_front() {
            if let Some(record) = parse_line(&line) {
                return Some(record);
            }
        }
        None
    }

    /// Flush at end of stream: an unterminated final line is decoded as if
    /// it had ended with a newline. The decoder is empty afterwards.
    pub fn finish(&mut self) -> Option<Result<EventRecord, DownloadError>> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.lines.push_back(tail);
        }
        let record = self.next_record();
        if record.is_none() {
            self.lines.clear();
        }
        record
    }
}

fn parse_line(line: &[u8]) -> Option<Result<EventRecord, DownloadError>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let shown = String::from_utf8_lossy(line).into_owned();

    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(DownloadError::MalformedFrame {
                line: shown,
                reason: e.to_string(),
            }))
        }
    };

    trace!(frame = text, "decoded progress frame");
    Some(
        serde_json::from_str(text).map_err(|e| DownloadError::MalformedFrame {
            line: shown,
            reason: e.to_string(),
        }),
    )
}

enum FrameState {
    Reading {
        bytes: BoxStream<'static, Result<bytes::Bytes, ApiError>>,
        decoder: StreamFrameDecoder,
    },
    Draining {
        decoder: StreamFrameDecoder,
    },
    Finished,
}

/// Lazily decode a response body into progress records.
///
/// The stream ends when the body ends, or right after the first error
/// (transport failure or malformed frame).
pub fn frames<S>(bytes: S) -> impl Stream<Item = Result<EventRecord, DownloadError>>
where
    S: Stream<Item = Result<bytes::Bytes, ApiError>> + Send + 'static,
{
    futures::stream::unfold(
        FrameState::Reading {
            bytes: bytes.boxed(),
            decoder: StreamFrameDecoder::new(),
        },
        |state| async move {
            match state {
                FrameState::Reading {
                    mut bytes,
                    mut decoder,
                } => loop {
                    if let Some(item) = decoder.next_record() {
                        let next = if item.is_ok() {
                            FrameState::Reading { bytes, decoder }
                        } else {
                            FrameState::Finished
                        };
                        return Some((item, next));
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => decoder.push(&chunk),
                        Some(Err(e)) => {
                            return Some((
                                Err(DownloadError::transport(e)),
                                FrameState::Finished,
                            ))
                        }
                        None => return drain_tail(decoder),
                    }
                },
                FrameState::Draining { decoder } => drain_tail(decoder),
                FrameState::Finished => None,
            }
        },
    )
}

fn drain_tail(
    mut decoder: StreamFrameDecoder,
) -> Option<(Result<EventRecord, DownloadError>, FrameState)> {
    let item = decoder.finish()?;
    let next = if item.is_ok() {
        FrameState::Draining { decoder }
    } else {
        FrameState::Finished
    };
    Some((item, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EventStatus;

    const DOWNLOADING: &str =
        "data: {\"status\":\"downloading\",\"progress\":10,\"current_file\":\"a.bin\"}\n";
    const COMPLETED: &str = "data: {\"status\":\"completed\",\"progress\":100}\n";

    fn drain(decoder: &mut StreamFrameDecoder) -> Vec<Result<EventRecord, DownloadError>> {
        std::iter::from_fn(|| decoder.next_record()).collect()
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(format!("{DOWNLOADING}\n{COMPLETED}\n").as_bytes());

        let records = drain(&mut decoder);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().status, EventStatus::Downloading);
        assert_eq!(records[1].as_ref().unwrap().status, EventStatus::Completed);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let whole = {
            let mut decoder = StreamFrameDecoder::new();
            decoder.push(DOWNLOADING.as_bytes());
            decoder.next_record().unwrap().unwrap()
        };

        for split in 1..DOWNLOADING.len() {
            let mut decoder = StreamFrameDecoder::new();
            decoder.push(&DOWNLOADING.as_bytes()[..split]);
            assert!(decoder.next_record().is_none(), "split at {split}");
            decoder.push(&DOWNLOADING.as_bytes()[split..]);
            assert_eq!(decoder.next_record().unwrap().unwrap(), whole);
            assert!(decoder.next_record().is_none());
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let input = format!("{DOWNLOADING}\n{COMPLETED}");
        let mut decoder = StreamFrameDecoder::new();
        let mut records = Vec::new();
        for byte in input.as_bytes() {
            decoder.push(std::slice::from_ref(byte));
            records.extend(drain(&mut decoder));
        }

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().progress, 10);
        assert_eq!(records[1].as_ref().unwrap().status, EventStatus::Completed);
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let line = "data: {\"status\":\"downloading\",\"progress\":5,\"current_file\":\"модель.bin\"}\n";
        let bytes = line.as_bytes();
        let split = line.find('о').unwrap() + 1;

        let mut decoder = StreamFrameDecoder::new();
        decoder.push(&bytes[..split]);
        decoder.push(&bytes[split..]);
        let record = decoder.next_record().unwrap().unwrap();
        assert_eq!(record.current_file.as_deref(), Some("модель.bin"));
    }

    #[test]
    fn test_non_data_lines_are_ignored() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(b": keep-alive\nevent: progress\n\r\n\n");
        assert!(decoder.next_record().is_none());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(COMPLETED.replace('\n', "\r\n").as_bytes());
        assert_eq!(
            decoder.next_record().unwrap().unwrap().status,
            EventStatus::Completed
        );
    }

    #[test]
    fn test_malformed_frame_reports_line() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(b"data: {\"status\":\"downloading\",\n");
        match decoder.next_record() {
            Some(Err(DownloadError::MalformedFrame { line, reason })) => {
                assert_eq!(line, "data: {\"status\":\"downloading\",");
                assert!(!reason.is_empty());
            }
            other => panic!("expected malformed frame, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(COMPLETED.trim_end().as_bytes());
        assert!(decoder.next_record().is_none());
        assert_eq!(
            decoder.finish().unwrap().unwrap().status,
            EventStatus::Completed
        );
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_frames_stream_in_order() {
        let chunks: Vec<Result<bytes::Bytes, ApiError>> = vec![
            Ok(bytes::Bytes::copy_from_slice(DOWNLOADING[..20].as_bytes())),
            Ok(bytes::Bytes::from(format!("{}{COMPLETED}", &DOWNLOADING[20..]))),
        ];
        let records: Vec<_> = frames(futures::stream::iter(chunks)).collect().await;

        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.progress, 10);
        assert_eq!(first.current_file.as_deref(), Some("a.bin"));
        assert_eq!(records[1].as_ref().unwrap().status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn test_frames_stop_after_malformed_frame() {
        let chunk = format!("data: not json\n{COMPLETED}");
        let chunks: Vec<Result<bytes::Bytes, ApiError>> = vec![Ok(bytes::Bytes::from(chunk))];
        let records: Vec<_> = frames(futures::stream::iter(chunks)).collect().await;

        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(DownloadError::MalformedFrame { .. })
        ));
    }

    #[tokio::test]
    async fn test_frames_surface_transport_error() {
        let chunks: Vec<Result<bytes::Bytes, ApiError>> = vec![
            Ok(bytes::Bytes::from(DOWNLOADING)),
            Err(ApiError::ApiError("connection reset".to_string())),
            Ok(bytes::Bytes::from(COMPLETED)),
        ];
        let records: Vec<_> = frames(futures::stream::iter(chunks)).collect().await;

        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(DownloadError::Transport { .. })));
    }
}
