//! JSONL reading and writing for the RPC channel
//!
//! - `RequestReader` reads request lines and classifies parse failures
//! - `ResponseWriter` serializes responses, one line each, from any thread

use parking_lot::Mutex;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use super::message::{RpcRequest, RpcResponse, UNKNOWN_REQUEST_ID};

/// Maximum length for raw JSON in logs (keeps script bodies out of the log)
const MAX_RAW_LOG_PREVIEW: usize = 200;

/// Truncated preview of a raw line for logging, plus its full length
pub fn log_preview(raw: &str) -> (&str, usize) {
    let len = raw.len();
    if len > MAX_RAW_LOG_PREVIEW {
        let mut end = MAX_RAW_LOG_PREVIEW;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        (&raw[..end], len)
    } else {
        (raw, len)
    }
}

/// A line that could not be turned into a request
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    /// The request id when it could still be read, otherwise `UNKNOWN_REQUEST_ID`
    pub id: u64,
    pub error: String,
}

/// Parse one request line
///
/// Parsing goes through `serde_json::Value` first so the id can be recovered
/// from a request whose other fields are wrong.
pub fn parse_request(line: &str) -> Result<RpcRequest, ParseFailure> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| ParseFailure {
        id: UNKNOWN_REQUEST_ID,
        error: format!("invalid JSON: {}", e),
    })?;

    let id = value
        .get("id")
        .and_then(|id| id.as_u64())
        .unwrap_or(UNKNOWN_REQUEST_ID);

    serde_json::from_value(value).map_err(|e| ParseFailure {
        id,
        error: format!("invalid request: {}", e),
    })
}

/// Streaming reader of request lines
pub struct RequestReader<R: Read> {
    reader: BufReader<R>,
    /// Reused between reads
    line_buffer: String,
}

impl<R: Read> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_buffer: String::with_capacity(1024),
        }
    }

    /// Next non-empty line, parsed
    ///
    /// * `Ok(Some(Ok(request)))` - a request
    /// * `Ok(Some(Err(failure)))` - a malformed line; keep reading
    /// * `Ok(None)` - end of input
    /// * `Err(e)` - the underlying reader failed
    pub fn next_request(&mut self) -> io::Result<Option<Result<RpcRequest, ParseFailure>>> {
        loop {
            self.line_buffer.clear();
            if self.reader.read_line(&mut self.line_buffer)? == 0 {
                debug!("Reached end of request stream");
                return Ok(None);
            }

            let trimmed = self.line_buffer.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = parse_request(trimmed);
            match &parsed {
                Ok(request) => {
                    debug!(id = request.id, method = %request.method, "Request received")
                }
                Err(failure) => {
                    let (preview, raw_len) = log_preview(trimmed);
                    warn!(
                        id = failure.id,
                        error = %failure.error,
                        raw_preview = %preview,
                        raw_len,
                        "Malformed request line"
                    );
                }
            }
            return Ok(Some(parsed));
        }
    }
}

/// Thread-safe JSONL response writer
pub struct ResponseWriter<W: Write> {
    inner: Arc<Mutex<W>>,
}

impl<W: Write> Clone for ResponseWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one response line and flush
    pub fn send(&self, response: &RpcResponse) -> io::Result<()> {
        let mut line = serde_json::to_string(response)?;
        line.push('\n');

        // One lock per line keeps lines from different threads whole
        let mut writer = self.inner.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_reader_skips_blank_lines_and_reports_failures() {
        let input = "\n{\"id\":1,\"method\":\"tryNut\"}\n  \nnot json\n{\"id\":5,\"params\":{}}\n";
        let mut reader = RequestReader::new(Cursor::new(input));

        let first = reader.next_request().unwrap().unwrap().unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.method, "tryNut");
        assert_eq!(first.params, serde_json::Value::Null);

        let bad = reader.next_request().unwrap().unwrap().unwrap_err();
        assert_eq!(bad.id, UNKNOWN_REQUEST_ID);
        assert!(bad.error.starts_with("invalid JSON"));

        // Missing method, but the id survives
        let bad = reader.next_request().unwrap().unwrap().unwrap_err();
        assert_eq!(bad.id, 5);

        assert!(reader.next_request().unwrap().is_none());
    }

    #[test]
    fn test_writer_emits_one_line_per_response() {
        let writer = ResponseWriter::new(Vec::new());
        writer.send(&RpcResponse::result(1, json!(null))).unwrap();
        writer.clone().send(&RpcResponse::complete(2)).unwrap();

        let out = String::from_utf8(writer.inner.lock().clone()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"id":1,"type":"result","value":null}"#);
        assert_eq!(lines[1], r#"{"id":2,"type":"complete"}"#);
    }

    #[test]
    fn test_log_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let (preview, len) = log_preview(&long);
        assert_eq!(len, 300);
        assert!(preview.len() <= MAX_RAW_LOG_PREVIEW);
        assert!(long.starts_with(preview));
    }
}
