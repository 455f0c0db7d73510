//! Outgoing response with framing.
//!
//! The response head is serialized lazily: explicit headers are collected
//! until the first `write()`/`end()` (or an explicit [`ServerResponse::write_head`]),
//! at which point the framing decision is made. A response body is either
//! length delimited by a user provided `Content-Length`, chunked, or runs
//! until the connection closes. Once the head is on the wire the headers are
//! frozen.

use crate::chunked::ChunkedEncoder;
use crate::conn::{Pipeline, PipelineDrive};
use crate::Error;
use futures_util::future::poll_fn;
use std::fmt;
use std::io;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// The interim response for `Expect: 100-continue`.
pub(crate) const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Per request facts the response framing depends on.
pub(crate) struct ResponseConfig {
    pub is_head: bool,
    pub keep_alive: bool,
    pub use_chunked_by_default: bool,
    pub expect_continue: bool,
    pub sent_continue: bool,
}

/// Handle to send the response for a single request.
///
/// Responses are delivered to the peer in the order the requests arrived,
/// regardless of the order the handlers finish in. Body data written here is
/// buffered until it is this response's turn on the wire.
pub struct ServerResponse {
    inner: Arc<Mutex<Pipeline>>,
    id: u64,
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    removed_connection: bool,
    removed_transfer_encoding: bool,
    send_date: bool,
    header_sent: bool,
    chunked: bool,
    last: bool,
    should_keep_alive: bool,
    use_chunked_by_default: bool,
    is_head: bool,
    has_body: bool,
    finished: bool,
    expect_continue: bool,
    sent_continue: bool,
    trailer: String,
}

impl ServerResponse {
    pub(crate) fn new(inner: Arc<Mutex<Pipeline>>, id: u64, cfg: ResponseConfig) -> Self {
        ServerResponse {
            inner,
            id,
            status: 200,
            reason: None,
            headers: vec![],
            removed_connection: false,
            removed_transfer_encoding: false,
            send_date: true,
            header_sent: false,
            chunked: false,
            last: false,
            should_keep_alive: cfg.keep_alive,
            use_chunked_by_default: cfg.use_chunked_by_default,
            is_head: cfg.is_head,
            has_body: !cfg.is_head,
            finished: false,
            expect_continue: cfg.expect_continue,
            sent_continue: cfg.sent_continue,
            trailer: String::new(),
        }
    }

    /// The status code to send. Defaults to 200.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Change the status code. Errors once the head is serialized.
    pub fn set_status(&mut self, status: u16) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User("set_status after response head is sent".into()));
        }
        self.status = status;
        Ok(())
    }

    /// Override the reason phrase. The default is the canonical phrase for
    /// the status code.
    pub fn set_reason(&mut self, reason: &str) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User("set_reason after response head is sent".into()));
        }
        check_value(reason)?;
        self.reason = Some(reason.to_string());
        Ok(())
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User("set_header after response head is sent".into()));
        }
        check_name(name)?;
        check_value(value)?;
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Add a header line without replacing previous ones with the same
    /// name. Useful for `set-cookie`.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User(
                "append_header after response head is sent".into(),
            ));
        }
        check_name(name)?;
        check_value(value)?;
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Get the first header value set for a name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove a header. Removing `connection` forces the connection to
    /// close after this response. Removing `date` suppresses the automatic
    /// `Date` header.
    pub fn remove_header(&mut self, name: &str) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User(
                "remove_header after response head is sent".into(),
            ));
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        if name.eq_ignore_ascii_case("connection") {
            self.removed_connection = true;
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            self.removed_transfer_encoding = true;
        } else if name.eq_ignore_ascii_case("date") {
            self.send_date = false;
        }
        Ok(())
    }

    /// Suppress or enable the automatic `Date` header. Enabled by default.
    pub fn set_send_date(&mut self, enabled: bool) {
        self.send_date = enabled;
    }

    /// Set the status and extra headers, then serialize the head right
    /// away instead of waiting for the first body write.
    pub fn write_head(&mut self, status: u16, headers: &[(&str, &str)]) -> Result<(), Error> {
        self.set_status(status)?;
        for (name, value) in headers {
            self.append_header(name, value)?;
        }
        self.send_header()
    }

    /// Send an interim `100 Continue` before the real response. Used
    /// together with [`crate::Served::CheckContinue`]. Does nothing if the
    /// continue was already sent.
    pub fn write_continue(&mut self) -> Result<(), Error> {
        if self.header_sent {
            return Err(Error::User(
                "write_continue after response head is sent".into(),
            ));
        }
        if self.sent_continue {
            return Ok(());
        }
        self.sent_continue = true;
        let mut lock = self.inner.lock().unwrap();
        lock.enqueue_output(self.id, CONTINUE_RESPONSE.to_vec())?;
        Ok(())
    }

    /// Write body data. Serializes the response head first if that hasn't
    /// happened yet.
    ///
    /// Returns `false` when the outgoing buffer is above the high water
    /// mark. The data is still accepted, but the caller should await
    /// [`ServerResponse::flushed`] before writing more.
    pub fn write(&mut self, data: &[u8]) -> Result<bool, Error> {
        if self.finished {
            return Err(Error::User("write after end".into()));
        }

        self.send_header()?;

        // HEAD, 1xx, 204 and 304 never carry a body, writes are discarded
        if !self.has_body || data.is_empty() {
            return Ok(true);
        }

        let mut out = Vec::with_capacity(data.len() + 16);
        if self.chunked {
            ChunkedEncoder::write_chunk(data, &mut out);
        } else {
            out.extend_from_slice(data);
        }

        let mut lock = self.inner.lock().unwrap();
        lock.enqueue_output(self.id, out)
    }

    /// Finish the response, optionally writing a final piece of body data.
    /// For a chunked body this emits the terminating chunk and any trailers
    /// added with [`ServerResponse::add_trailer`].
    ///
    /// Calling `end` a second time is an error.
    pub fn end(&mut self, data: Option<&[u8]>) -> Result<(), Error> {
        if self.finished {
            return Err(Error::User("end called twice".into()));
        }

        if let Some(data) = data {
            self.write(data)?;
        } else {
            self.send_header()?;
        }

        if self.chunked {
            let mut out = Vec::with_capacity(self.trailer.len() + 8);
            ChunkedEncoder::write_finish(&mut out, &self.trailer);
            let mut lock = self.inner.lock().unwrap();
            lock.enqueue_output(self.id, out)?;
        }

        self.finished = true;

        let mut lock = self.inner.lock().unwrap();
        lock.finish_output(self.id, self.last);
        Ok(())
    }

    /// Add a trailer field, sent after the terminating chunk. Trailers are
    /// silently dropped when the body isn't chunked.
    pub fn add_trailer(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.finished {
            return Err(Error::User("add_trailer after end".into()));
        }
        check_name(name)?;
        check_value(value)?;
        self.trailer.push_str(name);
        self.trailer.push_str(": ");
        self.trailer.push_str(value);
        self.trailer.push_str("\r\n");
        Ok(())
    }

    /// Wait until everything written so far for this response is flushed
    /// to the transport.
    pub async fn flushed(&self) -> Result<(), Error> {
        let inner = self.inner.clone();
        let id = self.id;
        poll_fn(move |cx| {
            inner.poll_drive_external(cx)?;
            let mut lock = inner.lock().unwrap();
            lock.poll_flushed(cx, id)
        })
        .await
    }

    fn send_header(&mut self) -> Result<(), Error> {
        if self.header_sent {
            return Ok(());
        }

        let head = self.render_head()?;
        self.header_sent = true;

        trace!("response head ({} bytes)", head.len());

        let mut lock = self.inner.lock().unwrap();
        lock.enqueue_output(self.id, head)?;
        Ok(())
    }

    /// Serialize the head and settle framing. The order matters: explicit
    /// headers are scanned first, the connection and transfer decisions
    /// come after and only fill in what the user didn't state.
    fn render_head(&mut self) -> Result<Vec<u8>, Error> {
        self.has_body = !self.is_head && !matches!(self.status, 100..=199 | 204 | 304);

        let mut buf = io::Cursor::new(Vec::with_capacity(256));

        let code = http::StatusCode::from_u16(self.status).map_err(http::Error::from)?;
        let reason = self
            .reason
            .as_deref()
            .or_else(|| code.canonical_reason())
            .unwrap_or("Unknown");
        write!(&mut buf, "HTTP/1.1 {} {}\r\n", self.status, reason)?;

        let mut sent_connection = false;
        let mut sent_content_length = false;
        let mut sent_transfer_encoding = false;
        let mut sent_date = false;

        for (name, value) in &self.headers {
            match name.to_ascii_lowercase().as_str() {
                "connection" => {
                    sent_connection = true;
                    if has_token(value, "close") {
                        // an explicit close means the body can be close
                        // delimited, no point defaulting to chunked
                        self.last = true;
                        self.use_chunked_by_default = false;
                    }
                }
                "content-length" => sent_content_length = true,
                "transfer-encoding" => {
                    sent_transfer_encoding = true;
                    if value.to_ascii_lowercase().contains("chunked") {
                        self.chunked = true;
                    }
                }
                "date" => sent_date = true,
                _ => {}
            }
            write!(&mut buf, "{}: {}\r\n", name, value)?;
        }

        if self.send_date && !sent_date {
            write!(
                &mut buf,
                "Date: {}\r\n",
                httpdate::fmt_http_date(SystemTime::now())
            )?;
        }

        // 204 and 304 are terminated by the header block, an explicit
        // chunked encoding cannot apply
        if self.chunked && (self.status == 204 || self.status == 304) {
            self.chunked = false;
            self.should_keep_alive = false;
        }

        // the client waits for a 100 that never came, closing is the only
        // way to keep the framing intact
        if self.expect_continue && !self.sent_continue {
            self.should_keep_alive = false;
        }

        let delimits_by_default =
            sent_content_length || (self.use_chunked_by_default && !self.removed_transfer_encoding);

        if self.removed_connection {
            self.last = true;
            self.should_keep_alive = false;
        } else if !sent_connection {
            if self.should_keep_alive && !self.last && delimits_by_default {
                buf.write_all(b"Connection: keep-alive\r\n")?;
            } else {
                self.last = true;
                buf.write_all(b"Connection: close\r\n")?;
            }
        }

        if !sent_content_length && !sent_transfer_encoding {
            if self.has_body {
                if self.use_chunked_by_default && !self.removed_transfer_encoding {
                    buf.write_all(b"Transfer-Encoding: chunked\r\n")?;
                    self.chunked = true;
                } else {
                    // no framing at all, the body runs to connection close
                    self.last = true;
                }
            } else {
                self.chunked = false;
            }
        }

        buf.write_all(b"\r\n")?;

        Ok(buf.into_inner())
    }
}

/// Dropping a response without ending it is a fault in the handler. If
/// nothing was sent yet we can save the connection with a canned 500,
/// otherwise the framing may be incomplete and closing is all that's left.
impl Drop for ServerResponse {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!("response dropped without end()");

        let mut lock = match self.inner.lock() {
            Ok(lock) => lock,
            Err(_) => return,
        };

        if !self.header_sent {
            let canned: &[u8] =
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            lock.enqueue_output(self.id, canned.to_vec()).ok();
        }

        lock.finish_output(self.id, true);
    }
}

impl fmt::Debug for ServerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerResponse({})", self.status)
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    let ok = !name.is_empty()
        && name
            .bytes()
            .all(|c| c.is_ascii_graphic() && c != b':' && c != b',' && c != b';');
    if !ok {
        return Err(Error::User(format!("bad header name: {:?}", name)));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<(), Error> {
    if value.bytes().any(|c| c == b'\r' || c == b'\n' || c == 0) {
        return Err(Error::User(format!("bad header value: {:?}", value)));
    }
    Ok(())
}

/// Case-insensitive token scan over a comma separated header value.
fn has_token(value: &str, token: &str) -> bool {
    value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}
