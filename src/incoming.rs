//! Incoming request and its body stream.

use crate::conn::{Pipeline, PipelineDrive};
use crate::headers::HeaderSet;
use crate::AsyncRead;
use futures_channel::mpsc;
use futures_util::future::poll_fn;
use futures_util::stream::Stream;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// A request received on the connection.
///
/// The request head is fully parsed, the body is streamed via [`RecvStream`]
/// as it arrives on the transport. Dropping the message (or calling
/// [`IncomingMessage::dump`]) discards the rest of the body so the
/// connection can go on to the next request.
pub struct IncomingMessage {
    pub(crate) method: http::Method,
    pub(crate) uri: http::Uri,
    pub(crate) version: http::Version,
    pub(crate) headers: HeaderSet,
    pub(crate) trailers: Arc<Mutex<HeaderSet>>,
    pub(crate) upgrade: bool,
    pub(crate) complete: Arc<AtomicBool>,
    pub(crate) dumped: Arc<AtomicBool>,
    pub(crate) inner: Arc<Mutex<Pipeline>>,
    pub(crate) body: RecvStream,
}

impl IncomingMessage {
    /// The request method.
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The request uri. For CONNECT requests this is the authority form.
    pub fn uri(&self) -> &http::Uri {
        &self.uri
    }

    /// The http version of the request.
    pub fn version(&self) -> http::Version {
        self.version
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Shorthand for looking up a merged header value.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).map(|v| v.to_string())
    }

    /// Trailer fields received after a chunked body. Empty until the body
    /// has been read to completion.
    pub fn trailers(&self) -> HeaderSet {
        self.trailers.lock().unwrap().clone()
    }

    /// Tells if this request asked for a protocol upgrade (or is CONNECT).
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// Tells if the entire request, including any body, has been received.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// The request body.
    pub fn body_mut(&mut self) -> &mut RecvStream {
        &mut self.body
    }

    /// Turn the message into just the body stream.
    pub fn into_body(self) -> RecvStream {
        self.body
    }

    /// Discard the rest of the body without reading it.
    ///
    /// The connection reads and throws away the remaining body bytes in the
    /// background. This also happens automatically when the response for
    /// this request finishes with the body unread. Calling it twice is a
    /// no-op.
    pub fn dump(&self) {
        if !self.dumped.swap(true, Ordering::SeqCst) {
            trace!("dump requested");
            let mut lock = self.inner.lock().unwrap();
            lock.wake();
        }
    }
}

impl fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IncomingMessage({} {})", self.method, self.uri)
    }
}

/// A streaming request body.
///
/// Reading from the stream is what propagates backpressure to the peer. The
/// internal channel holds only a couple of chunks, once it is full the
/// connection stops reading from the transport until the user catches up.
pub struct RecvStream {
    rx_body: mpsc::Receiver<io::Result<Vec<u8>>>,
    ready: Option<Vec<u8>>,
    index: usize,
    consumed: Arc<AtomicBool>,
    inner: Option<Arc<Mutex<Pipeline>>>,
}

impl RecvStream {
    pub(crate) fn new(
        rx_body: mpsc::Receiver<io::Result<Vec<u8>>>,
        consumed: Arc<AtomicBool>,
        inner: Option<Arc<Mutex<Pipeline>>>,
    ) -> Self {
        RecvStream {
            rx_body,
            ready: None,
            index: 0,
            consumed,
            inner,
        }
    }

    /// Read some body data into `buf`. Returns `0` when the body is done.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        poll_fn(|cx| Pin::new(&mut *self).poll_read(cx, buf)).await
    }

    /// Read the entire body to a vec.
    pub async fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut out = vec![];
        let mut chunk = vec![0_u8; 16_384];
        loop {
            let amount = self.read(&mut chunk).await?;
            if amount == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..amount]);
        }
        Ok(out)
    }
}

impl AsyncRead for RecvStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        this.consumed.store(true, Ordering::SeqCst);

        loop {
            // serve remains of a previously received chunk first
            if let Some(ready) = &this.ready {
                if this.index < ready.len() {
                    let max = buf.len().min(ready.len() - this.index);
                    buf[..max].copy_from_slice(&ready[this.index..this.index + max]);
                    this.index += max;
                    return Poll::Ready(Ok(max));
                } else {
                    this.ready = None;
                    this.index = 0;
                }
            }

            // drive the connection so body chunks are produced
            if let Some(inner) = &this.inner {
                inner
                    .poll_drive_external(cx)
                    .map_err(|e| e.into_io())?;
            }

            match Pin::new(&mut this.rx_body).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(Ok(0)),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(Some(Ok(chunk))) => {
                    this.ready = Some(chunk);
                    this.index = 0;
                }
            }
        }
    }
}

impl fmt::Debug for RecvStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecvStream")
    }
}
