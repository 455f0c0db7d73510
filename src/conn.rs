//! Server connection handling.
//!
//! A [`Connection`] wraps some established transport and accepts requests
//! off it. The shared [`Pipeline`] inside is a poll driven state machine:
//! it pumps buffered response bytes, retires finished responses in request
//! order, feeds parser events to body channels and reads more input, all
//! from whichever task happens to poll it. Request handlers run wherever
//! the user spawns them and reach the pipeline through `Arc<Mutex>`.

use crate::error::Error;
use crate::headers::HeaderSet;
use crate::incoming::{IncomingMessage, RecvStream};
use crate::outgoing::{ResponseConfig, ServerResponse, CONTINUE_RESPONSE};
use crate::parse::{ParseEvent, RequestHead, RequestParser};
use crate::try_write::try_write;
use crate::{err_closed, AsyncRead, AsyncWrite};
use futures_channel::mpsc;
use futures_util::future::poll_fn;
use futures_util::sink::Sink;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

const READ_BUF_INIT_SIZE: usize = 16_384;

/// Max size of a request head. Exceeding this is a protocol violation.
const MAX_REQUEST_HEAD: usize = 65_536;

/// Outgoing buffer level over which writers are asked to slow down.
const WRITE_HIGH_WATER: usize = 16_384;

/// Create a server connection from an established transport.
///
/// The transport typically is a TCP socket, possibly wrapped in TLS. Socket
/// setup and the async runtime are outside the scope of this crate.
pub fn handshake<S>(io: S) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    Connection(Arc::new(Mutex::new(Pipeline::new(io))))
}

/// Server connection for accepting incoming requests.
///
/// There is no built in timer. To time out an idle connection, race
/// [`Connection::accept`] against the embedding runtime's timeout and drop
/// the connection when it fires. Dropping destroys the transport and
/// abandons whatever was in flight.
///
/// See [module level doc](index.html) for an example.
pub struct Connection(Arc<Mutex<Pipeline>>);

impl Connection {
    fn poll_accept(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Served, Error>>> {
        let inner = self.0.clone();

        let mut lock = self.0.lock().unwrap();

        lock.poll_drive(cx, true, &inner)
    }

    /// Accept the next incoming request. One must accept new requests
    /// continuously to "drive" the connection forward, also for the
    /// already accepted requests.
    ///
    /// Returns `None` when the peer closed an idle connection or the last
    /// response finished with `Connection: close`.
    pub async fn accept(&mut self) -> Option<Result<Served, Error>> {
        poll_fn(|cx| self.poll_accept(cx)).await
    }

    /// Whether `Expect: 100-continue` requests are answered with an
    /// automatic interim `100 Continue` (the default). When disabled,
    /// such requests surface as [`Served::CheckContinue`] and the handler
    /// decides via [`ServerResponse::write_continue`].
    pub fn set_auto_continue(&mut self, enabled: bool) {
        let mut lock = self.0.lock().unwrap();
        lock.auto_continue = enabled;
    }

    /// Wait until the connection has sent/flushed all pending responses
    /// and is ok to drop.
    pub async fn close(self) {
        let inner = self.0.clone();

        poll_fn(|cx| {
            let mut lock = self.0.lock().unwrap();

            // whatever the value, as long as it's not pending the
            // connection has made max progress and holds nothing unsent
            match lock.poll_drive(cx, false, &inner) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(_) => Poll::Ready(()),
            }
        })
        .await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection")
    }
}

/// An accepted request.
pub enum Served {
    /// A regular request/response exchange.
    Request(IncomingMessage, ServerResponse),
    /// A request with `Expect: 100-continue` while automatic continues are
    /// disabled. The handler decides whether to send the interim response
    /// before reading the body.
    CheckContinue(IncomingMessage, ServerResponse),
    /// An upgrade or CONNECT request. The transport is handed over, the
    /// connection stops handling http.
    Upgrade(IncomingMessage, Upgraded),
}

impl fmt::Debug for Served {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Served::Request(m, _) => write!(f, "Request({:?})", m),
            Served::CheckContinue(m, _) => write!(f, "CheckContinue({:?})", m),
            Served::Upgrade(m, _) => write!(f, "Upgrade({:?})", m),
        }
    }
}

/// The transport of an upgraded connection.
///
/// Reading first serves bytes that were already buffered past the request
/// head, then continues on the raw transport. The upgrade/CONNECT response
/// head (for example `101 Switching Protocols`) is for the new protocol to
/// write, this crate does not produce it.
pub struct Upgraded {
    io: Box<dyn Io>,
    tail: Vec<u8>,
    pos: usize,
}

impl AsyncRead for Upgraded {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.pos < this.tail.len() {
            let max = buf.len().min(this.tail.len() - this.pos);
            buf[..max].copy_from_slice(&this.tail[this.pos..this.pos + max]);
            this.pos += max;
            return Poll::Ready(Ok(max));
        }

        Pin::new(&mut this.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for Upgraded {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        Pin::new(&mut this.io).poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.io).poll_flush(cx)
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.io).poll_close(cx)
    }
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upgraded")
    }
}

/// Channel end feeding body data of the request currently being parsed.
struct BodySink {
    tx: Option<mpsc::Sender<io::Result<Vec<u8>>>>,
    needs_flush: bool,
    dumped: Arc<AtomicBool>,
    complete: Arc<AtomicBool>,
    trailers: Arc<Mutex<HeaderSet>>,
}

/// Tracks whether an accepted request body was read, so the leftovers can
/// be dumped when the response retires.
struct PendingBody {
    consumed: Arc<AtomicBool>,
    dumped: Arc<AtomicBool>,
}

/// Buffered output for one response. Slots leave the queue strictly in
/// request order, only the front slot writes to the transport.
struct ResponseSlot {
    id: u64,
    pending: Vec<u8>,
    finished: bool,
    flush_done: bool,
    last: bool,
    flush_wakers: Vec<Waker>,
}

enum BodyDelivery {
    Delivered,
    Pending(Vec<u8>),
}

pub(crate) struct Pipeline {
    io: Option<Box<dyn Io>>,
    parser: RequestParser,
    read_buf: Vec<u8>,
    events: VecDeque<ParseEvent>,
    parsing: Option<BodySink>,
    bodies: VecDeque<PendingBody>,
    active: Option<ResponseSlot>,
    outgoing: VecDeque<ResponseSlot>,
    // current bytes to be written
    to_write: Vec<u8>,
    to_write_flush_after: bool,
    read_closed: bool,
    closing: bool,
    closed: bool,
    failed: bool,
    auto_continue: bool,
    next_id: u64,
    drive_wakers: Vec<Waker>,
}

impl Pipeline {
    pub(crate) fn new<S: AsyncRead + AsyncWrite + Unpin + Send + 'static>(io: S) -> Self {
        Pipeline {
            io: Some(Box::new(IoAdapt(io))),
            parser: RequestParser::new(),
            read_buf: Vec::with_capacity(READ_BUF_INIT_SIZE),
            events: VecDeque::new(),
            parsing: None,
            bodies: VecDeque::new(),
            active: None,
            outgoing: VecDeque::new(),
            to_write: vec![],
            to_write_flush_after: false,
            read_closed: false,
            closing: false,
            closed: false,
            failed: false,
            auto_continue: true,
            next_id: 0,
            drive_wakers: Vec::new(),
        }
    }

    pub(crate) fn poll_drive(
        &mut self,
        cx: &mut Context<'_>,
        want_next: bool,
        inner: &Arc<Mutex<Pipeline>>,
    ) -> Poll<Option<Result<Served, Error>>> {
        self.register_driver(cx);

        loop {
            if self.io.is_none() {
                return Poll::Ready(None);
            }

            // try write any bytes ready to be sent
            let mut writable = true;
            if !self.to_write.is_empty() || self.to_write_flush_after {
                let io = match self.io.as_mut() {
                    Some(io) => io,
                    None => return Poll::Ready(None),
                };
                match try_write(cx, io, &mut self.to_write, &mut self.to_write_flush_after) {
                    Ok(done) => writable = done,
                    Err(e) => return self.fail(e.into()),
                }
            }

            // graceful shutdown once everything is on the wire
            if self.closing {
                if !writable {
                    return Poll::Pending;
                }
                let io = match self.io.as_mut() {
                    Some(io) => io,
                    None => return Poll::Ready(None),
                };
                match Pin::new(io).poll_close(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(r) => {
                        if let Err(e) = r {
                            trace!("error closing transport: {:?}", e);
                        }
                        self.io = None;
                        self.closed = true;
                        return Poll::Ready(None);
                    }
                }
            }

            // move buffered response bytes of the active slot to the wire
            if writable {
                let mut retire_now = false;

                if let Some(slot) = self.active.as_mut() {
                    if !slot.pending.is_empty() && self.to_write.len() < WRITE_HIGH_WATER {
                        self.to_write.append(&mut slot.pending);
                        continue;
                    }

                    if slot.finished
                        && slot.pending.is_empty()
                        && self.to_write.is_empty()
                        && !slot.flush_done
                    {
                        // one flush per finished response
                        self.to_write_flush_after = true;
                        slot.flush_done = true;
                        continue;
                    }

                    let drained = slot.pending.is_empty()
                        && self.to_write.is_empty()
                        && !self.to_write_flush_after;

                    if drained {
                        for waker in slot.flush_wakers.drain(..) {
                            waker.wake();
                        }
                        if slot.finished {
                            retire_now = true;
                        }
                    }
                }

                if retire_now {
                    if let Some(slot) = self.active.take() {
                        self.retire(slot);
                    }
                    continue;
                }
            }

            // as per Sink contract, flush after send
            if let Some(sink) = self.parsing.as_mut() {
                if sink.needs_flush {
                    match sink.tx.as_mut() {
                        Some(tx) => {
                            // best effort, the RecvStream might be dropped
                            if Pin::new(tx).poll_flush(cx).is_ready() {
                                sink.needs_flush = false;
                            }
                        }
                        None => sink.needs_flush = false,
                    }
                }
            }

            // deal with parser events in arrival order
            if let Some(event) = self.events.pop_front() {
                trace!("event: {:?}", event);

                match event {
                    ParseEvent::HeadersComplete(head) => {
                        if !want_next {
                            self.events.push_front(ParseEvent::HeadersComplete(head));
                            return Poll::Ready(None);
                        }
                        if head.upgrade && (self.active.is_some() || !self.outgoing.is_empty()) {
                            // the transport can only be handed over once
                            // earlier responses are on the wire
                            self.events.push_front(ParseEvent::HeadersComplete(head));
                            return Poll::Pending;
                        }
                        let served = self.accept_head(head, inner);
                        return Poll::Ready(Some(Ok(served)));
                    }

                    ParseEvent::Body(data) => match self.deliver_body(cx, data) {
                        BodyDelivery::Delivered => continue,
                        BodyDelivery::Pending(data) => {
                            // body channel is full, the reads are suspended
                            // until the user consumes the stream
                            self.events.push_front(ParseEvent::Body(data));
                            return Poll::Pending;
                        }
                    },

                    ParseEvent::MessageComplete { trailers } => {
                        self.complete_message(trailers);
                        continue;
                    }
                }
            }

            // read phase
            if self.read_closed {
                if self.parser.is_mid_message() || !self.read_buf.is_empty() {
                    return self.fail(Error::Proto(
                        "transport closed in the middle of a request".into(),
                    ));
                }
                if self.active.is_none() && self.outgoing.is_empty() {
                    self.closing = true;
                    continue;
                }
                // responses still going out
                return Poll::Pending;
            }

            if !writable {
                // write side is backpressured, don't buffer up more input
                return Poll::Pending;
            }

            if !want_next && self.parsing.is_none() {
                // nothing drives read interest
                return Poll::Ready(None);
            }

            let pre_len = self.read_buf.len();
            self.read_buf.resize(pre_len + READ_BUF_INIT_SIZE, 0);

            let io = match self.io.as_mut() {
                Some(io) => io,
                None => return Poll::Ready(None),
            };

            match Pin::new(io).poll_read(cx, &mut self.read_buf[pre_len..]) {
                Poll::Pending => {
                    self.read_buf.truncate(pre_len);
                    return Poll::Pending;
                }
                Poll::Ready(Err(e)) => {
                    self.read_buf.truncate(pre_len);
                    return self.fail(e.into());
                }
                Poll::Ready(Ok(0)) => {
                    self.read_buf.truncate(pre_len);
                    trace!("read EOF");
                    self.read_closed = true;
                    continue;
                }
                Poll::Ready(Ok(amount)) => {
                    self.read_buf.truncate(pre_len + amount);

                    let (used, events) = match self.parser.execute(&self.read_buf) {
                        Ok(v) => v,
                        Err(e) => return self.fail(e),
                    };

                    self.read_buf.drain(..used);

                    if used == 0 && self.read_buf.len() > MAX_REQUEST_HEAD {
                        return self.fail(Error::Proto("request head too large".into()));
                    }

                    self.events.extend(events);
                    continue;
                }
            }
        }
    }

    /// Deliver a new request out of the poll loop.
    fn accept_head(&mut self, head: RequestHead, inner: &Arc<Mutex<Pipeline>>) -> Served {
        let id = self.next_id;
        self.next_id += 1;

        let mut headers = HeaderSet::new();
        for (name, value) in &head.headers {
            headers.add_header_line(name, value);
        }

        let consumed = Arc::new(AtomicBool::new(false));
        let dumped = Arc::new(AtomicBool::new(false));
        let complete = Arc::new(AtomicBool::new(head.upgrade));
        let trailers = Arc::new(Mutex::new(HeaderSet::new()));

        if head.upgrade {
            debug!("upgrade: {} {}", head.method, head.uri);

            // hand the transport over, this connection is done with it
            let io = self.io.take().expect("io present at upgrade");
            let tail = mem::take(&mut self.read_buf);
            self.closed = true;

            // empty body channel, the sender is dropped right away
            let (_tx, rx) = mpsc::channel(1);

            let msg = IncomingMessage {
                method: head.method,
                uri: head.uri,
                version: head.version,
                headers,
                trailers,
                upgrade: true,
                complete,
                dumped,
                inner: inner.clone(),
                body: RecvStream::new(rx, consumed, None),
            };

            return Served::Upgrade(msg, Upgraded { io, tail, pos: 0 });
        }

        let expect_continue = head.version == http::Version::HTTP_11
            && headers
                .get("expect")
                .map(|v| v.to_ascii_lowercase().contains("100-continue"))
                .unwrap_or(false);

        // bound channel to get backpressure
        let (tx, rx) = mpsc::channel(2);

        self.parsing = Some(BodySink {
            tx: Some(tx),
            needs_flush: false,
            dumped: dumped.clone(),
            complete: complete.clone(),
            trailers: trailers.clone(),
        });

        self.bodies.push_back(PendingBody {
            consumed: consumed.clone(),
            dumped: dumped.clone(),
        });

        let mut slot = ResponseSlot {
            id,
            pending: vec![],
            finished: false,
            flush_done: false,
            last: false,
            flush_wakers: vec![],
        };

        let sent_continue = if expect_continue && self.auto_continue {
            slot.pending.extend_from_slice(CONTINUE_RESPONSE);
            true
        } else {
            false
        };

        if self.active.is_none() {
            self.active = Some(slot);
        } else {
            self.outgoing.push_back(slot);
        }

        // HTTP/1.0 only defaults to chunked when the client announced
        // support for it
        let use_chunked_by_default = head.version == http::Version::HTTP_11
            || headers
                .get("te")
                .map(|v| v.contains("chunk"))
                .unwrap_or(false);

        let cfg = ResponseConfig {
            is_head: head.method == http::Method::HEAD,
            keep_alive: head.keep_alive,
            use_chunked_by_default,
            expect_continue,
            sent_continue,
        };

        let msg = IncomingMessage {
            method: head.method,
            uri: head.uri,
            version: head.version,
            headers,
            trailers,
            upgrade: false,
            complete,
            dumped,
            inner: inner.clone(),
            body: RecvStream::new(rx, consumed, Some(inner.clone())),
        };

        let res = ServerResponse::new(inner.clone(), id, cfg);

        if expect_continue && !self.auto_continue {
            Served::CheckContinue(msg, res)
        } else {
            Served::Request(msg, res)
        }
    }

    fn deliver_body(&mut self, cx: &mut Context<'_>, data: Vec<u8>) -> BodyDelivery {
        let sink = match self.parsing.as_mut() {
            Some(sink) => sink,
            // no receiver for this body, discard
            None => return BodyDelivery::Delivered,
        };

        if sink.dumped.load(Ordering::SeqCst) {
            sink.tx = None;
        }

        let tx = match sink.tx.as_mut() {
            Some(tx) => tx,
            None => return BodyDelivery::Delivered,
        };

        match tx.poll_ready(cx) {
            Poll::Pending => BodyDelivery::Pending(data),
            Poll::Ready(Err(_)) => {
                // the RecvStream is dropped, that's ok, we keep draining
                // the wire so the connection can be reused
                sink.tx = None;
                BodyDelivery::Delivered
            }
            Poll::Ready(Ok(())) => {
                if tx.start_send(Ok(data)).is_err() {
                    sink.tx = None;
                } else {
                    sink.needs_flush = true;
                }
                BodyDelivery::Delivered
            }
        }
    }

    fn complete_message(&mut self, trailers: Vec<(String, String)>) {
        if let Some(sink) = self.parsing.take() {
            if !trailers.is_empty() {
                let mut lock = sink.trailers.lock().unwrap();
                for (name, value) in &trailers {
                    lock.add_header_line(name, value);
                }
            }
            sink.complete.store(true, Ordering::SeqCst);
            // dropping the sender ends the body stream
        }
    }

    /// Retire the response at the front of the pipeline. The matching
    /// request body, if unread, is dumped so the next request can be
    /// parsed out of the transport.
    fn retire(&mut self, slot: ResponseSlot) {
        trace!("retire response {} (last: {})", slot.id, slot.last);

        if let Some(body) = self.bodies.pop_front() {
            if !body.consumed.load(Ordering::SeqCst) && !body.dumped.swap(true, Ordering::SeqCst) {
                debug!("dumping unread request body");
            }
        }

        if slot.last {
            self.closing = true;
        } else {
            self.active = self.outgoing.pop_front();
        }
    }

    fn fail(&mut self, e: Error) -> Poll<Option<Result<Served, Error>>> {
        debug!("connection failed: {}", e);

        // a reader mid-body learns about the failure through the channel
        if let Some(sink) = self.parsing.as_mut() {
            if let Some(tx) = sink.tx.as_mut() {
                let copy = io::Error::new(io::ErrorKind::Other, e.to_string());
                tx.try_send(Err(copy)).ok();
            }
            sink.tx = None;
        }

        self.parsing = None;
        self.active = None;
        self.outgoing.clear();
        self.bodies.clear();
        self.events.clear();
        self.io = None;
        self.closed = true;
        self.failed = true;
        self.wake();

        Poll::Ready(Some(Err(e)))
    }

    /// Queue bytes to be sent for the given response. Returns whether
    /// there is room for more without backpressure.
    pub(crate) fn enqueue_output(&mut self, id: u64, data: Vec<u8>) -> Result<bool, Error> {
        if self.closed || self.io.is_none() {
            return err_closed();
        }

        let more_room = match self.slot_mut(id) {
            Some(slot) => {
                slot.pending.extend_from_slice(&data);
                slot.pending.len() < WRITE_HIGH_WATER
            }
            None => return err_closed(),
        };

        self.wake();

        Ok(more_room && self.to_write.len() < WRITE_HIGH_WATER)
    }

    /// Mark a response complete. With `last` set the connection closes
    /// once the response is flushed.
    pub(crate) fn finish_output(&mut self, id: u64, last: bool) {
        if let Some(slot) = self.slot_mut(id) {
            trace!("finish response {} (last: {})", id, last);
            slot.finished = true;
            if last {
                slot.last = true;
            }
        }
        self.wake();
    }

    pub(crate) fn poll_flushed(&mut self, cx: &mut Context<'_>, id: u64) -> Poll<Result<(), Error>> {
        let is_active = self.active.as_ref().map(|s| s.id == id).unwrap_or(false);
        let drained =
            is_active && self.to_write.is_empty() && !self.to_write_flush_after && {
                // active slot exists, check its buffer
                self.active.as_ref().map(|s| s.pending.is_empty()).unwrap_or(false)
            };

        if drained {
            return Poll::Ready(Ok(()));
        }

        if let Some(slot) = self.slot_mut(id) {
            let waker = cx.waker();
            if !slot.flush_wakers.iter().any(|w| w.will_wake(waker)) {
                slot.flush_wakers.push(waker.clone());
            }
            return Poll::Pending;
        }

        // the slot is gone, either retired after a finished response or
        // the connection is dead
        if self.failed {
            return Poll::Ready(err_closed());
        }

        Poll::Ready(Ok(()))
    }

    pub(crate) fn wake(&mut self) {
        for waker in self.drive_wakers.drain(..) {
            waker.wake();
        }
    }

    fn register_driver(&mut self, cx: &Context<'_>) {
        let waker = cx.waker();
        if !self.drive_wakers.iter().any(|w| w.will_wake(waker)) {
            self.drive_wakers.push(waker.clone());
        }
    }

    fn slot_mut(&mut self, id: u64) -> Option<&mut ResponseSlot> {
        if self.active.as_ref().map(|s| s.id == id).unwrap_or(false) {
            return self.active.as_mut();
        }
        self.outgoing.iter_mut().find(|s| s.id == id)
    }
}

// ***************** Helper to drive the connection externally *********************

pub(crate) trait PipelineDrive {
    fn poll_drive_external(&self, cx: &mut Context<'_>) -> Result<(), Error>;
}

impl PipelineDrive for Arc<Mutex<Pipeline>> {
    fn poll_drive_external(&self, cx: &mut Context<'_>) -> Result<(), Error> {
        let mut lock = self.lock().unwrap();

        match lock.poll_drive(cx, false, self) {
            Poll::Pending => {
                // this is ok, we have made max progress
                Ok(())
            }

            Poll::Ready(Some(Err(e))) => Err(e),

            Poll::Ready(Some(Ok(_))) => {
                // invariant: we must not receive the next request here
                unreachable!("got next request in poll_drive_external")
            }

            Poll::Ready(None) => Ok(()),
        }
    }
}

// ***************** Boiler plate to hide IO behind a Box<dyn trait> ***************

trait Io: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

struct IoAdapt<S>(S);

impl<S> Io for IoAdapt<S> where S: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<S> AsyncRead for IoAdapt<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        Pin::new(&mut this.0).poll_read(cx, buf)
    }
}

impl<S> AsyncWrite for IoAdapt<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        Pin::new(&mut this.0).poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.0).poll_flush(cx)
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.0).poll_close(cx)
    }
}
