#![warn(missing_docs, missing_debug_implementations)]
#![warn(clippy::all)]

//! An asynchronous HTTP/1.1 (and 1.0) server side connection.
//!
//! This library handles the connection level parts of serving HTTP/1.x:
//! parsing pipelined requests, streaming request bodies with backpressure,
//! framing responses (`Content-Length`, `Transfer-Encoding: chunked` or
//! close delimited) and handing the transport over for upgrades and
//! CONNECT. Which async runtime to use, TCP and TLS are handled outside
//! this library.
//!
//! Responses always go out in the order the requests arrived, no matter
//! which handler finishes first. At any point at most one response writes
//! to the transport, the rest are buffered until it is their turn.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_std::net::TcpListener;
//! use hpipe_h1::{handshake, Served};
//!
//! async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TcpListener::bind("127.0.0.1:3000").await?;
//!
//!     loop {
//!         let (tcp, _) = listener.accept().await?;
//!
//!         async_std::task::spawn(async move {
//!             let mut conn = handshake(tcp);
//!
//!             while let Some(served) = conn.accept().await {
//!                 match served {
//!                     Ok(Served::Request(req, mut res)) => {
//!                         println!("{} {}", req.method(), req.uri());
//!                         res.end(Some(b"hello\n")).ok();
//!                     }
//!                     Ok(_) => break,
//!                     Err(e) => {
//!                         eprintln!("connection error: {}", e);
//!                         break;
//!                     }
//!                 }
//!             }
//!         });
//!     }
//! }
//! ```

#[macro_use]
extern crate log;

mod chunked;
mod conn;
mod error;
mod headers;
mod incoming;
mod outgoing;
mod parse;
mod try_write;

pub use crate::conn::{handshake, Connection, Served, Upgraded};
pub use crate::error::Error;
pub use crate::headers::{HeaderSet, MergedValue};
pub use crate::incoming::{IncomingMessage, RecvStream};
pub use crate::outgoing::ServerResponse;

pub(crate) use futures_io::{AsyncRead, AsyncWrite};

pub(crate) fn err_closed<T>() -> Result<T, Error> {
    use std::io;
    Err(io::Error::new(io::ErrorKind::NotConnected, "connection is closed").into())
}
