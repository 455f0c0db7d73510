#![allow(dead_code)]

use async_std::net::{TcpListener, TcpStream};
use futures_util::AsyncReadExt;
use hpipe_h1::{handshake, Served};
use std::future::Future;
use std::io;
use std::sync::{Arc, Once};

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("hpipe_h1", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

/// Spawn a server where every accepted request is passed to `handle` in a
/// task of its own, so slow handlers don't stop the connection from
/// accepting pipelined requests.
pub async fn run_server<F, R>(handle: F) -> io::Result<Connector>
where
    F: Fn(Served) -> R + Send + Sync + 'static,
    R: Future<Output = ()> + Send + 'static,
{
    run_server_with(handle, true).await
}

pub async fn run_server_with<F, R>(handle: F, auto_continue: bool) -> io::Result<Connector>
where
    F: Fn(Served) -> R + Send + Sync + 'static,
    R: Future<Output = ()> + Send + 'static,
{
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    async_std::task::spawn(async move {
        let handle = Arc::new(handle);

        loop {
            let (tcp, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => break,
            };

            let handle = handle.clone();

            async_std::task::spawn(async move {
                let mut conn = handshake(tcp);
                conn.set_auto_continue(auto_continue);

                while let Some(next) = conn.accept().await {
                    match next {
                        Ok(served) => {
                            async_std::task::spawn(handle(served));
                        }
                        Err(e) => panic!("server connection failed: {}", e),
                    }
                }
            });
        }
    });

    Ok(Connector(port))
}

pub struct Connector(u16);

impl Connector {
    pub async fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(format!("127.0.0.1:{}", self.0)).await
    }
}

/// Read a response head off the wire, up to and including the final CRLFCRLF.
pub async fn read_header<S: futures_io::AsyncRead + Unpin>(io: &mut S) -> io::Result<String> {
    let mut buf = vec![];
    let mut one = [0_u8; 1];

    loop {
        let amount = io.read(&mut one).await?;
        if amount == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "eof before end of header",
            ));
        }
        buf.push(one[0]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }

    Ok(String::from_utf8(buf).expect("header is utf8"))
}

/// Read exactly `len` bytes.
pub async fn read_body<S: futures_io::AsyncRead + Unpin>(
    io: &mut S,
    len: usize,
) -> io::Result<Vec<u8>> {
    let mut buf = vec![0_u8; len];
    io.read_exact(&mut buf).await?;
    Ok(buf)
}
