//! The parser event feed.
//!
//! [`RequestParser`] turns raw bytes into an ordered sequence of
//! [`ParseEvent`]s. The connection pipeline consumes the events from a queue
//! instead of being called back from inside the tokenizer, which keeps the
//! state machine flat: no callback ever re-enters the pipeline.
//!
//! `execute()` consumes as much of the offered slice as it can and reports
//! how far it got. A partial request head or chunk consumes nothing, the
//! caller keeps the bytes and re-offers them once more arrive. After an
//! upgrade/CONNECT head the parser consumes nothing further, the byte tail
//! belongs to the next protocol.

use crate::chunked::ChunkedDecoder;
use crate::Error;

/// Parsed request line and headers, everything the pipeline needs to accept
/// a request.
#[derive(Debug)]
pub(crate) struct RequestHead {
    pub method: http::Method,
    pub uri: http::Uri,
    pub version: http::Version,
    /// Raw header pairs in wire order, original casing.
    pub headers: Vec<(String, String)>,
    /// CONNECT request, or an `Upgrade` header named in `Connection`.
    pub upgrade: bool,
    /// Whether the client allows reusing the connection.
    pub keep_alive: bool,
}

/// One event out of the feed.
pub(crate) enum ParseEvent {
    /// A complete request head.
    HeadersComplete(RequestHead),
    /// A slice of request body data.
    Body(Vec<u8>),
    /// The request is complete. Trailer fields, if any, ride along.
    MessageComplete { trailers: Vec<(String, String)> },
}

/// Body delineation for the message being parsed.
#[derive(Debug)]
enum BodyKind {
    Length(u64),
    Chunked(ChunkedDecoder),
}

#[derive(Debug)]
enum ParseState {
    /// Between messages, expecting a request head.
    Head,
    /// Inside a request body.
    Body(BodyKind),
    /// Saw an upgrade/CONNECT head. Terminal.
    Upgraded,
}

/// Incremental request parser for one connection.
#[derive(Debug)]
pub(crate) struct RequestParser {
    state: ParseState,
}

/// Max number of request headers, same bound the tokenizer gets.
const MAX_HEADERS: usize = 128;

impl RequestParser {
    pub fn new() -> Self {
        RequestParser {
            state: ParseState::Head,
        }
    }

    /// Tells if the parser is inside a message. EOF here is a protocol
    /// violation, between messages it is a normal close.
    pub fn is_mid_message(&self) -> bool {
        matches!(self.state, ParseState::Body(_))
    }

    /// Feed bytes, get events. Returns how many bytes were consumed.
    pub fn execute(&mut self, buf: &[u8]) -> Result<(usize, Vec<ParseEvent>), Error> {
        let mut used = 0;
        let mut events = vec![];

        loop {
            let rest = &buf[used..];

            match &mut self.state {
                ParseState::Upgraded => break,

                ParseState::Head => {
                    if rest.is_empty() {
                        break;
                    }

                    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
                    let mut req = httparse::Request::new(&mut headers);

                    let size = match req.parse(rest)? {
                        httparse::Status::Partial => break,
                        httparse::Status::Complete(size) => size,
                    };

                    let head = build_head(&req)?;
                    let framing = body_framing(&head.headers)?;
                    let upgrade = head.upgrade;

                    trace!("parsed head: {} {} ({:?})", head.method, head.uri, framing);

                    used += size;
                    events.push(ParseEvent::HeadersComplete(head));

                    if upgrade {
                        self.state = ParseState::Upgraded;
                        break;
                    }

                    match framing {
                        None | Some(BodyKind::Length(0)) => {
                            events.push(ParseEvent::MessageComplete { trailers: vec![] });
                            // state stays Head, next request may follow
                        }
                        Some(kind) => {
                            self.state = ParseState::Body(kind);
                        }
                    }
                }

                ParseState::Body(BodyKind::Length(remaining)) => {
                    if rest.is_empty() {
                        break;
                    }
                    let take = (*remaining).min(rest.len() as u64) as usize;
                    events.push(ParseEvent::Body(rest[..take].to_vec()));
                    used += take;
                    *remaining -= take as u64;

                    if *remaining == 0 {
                        events.push(ParseEvent::MessageComplete { trailers: vec![] });
                        self.state = ParseState::Head;
                    } else {
                        break;
                    }
                }

                ParseState::Body(BodyKind::Chunked(dec)) => {
                    let (n, chunks) = dec.decode(rest)?;
                    used += n;
                    for c in chunks {
                        events.push(ParseEvent::Body(c));
                    }

                    if dec.is_end() {
                        let trailers = dec.take_trailers();
                        events.push(ParseEvent::MessageComplete { trailers });
                        self.state = ParseState::Head;
                    } else {
                        break;
                    }
                }
            }
        }

        Ok((used, events))
    }
}

fn build_head(req: &httparse::Request<'_, '_>) -> Result<RequestHead, Error> {
    let version = match req.version {
        Some(0) => http::Version::HTTP_10,
        Some(1) => http::Version::HTTP_11,
        v => return Err(Error::Proto(format!("unsupported http version: {:?}", v))),
    };

    let method = req
        .method
        .and_then(|m| http::Method::from_bytes(m.as_bytes()).ok())
        .ok_or_else(|| Error::Proto("bad request method".into()))?;

    let path = req.path.unwrap_or("/");
    let uri = if method == http::Method::CONNECT {
        // authority form
        path.parse::<http::Uri>().map_err(http::Error::from)?
    } else {
        http::Uri::builder().path_and_query(path).build()?
    };

    let mut raw = Vec::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        raw.push((
            h.name.to_string(),
            String::from_utf8_lossy(h.value).into_owned(),
        ));
    }

    let connection = find_header(&raw, "connection");

    let keep_alive = match connection {
        Some(v) if has_token(v, "close") => false,
        Some(v) if has_token(v, "keep-alive") => true,
        _ => version == http::Version::HTTP_11,
    };

    let upgrade = method == http::Method::CONNECT
        || (connection.map(|v| has_token(v, "upgrade")).unwrap_or(false)
            && find_header(&raw, "upgrade").is_some());

    Ok(RequestHead {
        method,
        uri,
        version,
        headers: raw,
        upgrade,
        keep_alive,
    })
}

/// Decide request body delineation from the headers.
///
/// 1. `transfer-encoding` with anything but `identity` means chunked,
///    regardless of other headers (RFC 7230: Transfer-Encoding overrides
///    Content-Length).
/// 2. `content-length: <number>` means a length limited body.
/// 3. Otherwise there is no body. A request body is never delimited by
///    connection close, that would leave no room for a response.
fn body_framing(raw: &[(String, String)]) -> Result<Option<BodyKind>, Error> {
    if let Some(te) = find_header(raw, "transfer-encoding") {
        if !te.to_ascii_lowercase().contains("identity") {
            return Ok(Some(BodyKind::Chunked(ChunkedDecoder::new())));
        }
    }

    if let Some(cl) = find_header(raw, "content-length") {
        let size = cl
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Proto(format!("bad content-length: {:?}", cl)))?;
        return Ok(Some(BodyKind::Length(size)));
    }

    Ok(None)
}

fn find_header<'a>(raw: &'a [(String, String)], name: &str) -> Option<&'a str> {
    raw.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Case-insensitive token scan over a comma separated header value.
fn has_token(value: &str, token: &str) -> bool {
    value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}

impl std::fmt::Debug for ParseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseEvent::HeadersComplete(h) => write!(f, "HeadersComplete({} {})", h.method, h.uri),
            ParseEvent::Body(d) => write!(f, "Body({} bytes)", d.len()),
            ParseEvent::MessageComplete { trailers } => {
                write!(f, "MessageComplete({} trailers)", trailers.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(ev: &ParseEvent) -> &RequestHead {
        match ev {
            ParseEvent::HeadersComplete(h) => h,
            _ => panic!("not a head event: {:?}", ev),
        }
    }

    #[test]
    fn get_without_body_completes_immediately() {
        let mut p = RequestParser::new();
        let input = b"GET /path HTTP/1.1\r\nHost: a\r\n\r\n";

        let (used, events) = p.execute(input).unwrap();

        assert_eq!(used, input.len());
        assert_eq!(events.len(), 2);
        let h = head(&events[0]);
        assert_eq!(h.method, http::Method::GET);
        assert_eq!(h.uri.path(), "/path");
        assert_eq!(h.version, http::Version::HTTP_11);
        assert!(h.keep_alive);
        assert!(!h.upgrade);
        assert!(matches!(
            events[1],
            ParseEvent::MessageComplete { ref trailers } if trailers.is_empty()
        ));
    }

    #[test]
    fn partial_head_consumes_nothing() {
        let mut p = RequestParser::new();

        let (used, events) = p.execute(b"GET / HTTP/1.1\r\nHos").unwrap();

        assert_eq!(used, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn content_length_body_split_across_offers() {
        let mut p = RequestParser::new();

        let input: &[u8] = b"POST / HTTP/1.1\r\ncontent-length: 5\r\n\r\nhel";
        let (used, events) = p.execute(input).unwrap();
        assert_eq!(used, input.len());
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ParseEvent::Body(d) if d == b"hel"));

        let (used, events) = p.execute(b"lo").unwrap();
        assert_eq!(used, 2);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ParseEvent::Body(d) if d == b"lo"));
        assert!(matches!(events[1], ParseEvent::MessageComplete { .. }));
        assert!(!p.is_mid_message());
    }

    #[test]
    fn chunked_body_with_trailers() {
        let mut p = RequestParser::new();
        let input =
            b"POST / HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n3\r\nOK\n\r\n0\r\nX-Sum: 1\r\n\r\n";

        let (used, events) = p.execute(input).unwrap();

        assert_eq!(used, input.len());
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], ParseEvent::Body(d) if d == b"OK\n"));
        match &events[2] {
            ParseEvent::MessageComplete { trailers } => {
                assert_eq!(trailers.len(), 1);
                assert_eq!(trailers[0].0, "X-Sum");
                assert_eq!(trailers[0].1, "1");
            }
            ev => panic!("unexpected event: {:?}", ev),
        }
    }

    #[test]
    fn two_pipelined_requests_in_one_offer() {
        let mut p = RequestParser::new();
        let input = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";

        let (used, events) = p.execute(input).unwrap();

        assert_eq!(used, input.len());
        assert_eq!(events.len(), 4);
        assert_eq!(head(&events[0]).uri.path(), "/a");
        assert_eq!(head(&events[2]).uri.path(), "/b");
    }

    #[test]
    fn http10_defaults_to_close() {
        let mut p = RequestParser::new();

        let (_, events) = p.execute(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!head(&events[0]).keep_alive);

        let mut p = RequestParser::new();
        let (_, events) = p
            .execute(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n")
            .unwrap();
        assert!(head(&events[0]).keep_alive);
    }

    #[test]
    fn explicit_close_disables_keep_alive() {
        let mut p = RequestParser::new();

        let (_, events) = p
            .execute(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .unwrap();

        assert!(!head(&events[0]).keep_alive);
    }

    #[test]
    fn upgrade_stops_the_parser() {
        let mut p = RequestParser::new();
        let input = b"GET /chat HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\ntail";

        let (used, events) = p.execute(input).unwrap();

        assert_eq!(events.len(), 1);
        assert!(head(&events[0]).upgrade);
        // the tail is not consumed, it belongs to the next protocol
        assert_eq!(used, input.len() - 4);

        let (used, events) = p.execute(b"more").unwrap();
        assert_eq!(used, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn connect_counts_as_upgrade() {
        let mut p = RequestParser::new();

        let (_, events) = p
            .execute(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap();

        let h = head(&events[0]);
        assert_eq!(h.method, http::Method::CONNECT);
        assert!(h.upgrade);

        // terminal, tunneled bytes are not consumed
        let (used, events) = p.execute(b"tunneled").unwrap();
        assert_eq!(used, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn bad_content_length_is_a_protocol_error() {
        let mut p = RequestParser::new();

        let err = p
            .execute(b"POST / HTTP/1.1\r\ncontent-length: abc\r\n\r\n")
            .unwrap_err();

        assert!(matches!(err, Error::Proto(_)));
    }
}
