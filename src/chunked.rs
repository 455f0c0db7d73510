//! Chunked transfer-encoding, both directions.
//!
//! The encoder is a couple of free functions writing into an output buffer.
//! The decoder is an incremental state machine over byte slices: it consumes
//! as much as it can and reports how far it got, leaving partial size lines
//! or trailer blocks for the caller to re-offer once more bytes arrive.

use crate::Error;

/// Upper bound for a single chunk size line (hex digits plus extensions).
const MAX_SIZE_LINE: usize = 1024;

/// Upper bound for the trailer section after the terminating chunk.
const MAX_TRAILER_BLOCK: usize = 8192;

/// Max number of trailer fields we accept.
const MAX_TRAILERS: usize = 32;

/// Encoder for chunked transfer-encoding.
pub(crate) struct ChunkedEncoder;

impl ChunkedEncoder {
    /// Frame one chunk: `<hex-length>\r\n<data>\r\n`. Empty input writes
    /// nothing, since a zero length chunk would terminate the body.
    pub fn write_chunk(data: &[u8], out: &mut Vec<u8>) {
        if data.is_empty() {
            return;
        }
        out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
    }

    /// Terminate the body: `0\r\n<trailers>\r\n`. The trailer string is
    /// zero or more CRLF terminated header lines.
    pub fn write_finish(out: &mut Vec<u8>, trailer: &str) {
        out.extend_from_slice(b"0\r\n");
        out.extend_from_slice(trailer.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

#[derive(Debug)]
enum DecoderState {
    /// Expecting a chunk size line terminated by CRLF.
    Size,
    /// Reading chunk data, this many bytes left.
    Data(u64),
    /// Expecting the CRLF that follows chunk data.
    DataEnd,
    /// Saw the zero size chunk, reading the trailer section.
    Trailer,
    /// Fully decoded.
    End,
}

/// Incremental decoder for a chunked body.
#[derive(Debug)]
pub(crate) struct ChunkedDecoder {
    state: DecoderState,
    trailers: Vec<(String, String)>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::Size,
            trailers: vec![],
        }
    }

    /// Tells if the terminating chunk (and trailer section) has been seen.
    pub fn is_end(&self) -> bool {
        matches!(self.state, DecoderState::End)
    }

    /// Take the trailer pairs collected after the terminating chunk.
    pub fn take_trailers(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.trailers)
    }

    /// Decode as much of `input` as possible. Returns the number of bytes
    /// consumed and the decoded body slices. Consuming less than `input`
    /// means a size line or trailer block is still incomplete.
    pub fn decode(&mut self, input: &[u8]) -> Result<(usize, Vec<Vec<u8>>), Error> {
        let mut used = 0;
        let mut out = vec![];

        loop {
            let rest = &input[used..];

            match &mut self.state {
                DecoderState::Size => {
                    let nl = match rest.iter().position(|&b| b == b'\n') {
                        Some(nl) => nl,
                        None => {
                            if rest.len() > MAX_SIZE_LINE {
                                return Err(Error::Proto("chunk size line too long".into()));
                            }
                            break;
                        }
                    };

                    let line = &rest[..nl];
                    if !line.ends_with(b"\r") {
                        return Err(Error::Proto("chunk size not CRLF terminated".into()));
                    }
                    let line = &line[..line.len() - 1];

                    // chunk extensions after ';' are tolerated and ignored
                    let hex = match line.iter().position(|&b| b == b';') {
                        Some(i) => &line[..i],
                        None => line,
                    };

                    let hex = std::str::from_utf8(hex)
                        .map_err(|_| Error::Proto("chunk size is not ascii".into()))?;
                    let size = u64::from_str_radix(hex.trim(), 16)
                        .map_err(|_| Error::Proto(format!("bad chunk size: {:?}", hex)))?;

                    used += nl + 1;

                    trace!("chunk size: {}", size);

                    self.state = if size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::Data(size)
                    };
                }

                DecoderState::Data(remaining) => {
                    if rest.is_empty() {
                        break;
                    }
                    let take = (*remaining).min(rest.len() as u64) as usize;
                    out.push(rest[..take].to_vec());
                    used += take;
                    *remaining -= take as u64;

                    if *remaining == 0 {
                        self.state = DecoderState::DataEnd;
                    } else {
                        // consumed everything on offer
                        break;
                    }
                }

                DecoderState::DataEnd => {
                    if rest.len() < 2 {
                        break;
                    }
                    if &rest[..2] != b"\r\n" {
                        return Err(Error::Proto("missing CRLF after chunk data".into()));
                    }
                    used += 2;
                    self.state = DecoderState::Size;
                }

                DecoderState::Trailer => {
                    if rest.len() < 2 {
                        break;
                    }

                    // No trailers: the terminating chunk is followed by a
                    // bare CRLF.
                    if rest.starts_with(b"\r\n") {
                        used += 2;
                        self.state = DecoderState::End;
                        continue;
                    }

                    let end = match rest.windows(4).position(|w| w == b"\r\n\r\n") {
                        Some(p) => p,
                        None => {
                            if rest.len() > MAX_TRAILER_BLOCK {
                                return Err(Error::Proto("trailer section too large".into()));
                            }
                            break;
                        }
                    };

                    let block = &rest[..end + 4];
                    let mut headers = [httparse::EMPTY_HEADER; MAX_TRAILERS];

                    match httparse::parse_headers(block, &mut headers)? {
                        httparse::Status::Complete((n, parsed)) => {
                            for h in parsed {
                                self.trailers.push((
                                    h.name.to_string(),
                                    String::from_utf8_lossy(h.value).into_owned(),
                                ));
                            }
                            used += n;
                            self.state = DecoderState::End;
                        }
                        httparse::Status::Partial => {
                            // invariant: block includes the terminating CRLFCRLF
                            unreachable!("partial trailer block with complete delimiter");
                        }
                    }
                }

                DecoderState::End => break,
            }
        }

        Ok((used, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(dec: &mut ChunkedDecoder, input: &[u8]) -> (usize, Vec<u8>) {
        let (used, chunks) = dec.decode(input).unwrap();
        let mut flat = vec![];
        for c in chunks {
            flat.extend_from_slice(&c);
        }
        (used, flat)
    }

    #[test]
    fn decode_single_chunk() {
        let mut dec = ChunkedDecoder::new();
        let input = b"5\r\nhello\r\n0\r\n\r\n";

        let (used, body) = decode_all(&mut dec, input);

        assert_eq!(used, input.len());
        assert_eq!(body, b"hello");
        assert!(dec.is_end());
        assert!(dec.take_trailers().is_empty());
    }

    #[test]
    fn decode_across_partial_offers() {
        let mut dec = ChunkedDecoder::new();
        let input: &[u8] = b"6\r\nabcdef\r\n3\r\nghi\r\n0\r\n\r\n";

        // offer the input one byte longer each time, re-offering what was
        // not consumed, like the connection read loop does.
        let mut body = vec![];
        let mut pending: Vec<u8> = vec![];
        for &b in input {
            pending.push(b);
            let (used, chunks) = dec.decode(&pending).unwrap();
            for c in chunks {
                body.extend_from_slice(&c);
            }
            pending.drain(..used);
        }

        assert!(dec.is_end());
        assert!(pending.is_empty());
        assert_eq!(body, b"abcdefghi");
    }

    #[test]
    fn decode_with_extensions_and_trailers() {
        let mut dec = ChunkedDecoder::new();
        let input = b"4;ext=1\r\nwiki\r\n0\r\nX-Check: sum\r\nX-Other: 2\r\n\r\n";

        let (used, body) = decode_all(&mut dec, input);

        assert_eq!(used, input.len());
        assert_eq!(body, b"wiki");
        assert!(dec.is_end());

        let trailers = dec.take_trailers();
        assert_eq!(trailers.len(), 2);
        assert_eq!(trailers[0], ("X-Check".to_string(), "sum".to_string()));
        assert_eq!(trailers[1], ("X-Other".to_string(), "2".to_string()));
    }

    #[test]
    fn decode_rejects_bad_size() {
        let mut dec = ChunkedDecoder::new();
        let err = dec.decode(b"zz\r\nhello").unwrap_err();
        assert!(matches!(err, Error::Proto(_)));
    }

    #[test]
    fn decode_rejects_missing_crlf_after_data() {
        let mut dec = ChunkedDecoder::new();
        let err = dec.decode(b"2\r\nhiXX").unwrap_err();
        assert!(matches!(err, Error::Proto(_)));
    }

    #[test]
    fn encode_chunk_and_finish() {
        let mut out = vec![];
        ChunkedEncoder::write_chunk(b"hi", &mut out);
        ChunkedEncoder::write_chunk(b"", &mut out);
        ChunkedEncoder::write_finish(&mut out, "");

        assert_eq!(out, b"2\r\nhi\r\n0\r\n\r\n");
    }

    #[test]
    fn encode_finish_with_trailer() {
        let mut out = vec![];
        ChunkedEncoder::write_finish(&mut out, "X-Check: sum\r\n");

        assert_eq!(out, b"0\r\nX-Check: sum\r\n\r\n");
    }
}
