use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use wirehttp::http::parser::parse_from_stream;
use wirehttp::http::{ParseError, ParseState, Request};

/// Hands out at most `per_read` bytes per read, like a slow socket.
struct ChunkReader {
    data: Vec<u8>,
    pos: usize,
    per_read: usize,
}

impl ChunkReader {
    fn new(data: &[u8], per_read: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            per_read,
        }
    }
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let end = (self.pos + self.per_read)
            .min(self.data.len())
            .min(self.pos + buf.remaining());
        let chunk = self.data[self.pos..end].to_vec();
        buf.put_slice(&chunk);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

async fn parse_chunked(data: &[u8], per_read: usize) -> Result<Request, ParseError> {
    let mut reader = ChunkReader::new(data, per_read);
    parse_from_stream(&mut reader).await
}

#[tokio::test]
async fn test_parse_good_get_request_line() {
    let req = parse_chunked(
        b"GET / HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nAccept: */*\r\n\r\n",
        3,
    )
    .await
    .unwrap();

    assert_eq!(req.request_line.method, "GET");
    assert_eq!(req.request_line.target, "/");
    assert_eq!(req.request_line.version, "1.1");
    assert_eq!(req.state, ParseState::Done);
}

#[tokio::test]
async fn test_parse_get_request_line_with_path() {
    let req = parse_chunked(b"GET /coffee HTTP/1.1\r\nHost: localhost:42069\r\n\r\n", 1)
        .await
        .unwrap();

    assert_eq!(req.request_line.method, "GET");
    assert_eq!(req.request_line.target, "/coffee");
}

#[tokio::test]
async fn test_parse_post_request_with_body() {
    let raw = b"GET /path HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhello";
    let req = parse_chunked(raw, 4).await.unwrap();

    assert_eq!(req.method(), "GET");
    assert_eq!(req.target(), "/path");
    assert_eq!(req.body, b"hello");
    assert!(req.is_done());
}

#[tokio::test]
async fn test_parse_every_fragmentation_gives_same_request() {
    let raw: &[u8] = b"POST /submit?x=1 HTTP/1.1\r\nHost: localhost:42069\r\nX-Multi: a\r\nx-multi: b\r\nContent-Length: 13\r\n\r\nhello world!\n";
    let expected = Request::from_bytes(raw).unwrap();

    for per_read in 1..=raw.len() {
        let req = parse_chunked(raw, per_read).await.unwrap();
        assert_eq!(req, expected, "fragment size {per_read}");
    }

    assert_eq!(expected.header("x-multi"), Some("a, b"));
    assert_eq!(expected.body, b"hello world!\n");
}

#[tokio::test]
async fn test_parse_without_content_length_has_empty_body() {
    let req = parse_chunked(b"GET / HTTP/1.1\r\nHost: localhost:42069\r\n\r\n", 2)
        .await
        .unwrap();

    assert!(req.body.is_empty());
    assert!(req.is_done());
}

#[tokio::test]
async fn test_parse_does_not_wait_for_eof_when_done() {
    // duplex keeps the write side open; the parser must return on its own
    let (mut client, mut server) = tokio::io::duplex(64);
    tokio::io::AsyncWriteExt::write_all(&mut client, b"GET / HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let req = parse_from_stream(&mut server).await.unwrap();

    assert_eq!(req.target(), "/");
    drop(client);
}

#[tokio::test]
async fn test_parse_body_shorter_than_content_length() {
    let result = parse_chunked(
        b"POST /submit HTTP/1.1\r\nHost: localhost:42069\r\nContent-Length: 20\r\n\r\npartial content",
        3,
    )
    .await;

    assert!(matches!(
        result,
        Err(ParseError::IncompleteRequest {
            state: ParseState::ParsingBody
        })
    ));
}

#[tokio::test]
async fn test_parse_stream_ends_inside_headers() {
    let result = parse_chunked(b"GET / HTTP/1.1\r\nHost: example.com\r\n", 5).await;

    assert!(matches!(
        result,
        Err(ParseError::IncompleteRequest {
            state: ParseState::ParsingHeaders
        })
    ));
}

#[tokio::test]
async fn test_parse_lowercase_method() {
    let result = parse_chunked(b"get / HTTP/1.1\r\n\r\n", 8).await;

    assert!(matches!(result, Err(ParseError::InvalidMethod(_))));
}

#[tokio::test]
async fn test_parse_http_1_0_unsupported() {
    let result = parse_chunked(b"GET / HTTP/1.0\r\n\r\n", 8).await;

    assert!(matches!(result, Err(ParseError::UnsupportedVersion(_))));
}

#[tokio::test]
async fn test_parse_wrong_token_count() {
    for raw in [
        b"GET /\r\n\r\n".as_slice(),
        b"/coffee HTTP/1.1\r\n\r\n",
        b"GET /coffee HTTP/1.1 extra\r\n\r\n",
        b"GET  / HTTP/1.1\r\n\r\n",
    ] {
        let result = parse_chunked(raw, 8).await;
        assert!(
            matches!(result, Err(ParseError::MalformedRequestLine)),
            "{:?}",
            String::from_utf8_lossy(raw)
        );
    }
}

#[tokio::test]
async fn test_parse_invalid_header_name() {
    let result = parse_chunked(b"GET / HTTP/1.1\r\nHost : localhost\r\n\r\n", 8).await;

    assert!(matches!(result, Err(ParseError::InvalidHeaderName(_))));
}

#[tokio::test]
async fn test_parse_invalid_content_length() {
    let result = parse_chunked(b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\nhello", 8).await;

    assert!(matches!(result, Err(ParseError::InvalidContentLength(_))));
}

#[tokio::test]
async fn test_parse_content_length_is_case_insensitive() {
    let req = parse_chunked(b"POST / HTTP/1.1\r\ncontent-LENGTH: 3\r\n\r\nabc", 1)
        .await
        .unwrap();

    assert_eq!(req.body, b"abc");
}

#[tokio::test]
async fn test_parse_binary_body() {
    let req = parse_chunked(
        b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03",
        1,
    )
    .await
    .unwrap();

    assert_eq!(req.body, vec![0, 1, 2, 3]);
}
