use crate::http::error::ParseError;
use crate::http::headers::{find_crlf, is_token, Headers};

const HTTP_NAME: &str = "HTTP";
const SUPPORTED_VERSION: &str = "1.1";

/// Progress of a [`Request`] through the parser. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Initialized,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// `METHOD SP TARGET SP HTTP/1.1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    /// Upper-case method, e.g. `GET`
    pub method: String,
    /// Request target exactly as sent, e.g. `/search?q=rust`
    pub target: String,
    /// Version number without the `HTTP/` prefix; always `1.1`
    pub version: String,
}

/// A request being parsed, or fully parsed once `state` is [`ParseState::Done`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub state: ParseState,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: Headers::new(),
            body: Vec::new(),
            state: ParseState::Initialized,
        }
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    /// Feeds buffered bytes through the state machine.
    ///
    /// Steps repeatedly until a step consumes nothing (more input needed) or
    /// the request is done. Returns how many bytes from the front of `data`
    /// were consumed; the caller must not offer those bytes again.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut total = 0;

        while self.state != ParseState::Done {
            let n = self.step(&data[total..])?;
            total += n;
            if n == 0 {
                break;
            }
        }

        Ok(total)
    }

    /// Parses a fully buffered request in one go.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        let mut request = Self::new();
        request.feed(data)?;

        if !request.is_done() {
            return Err(ParseError::IncompleteRequest {
                state: request.state,
            });
        }
        Ok(request)
    }

    fn step(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParseState::Initialized => {
                let Some((n, line)) = parse_request_line(data)? else {
                    return Ok(0);
                };
                self.request_line = line;
                self.state = ParseState::ParsingHeaders;
                Ok(n)
            }

            ParseState::ParsingHeaders => {
                let (n, done) = self.headers.parse(data)?;
                if done {
                    self.state = ParseState::ParsingBody;
                }
                Ok(n)
            }

            ParseState::ParsingBody => {
                let Some(raw) = self.headers.get("Content-Length") else {
                    // no declared length: bodyless, whatever is left is dropped
                    self.state = ParseState::Done;
                    return Ok(data.len());
                };

                let content_length: usize = raw
                    .parse()
                    .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?;

                if data.len() < content_length {
                    return Ok(0);
                }

                self.body.extend_from_slice(&data[..content_length]);
                self.state = ParseState::Done;
                Ok(content_length)
            }

            ParseState::Done => Err(ParseError::ParserAlreadyDone),
        }
    }
}

fn parse_request_line(data: &[u8]) -> Result<Option<(usize, RequestLine)>, ParseError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };

    let text = std::str::from_utf8(&data[..idx]).map_err(|_| ParseError::MalformedRequestLine)?;
    let line = request_line_from_str(text)?;

    Ok(Some((idx + 2, line)))
}

fn request_line_from_str(text: &str) -> Result<RequestLine, ParseError> {
    let parts: Vec<&str> = text.split(' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::MalformedRequestLine);
    };

    // any token without lower-case letters, so `M-SEARCH` and `GET2` pass
    if !is_token(method) || method.bytes().any(|b| b.is_ascii_lowercase()) {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }

    let version = match version.split('/').collect::<Vec<_>>()[..] {
        [HTTP_NAME, SUPPORTED_VERSION] => SUPPORTED_VERSION,
        _ => return Err(ParseError::UnsupportedVersion(version.to_string())),
    };

    if target.is_empty() || target.chars().any(char::is_whitespace) {
        return Err(ParseError::InvalidTargetFormat(target.to_string()));
    }

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_fields() {
        let line = request_line_from_str("GET /coffee HTTP/1.1").unwrap();

        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "/coffee");
        assert_eq!(line.version, "1.1");
    }

    #[test]
    fn request_line_token_count() {
        assert!(matches!(
            request_line_from_str("/coffee HTTP/1.1"),
            Err(ParseError::MalformedRequestLine)
        ));
        assert!(matches!(
            request_line_from_str("GET /coffee extra HTTP/1.1"),
            Err(ParseError::MalformedRequestLine)
        ));
    }

    #[test]
    fn request_line_method_token_rules() {
        let line = request_line_from_str("M-SEARCH * HTTP/1.1").unwrap();
        assert_eq!(line.method, "M-SEARCH");
        assert_eq!(line.target, "*");

        assert_eq!(request_line_from_str("GET2 / HTTP/1.1").unwrap().method, "GET2");

        for method in ["get", "Get", "GE(T", "GE\"T"] {
            assert!(
                matches!(
                    request_line_from_str(&format!("{method} / HTTP/1.1")),
                    Err(ParseError::InvalidMethod(_))
                ),
                "{method} should be rejected"
            );
        }
    }

    #[test]
    fn request_line_rejects_tab_in_target() {
        assert!(matches!(
            request_line_from_str("GET /cof\tfee HTTP/1.1"),
            Err(ParseError::InvalidTargetFormat(_))
        ));
    }

    #[test]
    fn feed_waits_for_crlf() {
        let mut req = Request::new();

        assert_eq!(req.feed(b"GET / HTTP/1.").unwrap(), 0);
        assert_eq!(req.state, ParseState::Initialized);
    }

    #[test]
    fn body_waits_for_declared_length() {
        let mut req = Request::new();
        let head = b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\n";

        assert_eq!(req.feed(head).unwrap(), head.len());
        assert_eq!(req.state, ParseState::ParsingBody);

        assert_eq!(req.feed(b"ab").unwrap(), 0);
        assert_eq!(req.feed(b"abcd").unwrap(), 4);
        assert_eq!(req.body, b"abcd");
        assert!(req.is_done());
    }

    #[test]
    fn feed_after_done_is_a_no_op_but_step_errors() {
        let mut req = Request::from_bytes(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(req.feed(b"more").unwrap(), 0);
        assert!(matches!(req.step(b"more"), Err(ParseError::ParserAlreadyDone)));
    }
}
