//! Request head framing and parsing.
//!
//! The parser is a pure function over a byte slice that ends with the
//! blank-line token. It never mutates its input; every token in the
//! returned head is an `(offset, len)` view into the caller's buffer.

use super::request::{Header, Method, Version};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';

/// A parsed request head. Borrows the connection's input buffer.
#[derive(Debug)]
pub(crate) struct RequestHead<'a> {
    pub method: Method,
    pub method_text: &'a str,
    pub url: &'a str,
    pub version: Version,
    pub headers: Vec<Header<'a>>,
}

/// A classified parse failure.
///
/// `internal` failures are the server's fault (allocation) and map to 500;
/// everything else is a protocol error and maps to 400. The message doubles
/// as the error response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub message: &'static str,
    pub internal: bool,
}

impl ParseError {
    fn protocol(message: &'static str) -> Self {
        Self {
            message,
            internal: false,
        }
    }

    fn internal(message: &'static str) -> Self {
        Self {
            message,
            internal: true,
        }
    }
}

/// Locate the blank-line token, searching no earlier than `start`.
///
/// Returns the absolute offset of the `\r\n\r\n`.
pub(crate) fn find_head_end(input: &[u8], start: usize) -> Option<usize> {
    input[start..]
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| start + pos)
}

/// Where to restart the blank-line search after a read batch.
///
/// Bytes before `used - downloaded` were scanned by earlier attempts; the
/// 3-byte overlap covers a token split across reads. Only the first framing
/// attempt of a batch may skip ahead.
pub(crate) fn head_search_start(used: usize, downloaded: usize, first_attempt: bool) -> usize {
    if first_attempt && used > downloaded + 3 {
        used - downloaded - 3
    } else {
        0
    }
}

/// Parse a complete request head.
///
/// `head` must run through the blank-line token located by
/// [`find_head_end`] (the token itself included).
pub(crate) fn parse_head(head: &[u8]) -> Result<RequestHead<'_>, ParseError> {
    if head.is_empty() {
        return Err(ParseError::protocol("Empty request"));
    }

    let text = std::str::from_utf8(head)
        .map_err(|_| ParseError::protocol("Invalid UTF-8 in request head"))?;

    let len = head.len();
    let mut i = 0;

    let method_start = i;
    while i < len && head[i].is_ascii_uppercase() {
        i += 1;
    }
    let method_end = i;

    if method_end == method_start {
        return Err(ParseError::protocol("Missing method"));
    }
    if i == len {
        return Err(ParseError::protocol("Missing URL and HTTP version"));
    }
    if head[i] != SP {
        return Err(ParseError::protocol(
            "Bad character after method. Methods can only have uppercase alphabetic characters",
        ));
    }
    while i < len && head[i] == SP {
        i += 1;
    }
    if i == len {
        return Err(ParseError::protocol("Missing URL and HTTP version"));
    }

    let url_start = i;
    while i < len && head[i] != SP {
        i += 1;
    }
    let url_end = i;

    if i == len {
        return Err(ParseError::protocol("Missing HTTP version"));
    }
    while i < len && head[i] == SP {
        i += 1;
    }
    if i == len {
        return Err(ParseError::protocol("Missing HTTP version"));
    }

    let version_start = i;
    while i < len && head[i] != CR {
        i += 1;
    }
    let mut version_end = i;

    if version_end == version_start {
        return Err(ParseError::protocol("Missing HTTP version"));
    }
    if i == len {
        return Err(ParseError::protocol("Missing CRLF after HTTP version"));
    }
    i += 1;
    if i == len || head[i] != LF {
        return Err(ParseError::protocol("Missing LF after CR"));
    }
    i += 1;

    // One trailing space before the CRLF is tolerated.
    if version_end - version_start > 1 && head[version_end - 1] == SP {
        version_end -= 1;
    }

    let mut headers: Vec<Header<'_>> = Vec::new();

    loop {
        if i == len {
            return Err(ParseError::protocol("Missing blank line"));
        }
        if i + 1 < len && head[i] == CR && head[i + 1] == LF {
            break;
        }

        let name_start = i;
        while i < len && head[i] != b':' {
            i += 1;
        }
        let name_end = i;

        if i == len {
            return Err(ParseError::protocol("Malformed header"));
        }
        if name_end == name_start {
            return Err(ParseError::protocol("Empty header name"));
        }
        i += 1;

        let value_start = i;
        loop {
            while i < len && head[i] != CR {
                i += 1;
            }
            if i == len {
                return Err(ParseError::protocol("Malformed header"));
            }
            i += 1;
            if i == len {
                return Err(ParseError::protocol("Malformed header"));
            }
            if head[i] == LF {
                break;
            }
        }
        i += 1;
        let value_end = i - 2;

        // The wire format leaves a space after the ':'; strip it (and any
        // run of spaces) so callers compare values directly.
        let mut trimmed_start = value_start;
        while trimmed_start < value_end && head[trimmed_start] == SP {
            trimmed_start += 1;
        }

        if headers.try_reserve(1).is_err() {
            return Err(ParseError::internal("No memory"));
        }
        headers.push(Header {
            name: &text[name_start..name_end],
            value: &text[trimmed_start..value_end],
        });
    }

    let method_text = &text[method_start..method_end];
    let method = Method::try_from(&head[method_start..method_end])
        .ok_or_else(|| ParseError::protocol("Unknown method"))?;

    let version = Version::try_from(&head[version_start..version_end])
        .ok_or_else(|| ParseError::protocol("Bad HTTP version"))?;

    Ok(RequestHead {
        method,
        method_text,
        url: &text[url_start..url_end],
        version,
        headers,
    })
}

/// Interpret the request's `Content-Length` header.
///
/// Absent header or empty value mean a zero-length body. A value that is
/// not a plain run of digits (spaces around it aside) cannot be trusted to
/// frame the stream, so it is rejected rather than guessed at.
pub(crate) fn content_length(headers: &[Header<'_>]) -> Result<usize, ()> {
    let value = match headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Length"))
    {
        Some(h) => h.value.as_bytes(),
        None => return Ok(0),
    };

    let mut k = 0;
    while k < value.len() && value[k] == SP {
        k += 1;
    }
    if k == value.len() {
        return Ok(0);
    }
    if !value[k].is_ascii_digit() {
        return Err(());
    }

    let mut result: usize = 0;
    while k < value.len() && value[k].is_ascii_digit() {
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add((value[k] - b'0') as usize))
            .ok_or(())?;
        k += 1;
    }
    while k < value.len() && value[k] == SP {
        k += 1;
    }
    if k != value.len() {
        return Err(());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(head: &[u8]) -> RequestHead<'_> {
        match parse_head(head) {
            Ok(h) => h,
            Err(e) => panic!("unexpected parse error: {:?}", e),
        }
    }

    fn parse_err(head: &[u8]) -> &'static str {
        match parse_head(head) {
            Err(e) => {
                assert!(!e.internal);
                e.message
            }
            Ok(h) => panic!("expected error, got {:?}", h),
        }
    }

    #[test]
    fn test_parse_simple_get() {
        let head = parse_ok(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(head.method, Method::Get);
        assert_eq!(head.method_text, "GET");
        assert_eq!(head.url, "/index.html");
        assert_eq!(head.version, Version::Http11);
        assert_eq!(head.headers.len(), 1);
        assert_eq!(head.headers[0].name, "Host");
        assert_eq!(head.headers[0].value, "example.com");
    }

    #[test]
    fn test_parse_no_headers() {
        let head = parse_ok(b"HEAD / HTTP/1.0\r\n\r\n");
        assert_eq!(head.method, Method::Head);
        assert_eq!(head.version, Version::Http10);
        assert!(head.headers.is_empty());
    }

    #[test]
    fn test_header_value_leading_space_is_stripped() {
        let head = parse_ok(b"GET / HTTP/1.1\r\nConnection: Keep-Alive\r\nX:  two\r\n\r\n");
        assert_eq!(head.headers[0].value, "Keep-Alive");
        assert_eq!(head.headers[1].value, "two");
    }

    #[test]
    fn test_header_value_bare_cr_continues() {
        // A lone CR inside the value does not end the header.
        let head = parse_ok(b"GET / HTTP/1.1\r\nX-Odd: a\rb\r\n\r\n");
        assert_eq!(head.headers[0].name, "X-Odd");
        assert_eq!(head.headers[0].value, "a\rb");
    }

    #[test]
    fn test_short_version_tokens() {
        assert_eq!(parse_ok(b"GET / HTTP/1\r\n\r\n").version, Version::Http10);
        assert_eq!(parse_ok(b"GET / HTTP/2\r\n\r\n").version, Version::Http20);
    }

    #[test]
    fn test_trailing_space_after_version() {
        assert_eq!(parse_ok(b"GET / HTTP/1.1 \r\n\r\n").version, Version::Http11);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(parse_err(b""), "Empty request");
        assert_eq!(parse_err(b"get / HTTP/1.1\r\n\r\n"), "Missing method");
        assert_eq!(parse_err(b"GET"), "Missing URL and HTTP version");
        assert_eq!(
            parse_err(b"G=T / HTTP/1.1\r\n\r\n"),
            "Bad character after method. Methods can only have uppercase alphabetic characters"
        );
        assert_eq!(parse_err(b"GET /"), "Missing HTTP version");
        assert_eq!(parse_err(b"GET / "), "Missing HTTP version");
        assert_eq!(parse_err(b"GET / HTTP/1.1"), "Missing CRLF after HTTP version");
        assert_eq!(parse_err(b"GET / HTTP/1.1\r"), "Missing LF after CR");
        assert_eq!(parse_err(b"GET / HTTP/1.1\rX"), "Missing LF after CR");
        assert_eq!(parse_err(b"GET / HTTP/1.1\r\n"), "Missing blank line");
        assert_eq!(parse_err(b"GET / HTTP/1.1\r\nHost"), "Malformed header");
        assert_eq!(
            parse_err(b"GET / HTTP/1.1\r\n: nameless\r\n\r\n"),
            "Empty header name"
        );
        assert_eq!(parse_err(b"FOO / HTTP/1.1\r\n\r\n"), "Unknown method");
        assert_eq!(parse_err(b"GET / HTTP/9.9\r\n\r\n"), "Bad HTTP version");
    }

    #[test]
    fn test_malformed_header_wins_over_unknown_method() {
        // Token validation runs after the header block is scanned.
        assert_eq!(
            parse_err(b"FOO / HTTP/1.1\r\nBad header line\r\n\r\n"),
            "Malformed header"
        );
        assert_eq!(parse_err(b"FOO / HTTP/1.1\r\n\r\n"), "Unknown method");
    }

    #[test]
    fn test_find_head_end() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\n", 0), Some(14));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n", 0), None);
        // The search can be told to skip already-scanned bytes.
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\n", 14), Some(14));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nGET", 16), None);
    }

    #[test]
    fn test_head_search_start() {
        // First attempt after a read resumes just before the new bytes.
        assert_eq!(head_search_start(100, 10, true), 87);
        // Everything is new: scan from the beginning.
        assert_eq!(head_search_start(10, 10, true), 0);
        assert_eq!(head_search_start(13, 10, true), 0);
        // Later attempts in one batch rescan the (compacted) buffer.
        assert_eq!(head_search_start(100, 10, false), 0);
    }

    fn headers_of(pairs: &[(&'static str, &'static str)]) -> Vec<Header<'static>> {
        pairs
            .iter()
            .map(|&(name, value)| Header { name, value })
            .collect()
    }

    #[test]
    fn test_content_length() {
        assert_eq!(content_length(&headers_of(&[])), Ok(0));
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "42")])),
            Ok(42)
        );
        assert_eq!(
            content_length(&headers_of(&[("content-length", "7")])),
            Ok(7)
        );
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "  13  ")])),
            Ok(13)
        );
        assert_eq!(content_length(&headers_of(&[("Content-Length", "")])), Ok(0));
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "   ")])),
            Ok(0)
        );
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "abc")])),
            Err(())
        );
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "12x")])),
            Err(())
        );
        assert_eq!(
            content_length(&headers_of(&[("Content-Length", "99999999999999999999999999")])),
            Err(())
        );
    }
}
