//! Request-side types: methods, versions, headers, and the borrowed
//! request view handed to callbacks.

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// Classify a method token. Only the nine standard names are accepted.
    pub fn try_from(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"GET" => Some(Self::Get),
            b"HEAD" => Some(Self::Head),
            b"POST" => Some(Self::Post),
            b"PUT" => Some(Self::Put),
            b"DELETE" => Some(Self::Delete),
            b"CONNECT" => Some(Self::Connect),
            b"OPTIONS" => Some(Self::Options),
            b"TRACE" => Some(Self::Trace),
            b"PATCH" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Patch => "PATCH",
        }
    }
}

/// HTTP protocol version named in the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http09,
    Http10,
    Http11,
    Http20,
    Http30,
}

impl Version {
    /// Classify a version token. Both `HTTP/M.N` and the short `HTTP/M`
    /// forms are accepted; `HTTP/1` means 1.0.
    pub fn try_from(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"HTTP/0.9" => Some(Self::Http09),
            b"HTTP/1.0" | b"HTTP/1" => Some(Self::Http10),
            b"HTTP/1.1" => Some(Self::Http11),
            b"HTTP/2.0" | b"HTTP/2" => Some(Self::Http20),
            b"HTTP/3.0" | b"HTTP/3" => Some(Self::Http30),
            _ => None,
        }
    }

    pub fn major(self) -> u32 {
        match self {
            Self::Http09 => 0,
            Self::Http10 | Self::Http11 => 1,
            Self::Http20 => 2,
            Self::Http30 => 3,
        }
    }

    pub fn minor(self) -> u32 {
        match self {
            Self::Http09 => 9,
            Self::Http11 => 1,
            Self::Http10 | Self::Http20 | Self::Http30 => 0,
        }
    }
}

/// One request header, borrowed from the connection's input buffer.
///
/// Leading spaces after the `:` are stripped from the value; otherwise the
/// value is exactly what arrived on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// A parsed request, valid only for the duration of the callback.
///
/// All string fields borrow from the connection's input buffer and are
/// invalidated once the request is consumed.
#[derive(Debug)]
pub struct Request<'a> {
    pub(crate) method: Method,
    pub(crate) method_text: &'a str,
    pub(crate) url: &'a str,
    pub(crate) version: Version,
    pub(crate) headers: Vec<Header<'a>>,
    pub(crate) body: &'a [u8],
}

impl<'a> Request<'a> {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The method token as it will be dispatched. A HEAD request is
    /// dispatched as `GET`, so callbacks written for GET apply.
    pub fn method_text(&self) -> &'a str {
        self.method_text
    }

    /// The raw request target, query string included.
    pub fn url(&self) -> &'a str {
        self.url
    }

    /// The request target up to the first `?`.
    pub fn path(&self) -> &'a str {
        match self.url.find('?') {
            Some(pos) => &self.url[..pos],
            None => self.url,
        }
    }

    /// The query string after the first `?`, if any.
    pub fn query(&self) -> Option<&'a str> {
        self.url.find('?').map(|pos| &self.url[pos + 1..])
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &[Header<'a>] {
        &self.headers
    }

    /// Look up a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value)
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_classification() {
        assert_eq!(Method::try_from(b"GET"), Some(Method::Get));
        assert_eq!(Method::try_from(b"PATCH"), Some(Method::Patch));
        assert_eq!(Method::try_from(b"get"), None);
        assert_eq!(Method::try_from(b"GETT"), None);
        assert_eq!(Method::try_from(b""), None);
    }

    #[test]
    fn test_version_tokens() {
        assert_eq!(Version::try_from(b"HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::try_from(b"HTTP/1"), Some(Version::Http10));
        assert_eq!(Version::try_from(b"HTTP/3"), Some(Version::Http30));
        assert_eq!(Version::try_from(b"HTTP/9.9"), None);
        assert_eq!(Version::try_from(b"http/1.1"), None);

        assert_eq!(Version::Http09.major(), 0);
        assert_eq!(Version::Http09.minor(), 9);
        assert_eq!(Version::Http11.minor(), 1);
        assert_eq!(Version::Http20.minor(), 0);
    }

    #[test]
    fn test_path_and_query() {
        let req = Request {
            method: Method::Get,
            method_text: "GET",
            url: "/users/alice?page=2&sort=asc",
            version: Version::Http11,
            headers: Vec::new(),
            body: b"",
        };
        assert_eq!(req.path(), "/users/alice");
        assert_eq!(req.query(), Some("page=2&sort=asc"));

        let req = Request { url: "/plain", ..req };
        assert_eq!(req.path(), "/plain");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request {
            method: Method::Get,
            method_text: "GET",
            url: "/",
            version: Version::Http11,
            headers: vec![
                Header { name: "Host", value: "example.com" },
                Header { name: "Content-Length", value: "5" },
            ],
            body: b"hello",
        };
        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(req.header("CONTENT-LENGTH"), Some("5"));
        assert_eq!(req.header("Accept"), None);
    }
}
