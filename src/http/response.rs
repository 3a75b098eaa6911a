//! Response building.
//!
//! Callbacks fill in a `Response`: a status, optional headers, and a body.
//! Header names match case-insensitively; adding an existing name replaces
//! it. Any allocation failure while building sets a sticky failure bit and
//! the response is replaced with a minimal 500 at serialization time.

use std::fmt::{Display, Write as _};

#[derive(Debug)]
struct OwnedHeader {
    name: String,
    value: String,
}

/// Response under construction for the current request.
#[derive(Debug, Default)]
pub struct Response {
    status: u16,
    headers: Vec<OwnedHeader>,
    body: Vec<u8>,
    close: bool,
    failed: bool,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response status code. Callbacks must call this.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the response body. The bytes are copied into the response.
    pub fn set_body(&mut self, body: impl AsRef<[u8]>) {
        if self.failed {
            return;
        }
        let bytes = body.as_ref();
        self.body.clear();
        if self.body.try_reserve_exact(bytes.len()).is_err() {
            self.failed = true;
            return;
        }
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Ask the server to close the connection after this response.
    pub fn set_close(&mut self, close: bool) {
        self.close = close;
    }

    pub fn close(&self) -> bool {
        self.close
    }

    /// Add a header, replacing any existing header with the same name.
    ///
    /// The value is anything printable, mirroring the usual `Name: 42`
    /// formatting directly at the call site.
    pub fn header_add(&mut self, name: &str, value: impl Display) {
        if self.failed {
            return;
        }

        let mut rendered = String::new();
        if write!(rendered, "{value}").is_err() {
            self.failed = true;
            return;
        }

        match self.find(name) {
            Some(i) => {
                self.headers[i].name.clear();
                self.headers[i].name.push_str(name);
                self.headers[i].value = rendered;
            }
            None => {
                if self.headers.try_reserve(1).is_err() {
                    self.failed = true;
                    return;
                }
                self.headers.push(OwnedHeader {
                    name: name.to_string(),
                    value: rendered,
                });
            }
        }
    }

    /// Remove a header by name. Later headers shift down.
    pub fn header_remove(&mut self, name: &str) {
        if self.failed {
            return;
        }
        if let Some(i) = self.find(name) {
            self.headers.remove(i);
        }
    }

    /// Look up a header value by name, case-insensitively.
    pub fn header_get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|i| self.headers[i].value.as_str())
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| header_name_eq(&h.name, name))
    }
}

/// ASCII case-insensitive equality of two header names.
pub fn header_name_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// The reason phrase for a status code. Unknown codes render as `???`.
pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",

        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",

        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",

        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Requested Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        420 => "Enhance your calm",
        422 => "Unprocessable Entity",
        426 => "Upgrade Required",
        429 => "Too many requests",
        431 => "Request Header Fields Too Large",
        449 => "Retry With",
        451 => "Unavailable For Legal Reasons",

        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        509 => "Bandwidth Limit Exceeded",

        _ => "???",
    }
}
