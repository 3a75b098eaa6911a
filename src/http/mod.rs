//! HTTP/1.x protocol implementation.
//!
//! The wire format handled here:
//!
//! ```text
//! Request:  <METHOD> <URL> HTTP/<version>\r\n
//!           <Name>: <Value>\r\n
//!           ...
//!           \r\n
//!           <body, Content-Length bytes>
//!
//! Response: HTTP/1.1 <code> <reason>\r\n
//!           <Name>: <Value>\r\n
//!           ...
//!           \r\n
//!           <body>
//! ```
//!
//! `parser` frames and parses request heads, `request` holds the borrowed
//! view handed to callbacks, `response` is the builder callbacks fill in,
//! and `handler` assembles the response bytes for one request.

pub(crate) mod handler;
pub(crate) mod parser;
pub mod request;
pub mod response;

pub use request::{Header, Method, Request, Version};
pub use response::{header_name_eq, status_text, Response};
