//! hearth: an embeddable HTTP/1.x origin server.
//!
//! The whole server is one cooperative event loop on the calling thread:
//! a readiness poller multiplexes the listener and every client socket,
//! requests are parsed straight out of per-connection buffers, and a
//! user callback produces each response.
//!
//! ```no_run
//! use hearth::{serve, Handle, Request, Response};
//!
//! let handle = Handle::new();
//! serve(
//!     Some("127.0.0.1"),
//!     8080,
//!     |_req: &Request, res: &mut Response| {
//!         res.set_status(200);
//!         res.header_add("Content-Type", "text/plain;charset=utf-8");
//!         res.set_body("Hello, world!");
//!     },
//!     Some(&handle),
//!     None,
//! )
//! .unwrap();
//! ```
//!
//! `serve` blocks until [`Handle::quit`] is called, typically from a signal
//! handler or from inside a callback holding a clone of the handle.
//!
//! Keep-alive and pipelining are handled by the loop: one connection can
//! carry many requests, responses always go out in request order, and the
//! server closes connections that exceed the per-connection request limit
//! or when the pool runs hot. See [`Config`] for the knobs.

mod buffer;
mod conn;
mod event_loop;
mod server;

pub mod config;
pub mod http;

pub use config::{Config, ConfigError};
pub use http::{header_name_eq, status_text, Header, Method, Request, Response, Version};
pub use server::{serve, Handle, ServeError};
