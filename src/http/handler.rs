//! Response assembly.
//!
//! Once a request is fully buffered, this module decides the keep-alive
//! policy, dispatches the user callback, and serializes the response into
//! the connection's output buffer.

use crate::buffer::Buffer;
use crate::config::Config;
use crate::http::parser::RequestHead;
use crate::http::request::{Method, Request};
use crate::http::response::{status_text, Response};
use tracing::trace;

/// Serve one fully-buffered request.
///
/// `served` is how many requests this connection has answered so far;
/// `live`/`capacity` describe current pool pressure. Returns whether the
/// connection should be kept alive after the response drains.
pub(crate) fn serve_request<F>(
    head: RequestHead<'_>,
    body: &[u8],
    output: &mut Buffer,
    served: u32,
    live: usize,
    capacity: usize,
    config: &Config,
    callback: &mut F,
) -> bool
where
    F: FnMut(&Request<'_>, &mut Response),
{
    let mut request = Request {
        method: head.method,
        method_text: head.method_text,
        url: head.url,
        version: head.version,
        headers: head.headers,
        body,
    };

    let mut keep_alive = matches!(
        request.header("Connection"),
        Some(v) if v.eq_ignore_ascii_case("Keep-Alive")
    );

    // Stop re-using connections that have served their share, and shed
    // idle keep-alives when the pool is running hot.
    if keep_alive {
        if served >= config.keep_alive_request_limit {
            keep_alive = false;
        }
        if live as f64 > config.keep_alive_pressure * capacity as f64 {
            keep_alive = false;
        }
    }

    // HEAD is dispatched as GET; only the body write differs.
    let head_only = request.method == Method::Head;
    if head_only {
        request.method = Method::Get;
        request.method_text = Method::Get.as_str();
    }

    let mut response = Response::new();
    callback(&request, &mut response);

    if response.close() {
        keep_alive = false;
    }

    let body_len = response.body().len();
    response.header_add("Content-Length", body_len);
    response.header_add("Connection", if keep_alive { "Keep-Alive" } else { "Close" });

    if response.has_failed() {
        // An allocation failed while building; send a bare 500 and hang up.
        keep_alive = false;
        output.append(b"HTTP/1.1 500 Internal Server Error\r\n");
        output.append(b"Connection: Close\r\n\r\n");
    } else {
        let status = response.status();
        let status_line = format!("HTTP/1.1 {} {}\r\n", status, status_text(status));
        output.append(status_line.as_bytes());

        for (name, value) in response.header_pairs() {
            output.append(name.as_bytes());
            output.append(b": ");
            output.append(value.as_bytes());
            output.append(b"\r\n");
        }
        output.append(b"\r\n");

        if !head_only {
            output.append(response.body());
        }

        trace!(
            method = request.method_text(),
            url = request.url(),
            status,
            keep_alive,
            "Served request"
        );
    }

    keep_alive
}

/// Write an inline error response straight into the output buffer.
///
/// Used for requests that never reach the callback: parse failures,
/// undetermined content length, oversized heads. Always closes.
pub(crate) fn emit_error_response(output: &mut Buffer, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/plain;charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: Close\r\n\
         \r\n{}",
        status,
        status_text(status),
        body.len(),
        body
    );
    output.append(response.as_bytes());
}
