//! The readiness-driven event loop.
//!
//! One thread owns the listener, the poller, and every connection slot.
//! Registration is edge-triggered, so each handler drains its socket until
//! the kernel reports would-block. Per-connection failures close that slot
//! and never propagate; the loop only exits on `Handle::quit`.

use crate::config::Config;
use crate::conn::{Conn, ConnPool};
use crate::http::handler::{emit_error_response, serve_request};
use crate::http::parser::{content_length, find_head_end, head_search_start, parse_head};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::server::Handle;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Registry, Token};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Token for the listening socket.
pub(crate) const LISTENER: Token = Token(usize::MAX);
/// Token for the quit waker.
pub(crate) const WAKER: Token = Token(usize::MAX - 1);

const EVENT_CAPACITY: usize = 64;
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Interest set for connection sockets.
///
/// Everything is registered up front; readiness is consumed edge-triggered.
fn conn_interest() -> Interest {
    let interest = Interest::READABLE | Interest::WRITABLE;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let interest = interest | Interest::PRIORITY;
    interest
}

/// Drive the server until the handle reports quit.
pub(crate) fn run<F>(
    poll: &mut Poll,
    listener: &TcpListener,
    config: &Config,
    handle: &Handle,
    mut callback: F,
) -> io::Result<()>
where
    F: FnMut(&Request<'_>, &mut Response),
{
    let mut events = Events::with_capacity(EVENT_CAPACITY);
    let mut pool = ConnPool::new(config.max_parallel_connections);

    while !handle.is_exiting() {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            // A signal landed (likely the one about to call quit); go
            // around and re-check the flag.
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e);
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => accept_connections(poll.registry(), listener, &mut pool),
                WAKER => {}
                Token(id) => {
                    handle_connection_event(
                        id,
                        event,
                        poll.registry(),
                        &mut pool,
                        config,
                        &mut callback,
                    );
                }
            }
        }
    }

    for mut conn in pool.drain() {
        let _ = poll.registry().deregister(&mut conn.stream);
    }
    Ok(())
}

/// Accept every pending connection, refusing the overflow.
fn accept_connections(registry: &Registry, listener: &TcpListener, pool: &mut ConnPool) {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let id = match pool.insert(Conn::new(stream)) {
                    Some(id) => id,
                    None => {
                        // Admission control: accepted and dropped, so the
                        // peer sees a close instead of waiting in limbo.
                        warn!(peer = %peer_addr, "Connection limit reached, refusing connection");
                        continue;
                    }
                };

                let registered = match pool.get_mut(id) {
                    Some(conn) => registry.register(&mut conn.stream, Token(id), conn_interest()),
                    None => Ok(()),
                };
                if let Err(e) = registered {
                    debug!(conn_id = id, error = %e, "Failed to register connection");
                    pool.remove(id);
                    continue;
                }

                debug!(conn_id = id, peer = %peer_addr, "Accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                error!(error = %e, "Accept error");
                break;
            }
        }
    }
}

fn handle_connection_event<F>(
    id: usize,
    event: &mio::event::Event,
    registry: &Registry,
    pool: &mut ConnPool,
    config: &Config,
    callback: &mut F,
) where
    F: FnMut(&Request<'_>, &mut Response),
{
    // An earlier event in this batch may have closed the slot.
    if !pool.contains(id) {
        return;
    }

    if event.is_read_closed() {
        close_connection(registry, pool, id);
        return;
    }

    // On error/hangup, proceed as if readable and writable so the next
    // syscall surfaces the concrete errno.
    let readable = event.is_error() || event.is_readable() || event.is_priority();

    let live = pool.live();
    let capacity = pool.capacity();

    if readable {
        let Some(conn) = pool.get_mut(id) else { return };
        if !conn.close_when_drained {
            if let Err(e) = handle_input(conn, live, capacity, config, callback) {
                debug!(conn_id = id, error = %e, "Connection error");
                close_connection(registry, pool, id);
                return;
            }
        }
    }

    // Whatever readiness fired, try to push out buffered response bytes.
    let Some(conn) = pool.get_mut(id) else { return };
    match drain_output(conn) {
        Err(e) => {
            debug!(conn_id = id, error = %e, "Connection error");
            close_connection(registry, pool, id);
        }
        Ok(()) => {
            if conn.output.used() == 0 && conn.close_when_drained {
                close_connection(registry, pool, id);
            }
        }
    }
}

fn close_connection(registry: &Registry, pool: &mut ConnPool, id: usize) {
    if let Some(mut conn) = pool.remove(id) {
        let _ = registry.deregister(&mut conn.stream);
        debug!(conn_id = id, "Connection closed");
    }
}

/// Pull everything the kernel has for us, then process it.
fn handle_input<F>(
    conn: &mut Conn,
    live: usize,
    capacity: usize,
    config: &Config,
    callback: &mut F,
) -> io::Result<()>
where
    F: FnMut(&Request<'_>, &mut Response),
{
    let downloaded = fill_input(conn)?;
    process_pipeline(conn, downloaded, live, capacity, config, callback);
    Ok(())
}

/// Read until would-block, growing the input buffer as needed.
///
/// Returns how many bytes this batch added.
fn fill_input(conn: &mut Conn) -> io::Result<usize> {
    let before = conn.input.used();
    loop {
        if !conn.input.reserve_read_headroom() {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "input buffer growth failed",
            ));
        }
        match conn.stream.read(conn.input.spare()) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "EOF"));
            }
            Ok(n) => conn.input.advance(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(conn.input.used() - before)
}

/// Serve every complete request sitting in the input buffer.
///
/// A single read batch can carry several pipelined requests; each one is
/// framed, parsed, dispatched, and then shifted out of the buffer. A
/// partial head or body leaves the cursor state in place and waits for
/// the next readable event.
fn process_pipeline<F>(
    conn: &mut Conn,
    downloaded: usize,
    live: usize,
    capacity: usize,
    config: &Config,
    callback: &mut F,
) where
    F: FnMut(&Request<'_>, &mut Response),
{
    let mut served_this_batch = 0u32;

    loop {
        if !conn.head_received {
            let start =
                head_search_start(conn.input.used(), downloaded, served_this_batch == 0);
            let Some(pos) = find_head_end(conn.input.filled(), start) else {
                if conn.input.used() > config.max_head_size {
                    emit_error_response(
                        &mut conn.output,
                        431,
                        "Request header fields too large",
                    );
                    conn.close_when_drained = true;
                }
                return;
            };
            let head_end = pos + 4;

            match parse_head(&conn.input.filled()[..head_end]) {
                Ok(head) => match content_length(&head.headers) {
                    // A length the buffer arithmetic cannot even represent
                    // is as undeterminable as a malformed one.
                    Ok(length) if head_end.checked_add(length).is_some() => {
                        conn.head_received = true;
                        conn.body_offset = head_end;
                        conn.body_length = length;
                    }
                    Ok(_) | Err(()) => {
                        emit_error_response(
                            &mut conn.output,
                            400,
                            "Couldn't determine the content length",
                        );
                        conn.close_when_drained = true;
                        return;
                    }
                },
                Err(e) => {
                    let status = if e.internal { 500 } else { 400 };
                    emit_error_response(&mut conn.output, status, e.message);
                    conn.close_when_drained = true;
                    return;
                }
            }
        }

        if conn.body_offset + conn.body_length > conn.input.used() {
            // Body still in flight.
            return;
        }

        let consumed = conn.body_offset + conn.body_length;
        let keep_alive = {
            let input = conn.input.filled();
            // The head parsed when it was framed; re-derive the borrowed
            // view now that the body is complete.
            let head = match parse_head(&input[..conn.body_offset]) {
                Ok(head) => head,
                Err(_) => {
                    conn.close_when_drained = true;
                    return;
                }
            };
            let body = &input[conn.body_offset..consumed];
            serve_request(
                head,
                body,
                &mut conn.output,
                conn.served,
                live,
                capacity,
                config,
                callback,
            )
        };

        conn.served += 1;
        if !keep_alive {
            conn.close_when_drained = true;
        }

        conn.input.consume(consumed);
        conn.head_received = false;
        served_this_batch += 1;

        if conn.close_when_drained {
            return;
        }
    }
}

/// Flush the output buffer until empty or would-block.
///
/// The unsent remainder is compacted back to offset 0.
fn drain_output(conn: &mut Conn) -> io::Result<()> {
    if conn.output.has_failed() {
        return Err(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "output buffer growth failed",
        ));
    }

    let total = conn.output.used();
    let mut sent = 0;
    while sent < total {
        match conn.stream.write(&conn.output.filled()[sent..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => sent += n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    conn.output.consume(sent);
    Ok(())
}
