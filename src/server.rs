//! Public server entry: `serve`, the quit `Handle`, and startup errors.

use crate::config::Config;
use crate::event_loop::{self, LISTENER, WAKER};
use crate::http::request::Request;
use crate::http::response::Response;
use mio::net::TcpListener;
use mio::{Interest, Poll, Waker};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Remote control for a running server.
///
/// Clone it freely: all clones share state. `quit` may be called from a
/// signal handler, another thread, or from inside a callback; the server
/// finishes its current loop iteration, tears down every connection, and
/// `serve` returns. One handle drives one `serve` call.
#[derive(Clone, Default)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

#[derive(Default)]
struct HandleInner {
    exiting: AtomicBool,
    bound: OnceLock<SocketAddr>,
    waker: OnceLock<Waker>,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the server to shut down. Idempotent.
    pub fn quit(&self) {
        self.inner.exiting.store(true, Ordering::Release);
        if let Some(waker) = self.inner.waker.get() {
            let _ = waker.wake();
        }
    }

    /// The address the listener actually bound, once the server is up.
    ///
    /// Useful when binding port 0 to let the kernel pick.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.bound.get().copied()
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.inner.exiting.load(Ordering::Acquire)
    }

    fn attach(&self, addr: SocketAddr, waker: Waker) {
        let _ = self.inner.bound.set(addr);
        let _ = self.inner.waker.set(waker);
    }
}

/// Startup failures from [`serve`].
///
/// Each variant carries a fixed description; nothing is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeError {
    ZeroConnections,
    ZeroBacklog,
    BadAddress,
    SocketCreate,
    SocketOption,
    Bind,
    Listen,
    PollCreate,
    RegisterListener,
    WakerCreate,
    Poll,
}

impl ServeError {
    /// The static message describing this failure.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroConnections => {
                "The number of maximum parallel connections isn't allowed to be 0"
            }
            Self::ZeroBacklog => "The backlog isn't allowed to be 0",
            Self::BadAddress => "Malformed IPv4 address",
            Self::SocketCreate => "Failed to create socket",
            Self::SocketOption => "Failed to set socket option",
            Self::Bind => "Failed to bind to address",
            Self::Listen => "Failed to listen for connections",
            Self::PollCreate => "Failed to create poller",
            Self::RegisterListener => "Failed to add listener to poller",
            Self::WakerCreate => "Failed to create waker",
            Self::Poll => "Failed to wait for events",
        }
    }
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ServeError {}

/// Run an HTTP/1.x origin server on `addr:port`.
///
/// `addr` is an IPv4 dotted quad; `None` binds every interface. The
/// callback is invoked once per request with a borrowed request view and a
/// fresh response builder; it must set a status and may add headers and a
/// body. Blocks until [`Handle::quit`] is called on `handle_out` (or on a
/// clone captured by the callback), then returns `Ok(())`.
pub fn serve<F>(
    addr: Option<&str>,
    port: u16,
    callback: F,
    handle_out: Option<&Handle>,
    config: Option<Config>,
) -> Result<(), ServeError>
where
    F: FnMut(&Request<'_>, &mut Response),
{
    let config = config.unwrap_or_default();

    if config.max_parallel_connections == 0 {
        return Err(ServeError::ZeroConnections);
    }
    if config.backlog == 0 {
        return Err(ServeError::ZeroBacklog);
    }

    let ip = match addr {
        Some(text) => text
            .parse::<Ipv4Addr>()
            .map_err(|_| ServeError::BadAddress)?,
        None => Ipv4Addr::UNSPECIFIED,
    };
    let bind_addr = SocketAddr::from((ip, port));

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(|_| ServeError::SocketCreate)?;
    if config.reuse_address {
        socket
            .set_reuse_address(true)
            .map_err(|_| ServeError::SocketOption)?;
    }
    socket
        .set_nonblocking(true)
        .map_err(|_| ServeError::SocketOption)?;
    socket
        .bind(&bind_addr.into())
        .map_err(|_| ServeError::Bind)?;
    socket
        .listen(config.backlog as i32)
        .map_err(|_| ServeError::Listen)?;

    let mut listener = TcpListener::from_std(socket.into());

    let mut poll = Poll::new().map_err(|_| ServeError::PollCreate)?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .map_err(|_| ServeError::RegisterListener)?;

    let waker = Waker::new(poll.registry(), WAKER).map_err(|_| ServeError::WakerCreate)?;
    let local_addr = listener.local_addr().map_err(|_| ServeError::SocketCreate)?;

    let handle = match handle_out {
        Some(h) => h.clone(),
        None => Handle::new(),
    };
    handle.attach(local_addr, waker);

    info!(
        addr = %local_addr,
        max_connections = config.max_parallel_connections,
        "Server listening"
    );

    let result = event_loop::run(&mut poll, &listener, &config, &handle, callback);

    let _ = poll.registry().deregister(&mut listener);
    info!(addr = %local_addr, "Server stopped");

    result.map_err(|_| ServeError::Poll)
}
