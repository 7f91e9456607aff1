//! TCP adapter.
//!
//! One client is served at a time. [`serve_connection`] drives an accepted
//! connection until the peer closes it, it goes idle for too long, or it
//! fails. Then the accept loop takes the next client. The driver works with
//! any [`Connection`](crate::network::Connection)-style type; [`TcpServer`]
//! wires it to `std::net` on hosted targets.

use core::fmt;
use core::net::SocketAddr;

use log::{debug, info, warn};

use crate::channel::TransportKind;
use crate::channel::evaluator::Board;
use crate::channel::registry::{ConnectionId, Peer};
use crate::channel::response::ReplyStyle;
use crate::channel::session::{Session, SessionError};
use crate::network::error::Error;
use crate::network::{Close, Read, Write};

/// Bytes requested per `recv`.
pub const RECV_CHUNK: usize = 1024;

/// Why a TCP connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `recv` returned no data.
    PeerClosed,
    /// No data for the idle timeout.
    IdleTimeout,
    /// The peer reset the connection.
    Reset,
    /// Any other read failure.
    ReadFailed,
    /// The session closed the connection under us.
    Superseded,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::IdleTimeout => write!(f, "idle timeout"),
            CloseReason::Reset => write!(f, "connection reset"),
            CloseReason::ReadFailed => write!(f, "read failed"),
            CloseReason::Superseded => write!(f, "superseded"),
        }
    }
}

fn classify(error: Error) -> CloseReason {
    match error {
        Error::Timeout => CloseReason::IdleTimeout,
        Error::ConnectionReset | Error::ConnectionClosed => CloseReason::Reset,
        other => {
            warn!("tcp read failed: {}", other);
            CloseReason::ReadFailed
        }
    }
}

/// Serve one accepted client until it goes away.
///
/// Registers the connection (retiring any previous TCP client), evaluates
/// every line it sends, replies `OK\n` or `ERROR: …\n`, and tears everything
/// down on the way out. A partial line left in the buffer is discarded and
/// never executed.
pub fn serve_connection<B, C>(
    session: &mut Session<B>,
    mut conn: C,
    peer: SocketAddr,
) -> Result<CloseReason, SessionError>
where
    B: Board,
    C: Read<Error = Error> + Write + Close,
{
    let id = session.open(TransportKind::Tcp, Peer::Socket(peer))?;
    let mut chunk = [0u8; RECV_CHUNK];

    let reason = loop {
        if !session.is_open(id) {
            break CloseReason::Superseded;
        }
        match conn.read(&mut chunk) {
            Ok(0) => break CloseReason::PeerClosed,
            Ok(n) => {
                debug!("{}: received {} bytes", id, n);
                if let Err(error) = session.feed_line(id, &chunk[..n], &mut conn, ReplyStyle::Socket) {
                    warn!("{}: {}", id, error);
                    break CloseReason::Superseded;
                }
            }
            Err(error) => break classify(error),
        }
    };

    finish(session, id, peer, reason)?;
    if let Err(error) = conn.close() {
        debug!("{}: close failed: {:?}", id, error);
    }
    Ok(reason)
}

fn finish<B: Board>(
    session: &mut Session<B>,
    id: ConnectionId,
    peer: SocketAddr,
    reason: CloseReason,
) -> Result<(), SessionError> {
    info!("tcp client {} ({}) disconnected: {}", id, peer, reason);
    if session.is_open(id) {
        session.close(id)?;
    }
    Ok(())
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use crate::network::{AsyncClose, AsyncRead, AsyncWrite};

    async fn write_line<C: AsyncWrite>(conn: &mut C, mut line: &[u8]) -> Result<(), C::Error> {
        while !line.is_empty() {
            let written = conn.write(line).await?;
            if written == 0 {
                break;
            }
            line = &line[written..];
        }
        conn.flush().await
    }

    /// Async version of [`serve_connection`](super::serve_connection).
    pub async fn serve_connection_async<B, C>(
        session: &mut Session<B>,
        mut conn: C,
        peer: SocketAddr,
    ) -> Result<CloseReason, SessionError>
    where
        B: Board,
        C: AsyncRead<Error = Error> + AsyncWrite + AsyncClose,
    {
        let id = session.open(TransportKind::Tcp, Peer::Socket(peer))?;
        let mut chunk = [0u8; RECV_CHUNK];

        let reason = 'serve: loop {
            if !session.is_open(id) {
                break CloseReason::Superseded;
            }
            let n = match conn.read(&mut chunk).await {
                Ok(0) => break CloseReason::PeerClosed,
                Ok(n) => n,
                Err(error) => break classify(error),
            };
            for &byte in &chunk[..n] {
                let line = match session.line_byte(id, byte, ReplyStyle::Socket) {
                    Ok(line) => line,
                    Err(error) => {
                        warn!("{}: {}", id, error);
                        break 'serve CloseReason::Superseded;
                    }
                };
                if let Some(line) = line {
                    if let Err(error) = write_line(&mut conn, line.as_bytes()).await {
                        debug!("reply dropped: {:?}", error);
                    }
                }
            }
        };

        finish(session, id, peer, reason)?;
        if let Err(error) = conn.close().await {
            debug!("{}: close failed: {:?}", id, error);
        }
        Ok(reason)
    }
}

#[cfg(feature = "async")]
pub use nonblocking::serve_connection_async;

#[cfg(feature = "std")]
mod hosted {
    use std::io::{self, ErrorKind};
    use std::net::{Shutdown, TcpListener, TcpStream};
    use std::time::Duration;

    use super::*;
    use crate::config::ChannelConfig;

    /// Pause after a failed accept before trying again.
    pub const SERVER_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// A `std::net` stream behind the crate's connection traits.
    #[derive(Debug)]
    pub struct StdTcpConnection {
        stream: TcpStream,
    }

    impl StdTcpConnection {
        /// Wrap `stream`, arming the idle timeout on reads.
        pub fn new(stream: TcpStream, idle_timeout: Duration) -> io::Result<Self> {
            stream.set_read_timeout(Some(idle_timeout))?;
            Ok(Self { stream })
        }
    }

    impl Read for StdTcpConnection {
        type Error = Error;
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            io::Read::read(&mut self.stream, buf).map_err(|e| match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => Error::ConnectionReset,
                _ => Error::ReadError,
            })
        }
    }

    impl Write for StdTcpConnection {
        type Error = Error;
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            io::Write::write(&mut self.stream, buf).map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => Error::ConnectionClosed,
                _ => Error::WriteError,
            })
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            io::Write::flush(&mut self.stream).map_err(|_| Error::WriteError)
        }
    }

    impl Close for StdTcpConnection {
        type Error = Error;
        fn close(self) -> Result<(), Self::Error> {
            match self.stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
                Err(_) => Err(Error::ConnectionClosed),
            }
        }
    }

    impl crate::network::Connection for StdTcpConnection {}

    /// Listening socket plus the idle timeout applied to each client.
    #[derive(Debug)]
    pub struct TcpServer {
        listener: TcpListener,
        idle_timeout: Duration,
    }

    impl TcpServer {
        /// Bind `0.0.0.0:<tcp_port>`.
        pub fn bind(config: &ChannelConfig) -> Result<Self, Error> {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.tcp_port));
            Self::bind_addr(addr, config.idle_timeout())
        }

        /// Bind an explicit address.
        pub fn bind_addr(addr: SocketAddr, idle_timeout: Duration) -> Result<Self, Error> {
            let listener = TcpListener::bind(addr).map_err(|e| {
                warn!("cannot bind {}: {}", addr, e);
                Error::BindError
            })?;
            if let Ok(local) = listener.local_addr() {
                info!("listening on {}", local);
            }
            Ok(Self {
                listener,
                idle_timeout,
            })
        }

        /// The address actually bound.
        pub fn local_addr(&self) -> Result<SocketAddr, Error> {
            self.listener.local_addr().map_err(|_| Error::InvalidAddress)
        }

        /// Accept one client and serve it to completion.
        pub fn serve_one<B: Board>(&self, session: &mut Session<B>) -> Result<CloseReason, Error> {
            let (stream, peer) = self.listener.accept().map_err(|e| {
                warn!("accept failed: {}", e);
                Error::NotOpen
            })?;
            info!("client connected from {}", peer);

            let conn = StdTcpConnection::new(stream, self.idle_timeout).map_err(|_| Error::NotOpen)?;
            serve_connection(session, conn, peer).map_err(|e| {
                warn!("client {} rejected: {}", peer, e);
                Error::NotOpen
            })
        }

        /// Serve clients forever, one at a time.
        pub fn run<B: Board>(&self, session: &mut Session<B>) -> ! {
            loop {
                if let Err(error) = self.serve_one(session) {
                    warn!("server error: {}", error);
                    std::thread::sleep(SERVER_RETRY_DELAY);
                }
            }
        }
    }
}

#[cfg(feature = "std")]
pub use hosted::{SERVER_RETRY_DELAY, StdTcpConnection, TcpServer};
