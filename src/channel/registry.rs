//! Connection registry.
//!
//! Tracks the open transport sessions and owns one [`CommandBuffer`] per
//! connection. UART and TCP are singular: opening a second TCP connection
//! retires the first, and UART always maps to the same logical connection.
//! BLE centrals form a set with one isolated buffer per handle.

use core::fmt;
use core::net::SocketAddr;

use heapless::Vec;
use log::{debug, info};

use super::TransportKind;
use super::frame::CommandBuffer;

/// Maximum number of simultaneously open connections across all transports.
pub const MAX_CONNECTIONS: usize = 8;

/// Maximum number of BLE centrals connected at once.
pub const MAX_CENTRALS: usize = 4;

/// Opaque handle for an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u16);

impl ConnectionId {
    /// Raw numeric value, for logging.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "#{}", self.0)
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// The single implicit serial peer.
    Implicit,
    /// An accepted TCP client.
    Socket(SocketAddr),
    /// A BLE central, identified by its connection handle.
    Central(u16),
}

/// Lifecycle of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not (or no longer) connected.
    Disconnected,
    /// Open and accepting input.
    Connected,
}

/// A registered connection and its reassembly buffer.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    kind: TransportKind,
    peer: Peer,
    state: LinkState,
    buffer: CommandBuffer,
}

impl Connection {
    /// Registry-assigned id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Transport it arrived on.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Who is on the other end.
    pub fn peer(&self) -> Peer {
        self.peer
    }

    /// Lifecycle state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Partial command buffer.
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }
}

/// Summary of a connection removed by [`ConnectionRegistry::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedConnection {
    /// Id the connection had.
    pub id: ConnectionId,
    /// Its transport.
    pub kind: TransportKind,
    /// Its peer.
    pub peer: Peer,
    /// Bytes of a half-received command thrown away.
    pub discarded_bytes: usize,
}

/// Registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No connection with this id is open.
    UnknownConnection(ConnectionId),
    /// The peer identity does not fit the transport (e.g. a socket on BLE).
    PeerMismatch,
    /// Too many connections, or too many BLE centrals.
    Full,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownConnection(id) => write!(f, "unknown connection {}", id),
            RegistryError::PeerMismatch => write!(f, "peer does not match transport"),
            RegistryError::Full => write!(f, "connection registry full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegistryError {}

#[cfg(feature = "defmt")]
impl defmt::Format for RegistryError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            RegistryError::UnknownConnection(id) => defmt::write!(f, "UnknownConnection({})", id),
            RegistryError::PeerMismatch => defmt::write!(f, "PeerMismatch"),
            RegistryError::Full => defmt::write!(f, "Full"),
        }
    }
}

/// Table of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection, MAX_CONNECTIONS>,
    next_id: u16,
    advertising: bool,
}

impl ConnectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and give it a fresh, empty buffer.
    ///
    /// - `Uart`: returns the already-open serial connection if there is one.
    /// - `Tcp`: retires any open TCP connection first.
    /// - `Ble`: retires a stale entry with the same handle first.
    pub fn open(&mut self, kind: TransportKind, peer: Peer) -> Result<ConnectionId, RegistryError> {
        let peer_fits = matches!(
            (kind, peer),
            (TransportKind::Uart, Peer::Implicit)
                | (TransportKind::Tcp, Peer::Socket(_))
                | (TransportKind::Ble, Peer::Central(_))
        );
        if !peer_fits {
            return Err(RegistryError::PeerMismatch);
        }

        match kind {
            TransportKind::Uart => {
                if let Some(existing) = self.connections.iter().find(|c| c.kind == kind) {
                    return Ok(existing.id);
                }
            }
            TransportKind::Tcp => {
                let stale = self.connections.iter().find(|c| c.kind == kind).map(|c| c.id);
                if let Some(stale) = stale {
                    info!("retiring tcp connection {} for new accept", stale);
                    self.close(stale)?;
                }
            }
            TransportKind::Ble => {
                let stale = self.connections.iter().find(|c| c.peer == peer).map(|c| c.id);
                if let Some(stale) = stale {
                    info!("retiring stale ble connection {}", stale);
                    self.close(stale)?;
                }
                if self.count(TransportKind::Ble) >= MAX_CENTRALS {
                    return Err(RegistryError::Full);
                }
            }
        }

        let id = self.allocate_id();
        let connection = Connection {
            id,
            kind,
            peer,
            state: LinkState::Connected,
            buffer: CommandBuffer::new(kind),
        };
        self.connections
            .push(connection)
            .map_err(|_| RegistryError::Full)?;

        if kind == TransportKind::Ble {
            self.advertising = false;
        }
        info!("{} connection {} opened ({:?})", kind, id, peer);
        Ok(id)
    }

    /// Next id from the wrapping counter, skipping ids still in use.
    fn allocate_id(&mut self) -> ConnectionId {
        loop {
            let candidate = ConnectionId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.is_open(candidate) {
                return candidate;
            }
        }
    }

    /// Remove a connection, discarding any partial command in its buffer.
    ///
    /// Closing a BLE connection puts the registry back into the advertising
    /// state so new centrals can find the device.
    pub fn close(&mut self, id: ConnectionId) -> Result<ClosedConnection, RegistryError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        let mut connection = self.connections.swap_remove(index);
        connection.state = LinkState::Disconnected;
        let discarded_bytes = connection.buffer.reset();
        if discarded_bytes > 0 {
            debug!("dropped {} buffered bytes from {}", discarded_bytes, id);
        }
        if connection.kind == TransportKind::Ble {
            self.advertising = true;
        }

        info!("{} connection {} closed", connection.kind, id);
        Ok(ClosedConnection {
            id,
            kind: connection.kind,
            peer: connection.peer,
            discarded_bytes,
        })
    }

    /// Whether `id` is registered.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Look up an open connection.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// The buffer of an open connection.
    pub fn buffer_mut(&mut self, id: ConnectionId) -> Option<&mut CommandBuffer> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .map(|c| &mut c.buffer)
    }

    /// Look up the connection registered for a BLE connection handle.
    pub fn find_central(&self, handle: u16) -> Option<ConnectionId> {
        self.connections
            .iter()
            .find(|c| c.peer == Peer::Central(handle))
            .map(|c| c.id)
    }

    /// Number of open connections on `kind`.
    pub fn count(&self, kind: TransportKind) -> usize {
        self.connections.iter().filter(|c| c.kind == kind).count()
    }

    /// Open connections, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Whether the BLE side should currently be discoverable.
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Record that advertising was (re)started or stopped.
    pub fn set_advertising(&mut self, advertising: bool) {
        self.advertising = advertising;
    }
}
