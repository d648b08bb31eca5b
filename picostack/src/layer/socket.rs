//! The socket table.
//!
//! A fixed pool of endpoints. Every slot is reused independently, a [`SocketHandle`] names one
//! particular occupation of a slot and stops resolving when the socket is released.
//!
//! [`SocketHandle`]: struct.SocketHandle.html
use core::fmt::{self, Write};

use heapless::{Deque, String, Vec};

use crate::config::{MAX_SOCKETS, TX_BUFFER_LEN};
use crate::rand::Xoroshiro256;
use crate::stack::{Handler, Token};
use crate::time::TimerHandle;
use crate::wire::{EthernetAddress, Ipv4Address, TcpFlags, TcpSeqNumber};
use super::tcp::State;

/// Number of pending segments a socket can stage between two flushes.
pub const PENDING_LEN: usize = 4;

/// Start of the ephemeral port range.
const EPHEMERAL_BASE: u16 = 49152;

// Handles store the slot index in a byte.
const _: () = assert!(MAX_SOCKETS <= 1 << 8, "the socket table holds at most 256 slots");

/// Transport of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// A TCP connection.
    Stream,
    /// A UDP endpoint.
    Datagram,
}

/// Refers to an allocated socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle {
    index: u8,
    generation: u16,
}

/// The transport errors reported to the owner of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The hardware address of the peer could not be resolved.
    ArpTimeout,
    /// The peer did not answer the connection request.
    SynAckTimeout,
    /// The peer reset the connection.
    ConnectionReset,
}

/// A transport error with a description naming the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketError {
    pub kind: ErrorKind,
    pub remote_ip: Ipv4Address,
    pub remote_port: u16,
    pub message: String<60>,
}

/// One endpoint.
#[derive(Debug)]
pub struct Socket {
    pub(crate) kind: SocketKind,
    pub(crate) state: State,
    pub(crate) local_ip: Ipv4Address,
    pub(crate) local_port: u16,
    pub(crate) remote_ip: Ipv4Address,
    pub(crate) remote_port: u16,
    pub(crate) remote_mac: EthernetAddress,
    pub(crate) seq_number: TcpSeqNumber,
    pub(crate) ack_number: TcpSeqNumber,
    pub(crate) pending: Deque<TcpFlags, PENDING_LEN>,
    pub(crate) tx: Vec<u8, TX_BUFFER_LEN>,
    pub(crate) timer: Option<TimerHandle>,
    pub(crate) connect_attempts: u8,
    pub(crate) fin_received: bool,
    pub(crate) error_token: Option<Token>,
}

struct Slot {
    generation: u16,
    socket: Option<Socket>,
}

/// The fixed table of sockets.
pub struct SocketTable {
    slots: [Slot; MAX_SOCKETS],
    rng: Xoroshiro256,
}

impl SocketHandle {
    /// The slot of the socket, stable while it is allocated.
    pub fn index(self) -> usize {
        usize::from(self.index)
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl SocketError {
    /// Describe an error of the connection to `remote_ip:remote_port`.
    pub fn new(kind: ErrorKind, remote_ip: Ipv4Address, remote_port: u16) -> Self {
        let mut message = String::new();
        // All messages fit the capacity, the longest address is fifteen characters.
        let _ = match kind {
            ErrorKind::ArpTimeout =>
                write!(message, "Could not reach {} (timed out)", remote_ip),
            ErrorKind::SynAckTimeout =>
                write!(message, "No response from {} (timed out)", remote_ip),
            ErrorKind::ConnectionReset =>
                write!(message, "Connection was reset by remote host ({}:{})", remote_ip, remote_port),
        };

        SocketError {
            kind,
            remote_ip,
            remote_port,
            message,
        }
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Socket {
    fn new(kind: SocketKind, local_port: u16) -> Self {
        Socket {
            kind,
            state: State::Closed,
            local_ip: Ipv4Address::UNSPECIFIED,
            local_port,
            remote_ip: Ipv4Address::UNSPECIFIED,
            remote_port: 0,
            remote_mac: EthernetAddress([0; 6]),
            seq_number: TcpSeqNumber(0),
            ack_number: TcpSeqNumber(0),
            pending: Deque::new(),
            tx: Vec::new(),
            timer: None,
            connect_attempts: 0,
            fin_received: false,
            error_token: None,
        }
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// The connection state. Datagram sockets are always `Closed`.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn remote_ip(&self) -> Ipv4Address {
        self.remote_ip
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn remote_mac(&self) -> EthernetAddress {
        self.remote_mac
    }

    /// The next sequence number to send.
    pub fn seq_number(&self) -> TcpSeqNumber {
        self.seq_number
    }

    /// The next sequence number expected from the peer.
    pub fn ack_number(&self) -> TcpSeqNumber {
        self.ack_number
    }

    /// Number of connection requests that timed out.
    pub fn connect_attempts(&self) -> u8 {
        self.connect_attempts
    }

    /// Segments staged for the next flushes, oldest first.
    pub fn pending(&self) -> impl Iterator<Item=TcpFlags> + '_ {
        self.pending.iter().copied()
    }

    /// Stage a segment with `flags`.
    ///
    /// A segment equal to the last staged one is merged into it, and so is any segment carrying
    /// an acknowledgment if the last one is a pure acknowledgment. When all entries are taken the
    /// flags are added to the last one, a staged SYN or FIN is never lost.
    pub(crate) fn queue(&mut self, flags: TcpFlags) {
        let full = self.pending.is_full();
        if let Some(tail) = self.pending.back_mut() {
            if *tail == flags || (*tail == TcpFlags::ACK && flags.ack()) {
                *tail = flags;
                return;
            }

            if full {
                *tail = *tail | flags;
                return;
            }
        }

        // Not full, checked above.
        let _ = self.pending.push_back(flags);
    }

    /// Take the oldest staged segment.
    pub(crate) fn next_pending(&mut self) -> Option<TcpFlags> {
        self.pending.pop_front()
    }

    pub(crate) fn fin_pending(&self) -> bool {
        self.pending.iter().any(|flags| flags.fin())
    }
}

impl fmt::Display for Socket {
    /// A listing row in the style of `netstat`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, state) = match self.kind {
            SocketKind::Stream => ("TCP", self.state.name()),
            SocketKind::Datagram => ("UDP", ""),
        };

        write!(f, "{}   {}:{} -> {}:{}   {}",
            kind,
            self.local_ip, self.local_port,
            self.remote_ip, self.remote_port,
            state)
    }
}

impl SocketTable {
    /// Create an empty table, seeding the generator of ephemeral ports.
    pub fn new(seed: u64) -> Self {
        SocketTable {
            slots: core::array::from_fn(|_| Slot { generation: 0, socket: None }),
            rng: Xoroshiro256::new(seed),
        }
    }

    /// Allocate the first free slot.
    ///
    /// Stream sockets are assigned a random port from the ephemeral range that no other socket
    /// uses. Returns `None` if all slots are occupied.
    pub fn allocate(&mut self, kind: SocketKind) -> Option<SocketHandle> {
        let index = match self.slots.iter().position(|slot| slot.socket.is_none()) {
            Some(index) => index,
            None => {
                net_debug!("socket table exhausted ({} slots)", MAX_SOCKETS);
                return None
            },
        };

        let local_port = match kind {
            SocketKind::Stream => self.ephemeral_port(),
            SocketKind::Datagram => 0,
        };

        let slot = &mut self.slots[index];
        slot.socket = Some(Socket::new(kind, local_port));
        Some(SocketHandle {
            index: index as u8,
            generation: slot.generation,
        })
    }

    /// Free the slot of a socket.
    ///
    /// Returns `false` if the handle was already released.
    pub fn release(&mut self, handle: SocketHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.socket = None;
                slot.generation = slot.generation.wrapping_add(1);
                true
            },
            None => false,
        }
    }

    /// Find the allocated socket bound to a local port.
    pub fn find_by_local_port(&self, port: u16) -> Option<SocketHandle> {
        self.iter()
            .find(|(_, socket)| socket.local_port == port)
            .map(|(handle, _)| handle)
    }

    pub fn get(&self, handle: SocketHandle) -> Option<&Socket> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.socket.as_ref()
    }

    pub fn get_mut(&mut self, handle: SocketHandle) -> Option<&mut Socket> {
        self.slot_mut(handle)?.socket.as_mut()
    }

    /// Iterate over all allocated sockets.
    pub fn iter(&self) -> impl Iterator<Item=(SocketHandle, &Socket)> + '_ {
        self.slots.iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let handle = SocketHandle {
                    index: index as u8,
                    generation: slot.generation,
                };
                slot.socket.as_ref().map(|socket| (handle, socket))
            })
    }

    pub(crate) fn handles(&self) -> Vec<SocketHandle, MAX_SOCKETS> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Number of allocated sockets.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Choose whom to notify of errors on this socket.
    ///
    /// Errors of a socket without token are only logged.
    pub fn set_error_token(&mut self, handle: SocketHandle, token: Option<Token>) -> bool {
        match self.get_mut(handle) {
            Some(socket) => {
                socket.error_token = token;
                true
            },
            None => false,
        }
    }

    /// Report a transport error of a socket to its owner.
    ///
    /// The handler receives the table and decides whether the socket is released.
    pub fn throw_error<H>(&mut self, handle: SocketHandle, kind: ErrorKind, handler: &mut H)
        where H: Handler + ?Sized
    {
        let (error, token) = match self.get(handle) {
            Some(socket) => (
                SocketError::new(kind, socket.remote_ip, socket.remote_port),
                socket.error_token,
            ),
            None => return,
        };

        net_debug!("socket {}: {}", handle, error);
        if let Some(token) = token {
            handler.socket_error(self, handle, token, &error);
        }
    }

    fn slot_mut(&mut self, handle: SocketHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation || slot.socket.is_none() {
            return None;
        }
        Some(slot)
    }

    fn ephemeral_port(&mut self) -> u16 {
        loop {
            let port = EPHEMERAL_BASE + (self.rng.next_u16() & 0x3fff);
            if self.find_by_local_port(port).is_none() {
                return port;
            }
        }
    }
}

impl fmt::Debug for SocketTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(_, socket)| socket))
            .finish()
    }
}
