//! The TCP connection state machine.
//!
//! Only active open is implemented. A connection starts in `Closed`, sends a SYN once the peer's
//! hardware address is known and is driven from then on by received segments and two timers: the
//! SYN retry timer and the linger timer of `TimeWait`.
//!
//! Nothing is sent directly from here. Every reaction is staged as a set of flags on the socket
//! (see [`Socket::pending`]) and turned into a segment by [`segment`] when the stack flushes the
//! socket. Effects beyond the socket, such as timers, errors and delivery to the application, are
//! returned as a [`Signal`] for the stack to carry out.
//!
//! ## Sequence space
//!
//! The local sequence number advances when a segment is *transmitted*: by one for SYN or FIN and
//! by the payload length for data. The acknowledgment number is the sequence number of the next
//! expected octet and advances when a segment is *accepted*.
//!
//! [`Socket::pending`]: ../socket/struct.Socket.html#method.pending
//! [`segment`]: fn.segment.html
//! [`Signal`]: enum.Signal.html
use core::fmt;

use crate::config::Config;
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};
use super::socket::Socket;

mod siphash;

pub use siphash::{FourTuple, IsnGenerator};

/// The state of a connection, as in RFC 793.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Closed,
    /// Defined for completeness, passive open is not implemented.
    Listen,
    SynSent,
    /// Defined for completeness, passive open is not implemented.
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    Closing,
    CloseWait,
    LastAck,
    TimeWait,
}

/// An effect of a state transition outside the socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Nothing beyond the socket changed.
    None,
    /// The handshake completed, the retry timer must be stopped.
    Established,
    /// The accepted segment carried data for the application.
    Deliver,
    /// The peer reset the connection, which is now closed.
    Reset,
    /// The connection request was not answered, which is now closed.
    TimedOut,
    /// The connection entered `TimeWait`, the linger timer must be started.
    Linger,
    /// The connection is fully closed and the socket must be released.
    Release,
}

impl State {
    /// The name used in connection listings.
    pub fn name(self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Listen => "LISTEN",
            State::SynSent => "SYN_SENT",
            State::SynReceived => "SYN_RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1 => "FIN_WAIT_1",
            State::FinWait2 => "FIN_WAIT_2",
            State::Closing => "CLOSING",
            State::CloseWait => "CLOSE_WAIT",
            State::LastAck => "LAST_ACK",
            State::TimeWait => "TIME_WAIT",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for State {
    fn default() -> Self {
        State::Closed
    }
}

fn set_state(socket: &mut Socket, state: State) {
    if socket.state != state {
        net_debug!("tcp :{} {} -> {}", socket.local_port, socket.state, state);
        socket.state = state;
    }
}

/// Start the handshake with a freshly chosen initial sequence number.
pub fn open(socket: &mut Socket, isn: TcpSeqNumber) {
    socket.seq_number = isn;
    socket.ack_number = TcpSeqNumber(0);
    socket.connect_attempts = 0;
    socket.fin_received = false;
    socket.pending.clear();
    socket.tx.clear();
    socket.queue(TcpFlags::SYN);
    set_state(socket, State::SynSent);
}

/// Begin an orderly close on request of the application.
///
/// Returns `false` if there is no connection to close gracefully. In `SynSent` the attempt is
/// abandoned, the caller stops the retry timer.
pub fn close(socket: &mut Socket) -> bool {
    match socket.state {
        State::Established => {
            socket.queue(TcpFlags::FIN | TcpFlags::ACK);
            set_state(socket, State::FinWait1);
            true
        },
        State::CloseWait => {
            socket.queue(TcpFlags::FIN | TcpFlags::ACK);
            set_state(socket, State::LastAck);
            true
        },
        State::SynSent | State::Closed => {
            socket.pending.clear();
            socket.tx.clear();
            set_state(socket, State::Closed);
            true
        },
        _ => false,
    }
}

/// The SYN retry timer of the socket expired.
///
/// Below the attempt limit the sequence number is rewound to the initial one and the SYN is
/// staged again.
pub fn syn_timeout(socket: &mut Socket, max_attempts: u8) -> Signal {
    socket.timer = None;
    if socket.state != State::SynSent {
        return Signal::None;
    }

    socket.connect_attempts += 1;
    if socket.connect_attempts >= max_attempts {
        socket.connect_attempts = 0;
        socket.pending.clear();
        socket.tx.clear();
        set_state(socket, State::Closed);
        return Signal::TimedOut;
    }

    net_debug!("tcp :{} retrying connection ({}/{})",
        socket.local_port, socket.connect_attempts + 1, max_attempts);
    socket.seq_number -= 1;
    socket.queue(TcpFlags::SYN);
    Signal::None
}

/// Process a segment addressed to the socket.
pub fn process(socket: &mut Socket, repr: &TcpRepr) -> Signal {
    let flags = repr.flags;

    match socket.state {
        State::SynSent => {
            if flags.rst() {
                return reset(socket);
            }

            if flags.syn() && flags.ack() {
                if repr.ack_number != Some(socket.seq_number) {
                    net_debug!("tcp :{} unacceptable ack in {}", socket.local_port, repr);
                    return Signal::None;
                }

                socket.ack_number = repr.seq_number + 1;
                socket.queue(TcpFlags::ACK);
                set_state(socket, State::Established);
                return Signal::Established;
            }

            Signal::None
        },
        State::Established => {
            if flags.rst() {
                return reset(socket);
            }

            if repr.seq_number != socket.ack_number {
                // Duplicate or out of order, repeat what we expect.
                if repr.sequence_len() > 0 {
                    socket.queue(TcpFlags::ACK);
                }
                return Signal::None;
            }

            let mut signal = Signal::None;
            if repr.payload_len > 0 {
                socket.ack_number += repr.payload_len;
                socket.queue(TcpFlags::ACK);
                signal = Signal::Deliver;
            }

            if flags.fin() {
                // Becomes CloseWait once this acknowledgment was sent.
                socket.ack_number += 1;
                socket.fin_received = true;
                socket.queue(TcpFlags::ACK);
            }

            signal
        },
        State::FinWait1 => {
            if flags.rst() {
                return reset(socket);
            }

            let fin_acked = repr.ack_number == Some(socket.seq_number) && !socket.fin_pending();
            if flags.fin() {
                socket.ack_number = repr.seq_number + repr.payload_len + 1;
                socket.queue(TcpFlags::ACK);
                if fin_acked {
                    set_state(socket, State::TimeWait);
                    Signal::Linger
                } else {
                    set_state(socket, State::Closing);
                    Signal::None
                }
            } else if fin_acked {
                set_state(socket, State::FinWait2);
                Signal::None
            } else {
                Signal::None
            }
        },
        State::FinWait2 => {
            if flags.rst() {
                return reset(socket);
            }

            if flags.fin() {
                socket.ack_number = repr.seq_number + repr.payload_len + 1;
                socket.queue(TcpFlags::ACK);
                set_state(socket, State::TimeWait);
                return Signal::Linger;
            }

            Signal::None
        },
        State::Closing => {
            if flags.rst() {
                return reset(socket);
            }

            if flags.ack() {
                set_state(socket, State::TimeWait);
                return Signal::Linger;
            }

            Signal::None
        },
        State::LastAck => {
            if flags.ack() || flags.rst() {
                set_state(socket, State::Closed);
                return Signal::Release;
            }

            Signal::None
        },
        State::TimeWait => {
            // The peer did not see our last acknowledgment.
            if flags.fin() {
                socket.queue(TcpFlags::ACK);
            }
            Signal::None
        },
        State::CloseWait
        | State::Closed
        | State::Listen
        | State::SynReceived => Signal::None,
    }
}

fn reset(socket: &mut Socket) -> Signal {
    socket.pending.clear();
    socket.tx.clear();
    socket.fin_received = false;
    set_state(socket, State::Closed);
    Signal::Reset
}

/// Build the segment for staged `flags`.
///
/// Data is attached when `flags` contains PSH, it is the whole transmit buffer. SYN segments
/// carry the maximum segment size and permit selective acknowledgments.
pub fn segment(socket: &Socket, flags: TcpFlags, config: &Config) -> TcpRepr {
    TcpRepr {
        src_port: socket.local_port,
        dst_port: socket.remote_port,
        flags,
        seq_number: socket.seq_number,
        ack_number: if flags.ack() { Some(socket.ack_number) } else { None },
        window_len: config.window,
        max_seg_size: if flags.syn() { Some(config.mss) } else { None },
        sack_permitted: flags.syn(),
        payload_len: if flags.psh() { socket.tx.len() } else { 0 },
    }
}

/// Account for a transmitted segment.
pub fn transmitted(socket: &mut Socket, flags: TcpFlags, payload_len: usize) {
    // Data comes before a FIN in sequence space.
    if flags.psh() {
        socket.seq_number += payload_len;
        socket.tx.clear();
    }

    if flags.syn() || flags.fin() {
        socket.seq_number += 1;
    }

    if socket.state == State::Established && socket.fin_received && flags.ack() {
        socket.fin_received = false;
        set_state(socket, State::CloseWait);
    }
}

/// The answer to a segment that no connection accepts.
///
/// Resets are never answered.
pub fn reset_reply(repr: &TcpRepr) -> Option<TcpRepr> {
    if repr.flags.rst() {
        return None;
    }

    Some(TcpRepr {
        src_port: repr.dst_port,
        dst_port: repr.src_port,
        flags: TcpFlags::RST | TcpFlags::ACK,
        seq_number: repr.ack_number.unwrap_or_default(),
        ack_number: Some(repr.seq_number + repr.sequence_len()),
        window_len: 0,
        max_seg_size: None,
        sack_permitted: false,
        payload_len: 0,
    })
}
