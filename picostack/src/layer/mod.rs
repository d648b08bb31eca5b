//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. The state of a layer, an address cache or a socket table, is
//! a plain owned structure. It is open to inspection and modification by the program while no
//! processing takes place, similar to reconfiguration on the OS level with utilities such as
//! `arp` or `netstat`.
//!
//! ## Receiving
//!
//! Every layer exposes functions that consume a parsed representation of its packets and return
//! what the layer decided: an answer to send, a state change, a completion to report. The stack
//! driver routes each frame through the layers and acts on these decisions, so no layer needs to
//! know the ones around it.
//!
//! ## Sending
//!
//! Outgoing packets are assembled in one frame buffer by the [`eth::Interface`], which writes the
//! Ethernet and IPv4 headers around the payload emitted by the upper layer.
//!
//! [`eth::Interface`]: eth/struct.Interface.html

pub mod arp;
pub mod eth;
pub mod icmp;
pub mod socket;
pub mod tcp;
pub mod udp;

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the socket, its kind or its connection state do not allow an operation, or
    /// when a handle no longer refers to a valid socket.
    Illegal,

    /// Not enough space for the requested packet.
    ///
    /// Returned when data does not fit into a transmit buffer or a received frame does not fit
    /// into the receive buffer. In contrast to `Illegal` this would signal that a smaller size
    /// may be possible.
    BadSize,

    /// Unable to reach the destination.
    ///
    /// The link is down or the interface is not configured.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources. All tables of the stack have a fixed size, a free socket, timer or
    /// resolution slot is required.
    Exhausted,

    /// The network device reported a failure.
    Device,
}

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed.
impl From<crate::wire::Error> for Error {
    fn from(_: crate::wire::Error) -> Self {
        Error::Illegal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Error::Illegal => "operation not permitted",
            Error::BadSize => "buffer too small",
            Error::Unreachable => "destination unreachable",
            Error::Exhausted => "resources exhausted",
            Error::Device => "device failure",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
