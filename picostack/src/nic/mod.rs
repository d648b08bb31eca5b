//! Encapsulates a network interface card.
//!
//! The stack treats the interface as a raw frame transport. Frames are whole Ethernet II frames
//! without preamble and frame check sequence, exchanged through the [`Device`] trait.
//!
//! [`Device`]: trait.Device.html
#[cfg(any(test, feature = "std"))]
pub mod external;

#[cfg(all(feature = "std", target_os = "linux"))]
mod sys;

use crate::layer::Result;
use crate::wire::EthernetAddress;

#[cfg(any(test, feature = "std"))]
pub use self::external::External;

#[cfg(all(feature = "std", target_os = "linux"))]
pub use self::sys::{Errno, RawSocket};

/// The driver of a single network interface.
///
/// All methods are expected to return immediately. A driver that can not receive or transmit
/// right now should report it and leave retrying to the stack's caller.
pub trait Device {
    /// Check if a received frame is waiting to be read.
    fn is_frame_available(&mut self) -> bool;

    /// Read the next received frame into `buffer`.
    ///
    /// Returns the length of the frame. Reading when no frame is available returns `Ok(0)`. A
    /// frame longer than the buffer is dropped with `Err(Error::BadSize)`.
    fn receive_frame(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Transmit one complete frame.
    fn transmit_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// The hardware address of the interface.
    fn local_mac_address(&self) -> EthernetAddress;

    /// Check and clear the receive overflow condition.
    ///
    /// Devices without a bounded receive ring never overflow.
    fn is_overflow(&mut self) -> bool {
        false
    }

    /// Check if the link is up.
    fn is_link_up(&mut self) -> bool {
        true
    }
}

impl<D: Device + ?Sized> Device for &'_ mut D {
    fn is_frame_available(&mut self) -> bool {
        (**self).is_frame_available()
    }

    fn receive_frame(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).receive_frame(buffer)
    }

    fn transmit_frame(&mut self, frame: &[u8]) -> Result<()> {
        (**self).transmit_frame(frame)
    }

    fn local_mac_address(&self) -> EthernetAddress {
        (**self).local_mac_address()
    }

    fn is_overflow(&mut self) -> bool {
        (**self).is_overflow()
    }

    fn is_link_up(&mut self) -> bool {
        (**self).is_link_up()
    }
}
