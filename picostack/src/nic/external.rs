//! A device whose frames are supplied and inspected by the program itself.
//!
//! Mostly useful for tests and for bridging the stack onto a transport it does not know, for
//! example a serial line or a simulation.
use std::collections::VecDeque;

use crate::layer::{Error, Result};
use crate::wire::EthernetAddress;
use super::Device;

/// An in-memory network device.
///
/// Frames pushed with [`push_rx`] are handed to the stack in order. Frames transmitted by the
/// stack are collected until taken with [`take_tx`].
///
/// [`push_rx`]: #method.push_rx
/// [`take_tx`]: #method.take_tx
#[derive(Debug)]
pub struct External {
    mac: EthernetAddress,
    rx: VecDeque<Vec<u8>>,
    tx: Vec<Vec<u8>>,
    link_up: bool,
    overflow: bool,
}

impl External {
    /// Create a device with an empty queue and the link up.
    pub fn new(mac: EthernetAddress) -> Self {
        External {
            mac,
            rx: VecDeque::new(),
            tx: Vec::new(),
            link_up: true,
            overflow: false,
        }
    }

    /// Queue a frame for reception.
    pub fn push_rx(&mut self, frame: Vec<u8>) {
        self.rx.push_back(frame)
    }

    /// Number of frames not yet received by the stack.
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// All frames transmitted since the last call.
    pub fn take_tx(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.tx)
    }

    /// Inspect transmitted frames without taking them.
    pub fn tx(&self) -> &[Vec<u8>] {
        &self.tx
    }

    /// Simulate plugging or unplugging the cable.
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    /// Raise the overflow condition once.
    pub fn set_overflow(&mut self) {
        self.overflow = true;
    }
}

impl Device for External {
    fn is_frame_available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn receive_frame(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let frame = match self.rx.pop_front() {
            Some(frame) => frame,
            None => return Ok(0),
        };

        let target = buffer.get_mut(..frame.len()).ok_or(Error::BadSize)?;
        target.copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn transmit_frame(&mut self, frame: &[u8]) -> Result<()> {
        if !self.link_up {
            return Err(Error::Unreachable);
        }

        self.tx.push(frame.to_vec());
        Ok(())
    }

    fn local_mac_address(&self) -> EthernetAddress {
        self.mac
    }

    fn is_overflow(&mut self) -> bool {
        core::mem::replace(&mut self.overflow, false)
    }

    fn is_link_up(&mut self) -> bool {
        self.link_up
    }
}
