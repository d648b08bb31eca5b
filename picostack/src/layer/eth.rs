//! The link layer and IPv4 framing around the device.
use crate::config::{Config, MAX_FRAME_LEN};
use crate::nic::Device;
use crate::wire::{
    ethernet_frame,
    arp_packet,
    ipv4_packet,
    ArpRepr,
    Checksum,
    EthernetAddress,
    EthernetProtocol,
    EthernetRepr,
    IpProtocol,
    Ipv4Address,
    Ipv4Repr,
};
use super::{Error, Result};

/// Length of the Ethernet II header.
const ETH_HEADER_LEN: usize = 14;

/// Length of the IPv4 header, options are never emitted.
const IPV4_HEADER_LEN: usize = 20;

/// The largest IPv4 payload that fits a frame.
pub const MAX_IPV4_PAYLOAD: usize = MAX_FRAME_LEN - ETH_HEADER_LEN - IPV4_HEADER_LEN;

/// The interface: a device, its configuration and a transmit buffer.
///
/// All outgoing frames are assembled in the single transmit buffer and handed to the device
/// immediately, nothing is queued here.
pub struct Interface<D> {
    device: D,
    mac: EthernetAddress,
    config: Config,
    frame: [u8; MAX_FRAME_LEN],
}

/// The header fields of an outgoing IPv4 packet chosen by the upper layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Out {
    /// Hardware address of the next hop.
    pub dst_mac: EthernetAddress,
    /// The final destination.
    pub dst_addr: Ipv4Address,
    pub protocol: IpProtocol,
    pub ident: u16,
    pub payload_len: usize,
}

impl<D: Device> Interface<D> {
    /// Wrap a device, caching its hardware address.
    pub fn new(device: D, config: Config) -> Self {
        let mac = device.local_mac_address();
        Interface {
            device,
            mac,
            config,
            frame: [0; MAX_FRAME_LEN],
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Change the configuration, for example after a lease was acquired.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// The hardware address of the interface.
    pub fn mac(&self) -> EthernetAddress {
        self.mac
    }

    /// Read one received frame into `buffer`, if any.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>> {
        if self.device.is_overflow() {
            net_debug!("receive overflow, frames were lost");
        }

        if !self.device.is_frame_available() {
            return Ok(None);
        }

        match self.device.receive_frame(buffer)? {
            0 => Ok(None),
            len => Ok(Some(len)),
        }
    }

    /// Send an address resolution packet.
    pub fn send_arp(&mut self, dst_mac: EthernetAddress, repr: &ArpRepr) -> Result<()> {
        let len = ethernet_frame::buffer_len(repr.buffer_len());
        let frame = self.frame_with_header(dst_mac, EthernetProtocol::Arp, len);
        repr.emit(arp_packet::new_unchecked_mut(frame.payload_mut_slice()));
        self.transmit(len)
    }

    /// Send an IPv4 packet whose payload is written by `emit`.
    ///
    /// The closure receives exactly `payload_len` bytes and the source address of the packet, it
    /// is called after the headers were written.
    pub fn send_ipv4<F>(&mut self, out: Ipv4Out, emit: F) -> Result<()>
        where F: FnOnce(&mut [u8], Ipv4Address)
    {
        if out.payload_len > MAX_IPV4_PAYLOAD {
            return Err(Error::BadSize);
        }

        let repr = Ipv4Repr {
            src_addr: self.config.address,
            dst_addr: out.dst_addr,
            protocol: out.protocol,
            payload_len: out.payload_len,
            hop_limit: self.config.hop_limit,
            ident: out.ident,
        };

        let len = ethernet_frame::buffer_len(repr.buffer_len() + out.payload_len);
        let frame = self.frame_with_header(out.dst_mac, EthernetProtocol::Ipv4, len);
        let packet = ipv4_packet::new_unchecked_mut(frame.payload_mut_slice());
        repr.emit(packet, Checksum::Manual);
        emit(packet.payload_mut_slice(), repr.src_addr);
        self.transmit(len)
    }

    fn frame_with_header(&mut self, dst_addr: EthernetAddress, ethertype: EthernetProtocol, len: usize)
        -> &mut ethernet_frame
    {
        let repr = EthernetRepr {
            src_addr: self.mac,
            dst_addr,
            ethertype,
        };
        let frame = ethernet_frame::new_unchecked_mut(&mut self.frame[..len]);
        repr.emit(frame);
        frame
    }

    fn transmit(&mut self, len: usize) -> Result<()> {
        if !self.device.is_link_up() {
            net_debug!("link down, dropping {} byte frame", len);
            return Err(Error::Unreachable);
        }

        self.device.transmit_frame(&self.frame[..len])
    }
}
