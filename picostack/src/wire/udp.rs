use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, IpProtocol, Ipv4Address, Result};
use super::ip::checksum;

/// Ports, length and checksum.
const HEADER_LEN: usize = 8;

byte_wrapper! {
    /// A UDP datagram, header and payload.
    #[derive(Debug, PartialEq, Eq)]
    pub struct udp([u8]);
}

impl udp {
    /// The length field must cover the header and fit into the buffer.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        match usize::from(self.len()) {
            len if len < HEADER_LEN => Err(Error::Malformed),
            len if len > self.0.len() => Err(Error::Truncated),
            _ => Ok(()),
        }
    }

    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[0..2])
    }

    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[2..4])
    }

    /// Header and payload octets.
    pub fn len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[4..6])
    }

    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[6..8])
    }

    fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[6..8], value);
    }

    /// The one's complement sum of pseudo header and datagram, not yet complemented.
    fn sum(&self, pseudo: Checksum) -> u16 {
        checksum::combine(&[
            checksum::pseudo_header(pseudo.src_addr, pseudo.dst_addr, IpProtocol::Udp, self.len()),
            checksum::data(&self.0[..usize::from(self.len())]),
        ])
    }

    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..usize::from(self.len())]
    }

    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let end = usize::from(self.len());
        &mut self.0[HEADER_LEN..end]
    }
}

/// The addresses of the IPv4 pseudo header a datagram checksum covers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Checksum {
    pub src_addr: Ipv4Address,
    pub dst_addr: Ipv4Address,
}

impl Checksum {
    pub fn for_pseudo_header(src_addr: Ipv4Address, dst_addr: Ipv4Address) -> Self {
        Checksum { src_addr, dst_addr }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload_len: usize,
}

impl Repr {
    /// A zero checksum field means the sender computed none, such datagrams are accepted.
    pub fn parse(packet: &udp, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        if packet.dst_port() == 0 {
            return Err(Error::Malformed);
        }
        if packet.checksum() != 0 && packet.sum(checksum) != 0xffff {
            return Err(Error::WrongChecksum);
        }

        Ok(Repr {
            src_port: packet.src_port(),
            dst_port: packet.dst_port(),
            payload_len: usize::from(packet.len()) - HEADER_LEN,
        })
    }

    /// Header and payload.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload_len
    }

    /// Write the whole datagram, `payload` must be `payload_len` octets.
    pub fn emit(&self, packet: &mut udp, payload: &[u8], checksum: Checksum) {
        let header = &mut packet.0[..HEADER_LEN];
        NetworkEndian::write_u16(&mut header[0..2], self.src_port);
        NetworkEndian::write_u16(&mut header[2..4], self.dst_port);
        NetworkEndian::write_u16(&mut header[4..6], self.buffer_len() as u16);
        NetworkEndian::write_u16(&mut header[6..8], 0);
        packet.payload_mut_slice().copy_from_slice(payload);

        // Zero on the wire means no checksum, its complement stands in for it.
        let sum = !packet.sum(checksum);
        packet.set_checksum(if sum == 0 { 0xffff } else { sum });
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "udp {} > {} len={}", self.src_port, self.dst_port, self.payload_len)
    }
}
