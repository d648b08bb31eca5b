//! Ethernet II framing on the one interface of the stack.
//!
//! Frames carry no 802.1Q tag and no trailer: 14 octets of header are followed by the payload.
use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

/// Octets before the payload.
const HEADER_LEN: usize = 14;

const DST: core::ops::Range<usize> = 0..6;
const SRC: core::ops::Range<usize> = 6..12;
const TYPE: core::ops::Range<usize> = 12..14;

enum_with_unknown! {
    /// The payload kinds the stack dispatches on.
    pub enum EtherType(u16) {
        Ipv4 = 0x0800,
        Arp = 0x0806,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EtherType::Ipv4 => f.write_str("IPv4"),
            EtherType::Arp => f.write_str("ARP"),
            EtherType::Unknown(other) => write!(f, "0x{:04x}", other),
        }
    }
}

/// A hardware (MAC) address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// All-ones, received by every station on the segment.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// Copy an address out of six octets.
    ///
    /// Panics if `bytes` has a different length.
    pub fn from_bytes(bytes: &[u8]) -> Address {
        let mut octets = [0; 6];
        octets.copy_from_slice(bytes);
        Address(octets)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Address::BROADCAST
    }

    /// Neither broadcast nor a group address.
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", octet)?;
        }
        Ok(())
    }
}

/// A MAC address string that is not six colon separated hex octets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("expected six hex octets separated by ':'")
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(text: &str) -> core::result::Result<Address, ParseAddressError> {
        let mut octets = [0u8; 6];
        let mut parts = text.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(ParseAddressError)?;
            if part.is_empty() || part.len() > 2 {
                return Err(ParseAddressError);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseAddressError)?;
        }
        match parts.next() {
            None => Ok(Address(octets)),
            Some(_) => Err(ParseAddressError),
        }
    }
}

byte_wrapper! {
    /// An Ethernet II frame.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ethernet([u8]);
}

impl ethernet {
    /// Err(Truncated) unless the whole header is present.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    /// Frame size for a payload of `payload_len` octets.
    pub fn buffer_len(payload_len: usize) -> usize {
        HEADER_LEN + payload_len
    }

    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[DST])
    }

    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[SRC])
    }

    pub fn ethertype(&self) -> EtherType {
        NetworkEndian::read_u16(&self.0[TYPE]).into()
    }

    pub fn set_dst_addr(&mut self, addr: Address) {
        self.0[DST].copy_from_slice(&addr.0);
    }

    pub fn set_src_addr(&mut self, addr: Address) {
        self.0[SRC].copy_from_slice(&addr.0);
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) {
        NetworkEndian::write_u16(&mut self.0[TYPE], ethertype.into());
    }

    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..]
    }

    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0[HEADER_LEN..]
    }
}

/// The addressing of a frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub ethertype: EtherType,
}

impl Repr {
    pub fn parse(frame: &ethernet) -> Result<Repr> {
        frame.check_len()?;
        Ok(Repr {
            src_addr: frame.src_addr(),
            dst_addr: frame.dst_addr(),
            ethertype: frame.ethertype(),
        })
    }

    /// The header size, the payload follows it.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    pub fn emit(&self, frame: &mut ethernet) {
        frame.set_dst_addr(self.dst_addr);
        frame.set_src_addr(self.src_addr);
        frame.set_ethertype(self.ethertype);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} > {} {}", self.src_addr, self.dst_addr, self.ethertype)
    }
}
