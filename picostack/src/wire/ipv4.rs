//! IPv4 with the plain 20 octet header.
//!
//! The stack neither sends nor accepts header options and does not reassemble fragments. A
//! packet using either is refused with `Error::Unsupported`.
use core::{fmt, str::FromStr};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Checksum, Result};
use super::ip::checksum;

pub use super::IpProtocol as Protocol;

/// The only header size we handle.
const HEADER_LEN: usize = 20;

/// Version 4 and a header of five words.
const VERSION_IHL: u8 = 0x45;

// Offsets of the header fields.
const TOTAL_LEN: usize = 2;
const IDENT: usize = 4;
const FRAGMENT: usize = 6;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: usize = 10;
const SRC: usize = 12;
const DST: usize = 16;

/// Bits of the fragment word telling a packet is part of a larger one.
const MORE_FRAGMENTS_AND_OFFSET: u16 = 0x3fff;

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// `0.0.0.0`, the value of every unset configuration entry.
    pub const UNSPECIFIED: Address = Address([0; 4]);

    /// `255.255.255.255`, the limited broadcast.
    pub const BROADCAST: Address = Address([255; 4]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Address {
        Address([a, b, c, d])
    }

    /// Copy an address out of four octets.
    ///
    /// Panics if `bytes` has a different length.
    pub fn from_bytes(bytes: &[u8]) -> Address {
        let mut octets = [0; 4];
        octets.copy_from_slice(bytes);
        Address(octets)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The address read as a big-endian number.
    pub fn to_bits(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Address::BROADCAST
    }

    pub fn is_unspecified(&self) -> bool {
        *self == Address::UNSPECIFIED
    }

    /// Whether `other` shares our network under `netmask`.
    ///
    /// ```rust
    /// # use picostack::wire::Ipv4Address as Address;
    /// let local = Address::new(192, 168, 1, 118);
    /// let mask = Address::new(255, 255, 255, 0);
    /// assert!(local.in_subnet(Address::new(192, 168, 1, 1), mask));
    /// assert!(!local.in_subnet(Address::new(192, 168, 7, 1), mask));
    /// ```
    pub fn in_subnet(&self, other: Address, netmask: Address) -> bool {
        super::ip::ip_in_subnet(*self, other, netmask)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// Text that is not a dotted quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("expected four decimal octets separated by '.'")
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(text: &str) -> core::result::Result<Address, ParseAddressError> {
        let mut octets = [0u8; 4];
        let mut parts = text.split('.');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(ParseAddressError)?;
            *octet = part.parse().map_err(|_| ParseAddressError)?;
        }
        match parts.next() {
            None => Ok(Address(octets)),
            Some(_) => Err(ParseAddressError),
        }
    }
}

byte_wrapper! {
    /// An IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

impl ipv4 {
    /// Check the buffer against the length fields.
    ///
    /// The buffer must hold the header and `total_len` octets, it may be longer since short
    /// Ethernet frames are padded. A header length field other than 20 octets is `Unsupported`,
    /// or `Malformed` when it is shorter than the fixed fields.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let header_len = usize::from(self.0[0] & 0x0f) * 4;
        if header_len < HEADER_LEN {
            return Err(Error::Malformed);
        }
        if header_len > HEADER_LEN {
            return Err(Error::Unsupported);
        }

        let total_len = usize::from(self.total_len());
        if total_len < HEADER_LEN {
            Err(Error::Malformed)
        } else if self.0.len() < total_len {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn version(&self) -> u8 {
        self.0[0] >> 4
    }

    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[TOTAL_LEN..])
    }

    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[IDENT..])
    }

    /// Part of a fragmented packet, either not the last or not the first piece.
    pub fn is_fragment(&self) -> bool {
        NetworkEndian::read_u16(&self.0[FRAGMENT..]) & MORE_FRAGMENTS_AND_OFFSET != 0
    }

    pub fn hop_limit(&self) -> u8 {
        self.0[TTL]
    }

    pub fn protocol(&self) -> Protocol {
        self.0[PROTOCOL].into()
    }

    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[CHECKSUM..])
    }

    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[SRC..SRC + 4])
    }

    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[DST..DST + 4])
    }

    pub fn set_dst_addr(&mut self, addr: Address) {
        self.0[DST..DST + 4].copy_from_slice(&addr.0);
    }

    /// Whether the header sums to zero, checksum field included.
    pub fn verify_checksum(&self) -> bool {
        let mut sum = 0;
        checksum::sum_words(&self.0[..HEADER_LEN], &mut sum);
        checksum::fold(sum) == 0
    }

    /// Write the checksum over all other header fields.
    pub fn fill_checksum(&mut self) {
        NetworkEndian::write_u16(&mut self.0[CHECKSUM..], 0);
        let mut sum = 0;
        checksum::sum_words(&self.0[..HEADER_LEN], &mut sum);
        NetworkEndian::write_u16(&mut self.0[CHECKSUM..], checksum::fold(sum));
    }

    /// The payload, without any Ethernet padding after it.
    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..usize::from(self.total_len())]
    }

    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let end = usize::from(self.total_len());
        &mut self.0[HEADER_LEN..end]
    }
}

/// The header fields the stack reads and writes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub protocol: Protocol,
    pub payload_len: usize,
    /// The time to live.
    pub hop_limit: u8,
    pub ident: u16,
}

impl Repr {
    /// Read the header of an unfragmented version 4 packet.
    pub fn parse(packet: &ipv4, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        if packet.version() != 4 {
            return Err(Error::Malformed);
        }
        if checksum.manual() && !packet.verify_checksum() {
            return Err(Error::WrongChecksum);
        }
        if packet.is_fragment() {
            return Err(Error::Unsupported);
        }

        Ok(Repr {
            src_addr: packet.src_addr(),
            dst_addr: packet.dst_addr(),
            protocol: packet.protocol(),
            payload_len: usize::from(packet.total_len()) - HEADER_LEN,
            hop_limit: packet.hop_limit(),
            ident: packet.ident(),
        })
    }

    /// Always the fixed header.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Write the header, with zero type of service and no fragment flags.
    ///
    /// With `Checksum::Ignored` the checksum field is left zero.
    pub fn emit(&self, packet: &mut ipv4, checksum: Checksum) {
        let header = &mut packet.0[..HEADER_LEN];
        header.iter_mut().for_each(|octet| *octet = 0);
        header[0] = VERSION_IHL;
        NetworkEndian::write_u16(&mut header[TOTAL_LEN..], (HEADER_LEN + self.payload_len) as u16);
        NetworkEndian::write_u16(&mut header[IDENT..], self.ident);
        header[TTL] = self.hop_limit;
        header[PROTOCOL] = self.protocol.into();
        header[SRC..SRC + 4].copy_from_slice(&self.src_addr.0);
        header[DST..DST + 4].copy_from_slice(&self.dst_addr.0);

        if checksum.manual() {
            packet.fill_checksum();
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} > {} {} len={}", self.src_addr, self.dst_addr, self.protocol, self.payload_len)
    }
}
