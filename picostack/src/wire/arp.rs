use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::{EthernetAddress, EthernetProtocol, Ipv4Address};

enum_with_unknown! {
    /// ARP hardware type.
    pub enum Hardware(u16) {
        Ethernet = 1,
    }
}

enum_with_unknown! {
    /// ARP operation type.
    pub enum Operation(u16) {
        Request = 1,
        Reply = 2,
    }
}

byte_wrapper! {
    /// A byte sequence representing an ARP packet for Ethernet and IPv4.
    ///
    /// The address fields are at the offsets of a six octet hardware and four octet protocol
    /// address. Other pairings are rejected by [`Repr::parse`].
    ///
    /// [`Repr::parse`]: struct.Repr.html#method.parse
    #[derive(Debug, PartialEq, Eq)]
    pub struct arp([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const HTYPE: Field =  0..2;
    pub(crate) const PTYPE: Field =  2..4;
    pub(crate) const HLEN:  usize =  4;
    pub(crate) const PLEN:  usize =  5;
    pub(crate) const OPER:  Field =  6..8;
    pub(crate) const SHA:   Field =  8..14;
    pub(crate) const SPA:   Field = 14..18;
    pub(crate) const THA:   Field = 18..24;
    pub(crate) const TPA:   Field = 24..28;
}

impl arp {
    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::TPA.end {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn hardware_type(&self) -> Hardware {
        Hardware::from(NetworkEndian::read_u16(&self.0[field::HTYPE]))
    }

    #[inline]
    pub fn protocol_type(&self) -> EthernetProtocol {
        EthernetProtocol::from(NetworkEndian::read_u16(&self.0[field::PTYPE]))
    }

    #[inline]
    pub fn hardware_len(&self) -> u8 {
        self.0[field::HLEN]
    }

    #[inline]
    pub fn protocol_len(&self) -> u8 {
        self.0[field::PLEN]
    }

    #[inline]
    pub fn operation(&self) -> Operation {
        Operation::from(NetworkEndian::read_u16(&self.0[field::OPER]))
    }

    #[inline]
    pub fn source_hardware_addr(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.0[field::SHA])
    }

    #[inline]
    pub fn source_protocol_addr(&self) -> Ipv4Address {
        Ipv4Address::from_bytes(&self.0[field::SPA])
    }

    #[inline]
    pub fn target_hardware_addr(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.0[field::THA])
    }

    #[inline]
    pub fn target_protocol_addr(&self) -> Ipv4Address {
        Ipv4Address::from_bytes(&self.0[field::TPA])
    }

    #[inline]
    pub fn set_hardware_type(&mut self, value: Hardware) {
        NetworkEndian::write_u16(&mut self.0[field::HTYPE], value.into())
    }

    #[inline]
    pub fn set_protocol_type(&mut self, value: EthernetProtocol) {
        NetworkEndian::write_u16(&mut self.0[field::PTYPE], value.into())
    }

    #[inline]
    pub fn set_hardware_len(&mut self, value: u8) {
        self.0[field::HLEN] = value
    }

    #[inline]
    pub fn set_protocol_len(&mut self, value: u8) {
        self.0[field::PLEN] = value
    }

    #[inline]
    pub fn set_operation(&mut self, value: Operation) {
        NetworkEndian::write_u16(&mut self.0[field::OPER], value.into())
    }

    #[inline]
    pub fn set_source_hardware_addr(&mut self, value: EthernetAddress) {
        self.0[field::SHA].copy_from_slice(value.as_bytes())
    }

    #[inline]
    pub fn set_source_protocol_addr(&mut self, value: Ipv4Address) {
        self.0[field::SPA].copy_from_slice(value.as_bytes())
    }

    #[inline]
    pub fn set_target_hardware_addr(&mut self, value: EthernetAddress) {
        self.0[field::THA].copy_from_slice(value.as_bytes())
    }

    #[inline]
    pub fn set_target_protocol_addr(&mut self, value: Ipv4Address) {
        self.0[field::TPA].copy_from_slice(value.as_bytes())
    }
}

/// A high-level representation of an Ethernet and IPv4 Address Resolution Protocol packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub operation: Operation,
    pub source_hardware_addr: EthernetAddress,
    pub source_protocol_addr: Ipv4Address,
    pub target_hardware_addr: EthernetAddress,
    pub target_protocol_addr: Ipv4Address,
}

impl Repr {
    /// Parse an Address Resolution Protocol packet and return a high-level representation.
    ///
    /// Returns `Err(Error::Unrecognized)` for any hardware and protocol pairing other than
    /// Ethernet and IPv4, or any operation other than request and reply.
    pub fn parse(packet: &arp) -> Result<Repr> {
        packet.check_len()?;
        match (
            packet.hardware_type(),
            packet.protocol_type(),
            packet.hardware_len(),
            packet.protocol_len(),
            packet.operation(),
        ) {
            (Hardware::Ethernet, EthernetProtocol::Ipv4, 6, 4, operation @ Operation::Request)
            | (Hardware::Ethernet, EthernetProtocol::Ipv4, 6, 4, operation @ Operation::Reply) => {
                Ok(Repr {
                    operation,
                    source_hardware_addr: packet.source_hardware_addr(),
                    source_protocol_addr: packet.source_protocol_addr(),
                    target_hardware_addr: packet.target_hardware_addr(),
                    target_protocol_addr: packet.target_protocol_addr(),
                })
            },
            _ => Err(Error::Unrecognized),
        }
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        field::TPA.end
    }

    /// Emit a high-level representation into an Address Resolution Protocol packet.
    pub fn emit(&self, packet: &mut arp) {
        packet.set_hardware_type(Hardware::Ethernet);
        packet.set_protocol_type(EthernetProtocol::Ipv4);
        packet.set_hardware_len(6);
        packet.set_protocol_len(4);
        packet.set_operation(self.operation);
        packet.set_source_hardware_addr(self.source_hardware_addr);
        packet.set_source_protocol_addr(self.source_protocol_addr);
        packet.set_target_hardware_addr(self.target_hardware_addr);
        packet.set_target_protocol_addr(self.target_protocol_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ARP src={}/{} tgt={}/{} op={:?}",
               self.source_hardware_addr, self.source_protocol_addr,
               self.target_hardware_addr, self.target_protocol_addr,
               self.operation)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 28] = [
        0x00, 0x01,
        0x08, 0x00,
        0x06,
        0x04,
        0x00, 0x02,
        0x11, 0x12, 0x13, 0x14, 0x15, 0x16,
        0xc0, 0xa8, 0x01, 0x01,
        0x31, 0x32, 0x33, 0x34, 0x35, 0x36,
        0xc0, 0xa8, 0x01, 0x76,
    ];

    fn packet_repr() -> Repr {
        Repr {
            operation: Operation::Reply,
            source_hardware_addr: EthernetAddress([0x11, 0x12, 0x13, 0x14, 0x15, 0x16]),
            source_protocol_addr: Ipv4Address::new(192, 168, 1, 1),
            target_hardware_addr: EthernetAddress([0x31, 0x32, 0x33, 0x34, 0x35, 0x36]),
            target_protocol_addr: Ipv4Address::new(192, 168, 1, 118),
        }
    }

    #[test]
    fn test_parse() {
        let packet = arp::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.hardware_type(), Hardware::Ethernet);
        assert_eq!(packet.protocol_type(), EthernetProtocol::Ipv4);
        assert_eq!(Repr::parse(packet), Ok(packet_repr()));
    }

    #[test]
    fn test_emit() {
        let repr = packet_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        repr.emit(arp::new_unchecked_mut(&mut bytes));
        assert_eq!(&bytes[..], &PACKET_BYTES[..]);
    }

    #[test]
    fn unknown_operation() {
        let mut bytes = PACKET_BYTES;
        bytes[7] = 0x03;
        let packet = arp::new_unchecked(&bytes[..]);
        assert_eq!(packet.operation(), Operation::Unknown(3));
        assert_eq!(Repr::parse(packet), Err(Error::Unrecognized));
    }

    #[test]
    fn other_protocol_pairing() {
        let mut bytes = PACKET_BYTES;
        bytes[2] = 0x86;
        bytes[3] = 0xdd;
        assert_eq!(Repr::parse(arp::new_unchecked(&bytes[..])), Err(Error::Unrecognized));
    }

    #[test]
    fn truncated() {
        assert_eq!(arp::new_checked(&PACKET_BYTES[..27]), Err(Error::Truncated));
    }
}
