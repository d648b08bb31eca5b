//! ICMPv4 echo messages.
//!
//! Echo request and reply are the only messages the stack reads or writes, anything else parses
//! as `Error::Unrecognized`.
use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Checksum, Result};
use super::ip::checksum;

const ECHO_REPLY: u8 = 0;
const ECHO_REQUEST: u8 = 8;

/// Type, code, checksum, identifier and sequence number.
const HEADER_LEN: usize = 8;

byte_wrapper! {
    /// An ICMPv4 echo message.
    #[derive(Debug, PartialEq, Eq)]
    pub struct icmpv4([u8]);
}

impl icmpv4 {
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn msg_type(&self) -> u8 {
        self.0[0]
    }

    pub fn msg_code(&self) -> u8 {
        self.0[1]
    }

    pub fn ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[4..6])
    }

    pub fn seq_no(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[6..8])
    }

    /// The checksum covers the whole message.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0) == 0xffff
    }

    pub fn fill_checksum(&mut self) {
        NetworkEndian::write_u16(&mut self.0[2..4], 0);
        let sum = !checksum::data(&self.0);
        NetworkEndian::write_u16(&mut self.0[2..4], sum);
    }

    pub fn payload_slice(&self) -> &[u8] {
        &self.0[HEADER_LEN..]
    }

    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0[HEADER_LEN..]
    }
}

/// An echo message, with the length of its payload.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Repr {
    EchoRequest { ident: u16, seq_no: u16, payload: usize },
    EchoReply { ident: u16, seq_no: u16, payload: usize },
}

impl Repr {
    /// The reply to a request, carrying the same identifier, sequence number and payload.
    pub fn echo_reply(self) -> Option<Repr> {
        match self {
            Repr::EchoRequest { ident, seq_no, payload } => Some(Repr::EchoReply { ident, seq_no, payload }),
            Repr::EchoReply { .. } => None,
        }
    }

    pub fn parse(packet: &icmpv4, checksum: Checksum) -> Result<Repr> {
        packet.check_len()?;
        if checksum.manual() && !packet.verify_checksum() {
            return Err(Error::WrongChecksum);
        }

        let ident = packet.ident();
        let seq_no = packet.seq_no();
        let payload = packet.payload_slice().len();
        match (packet.msg_type(), packet.msg_code()) {
            (ECHO_REQUEST, 0) => Ok(Repr::EchoRequest { ident, seq_no, payload }),
            (ECHO_REPLY, 0) => Ok(Repr::EchoReply { ident, seq_no, payload }),
            _ => Err(Error::Unrecognized),
        }
    }

    pub fn payload_len(&self) -> usize {
        match *self {
            Repr::EchoRequest { payload, .. } | Repr::EchoReply { payload, .. } => payload,
        }
    }

    pub fn buffer_len(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    /// Write header and payload, `payload` must be `payload_len` octets.
    ///
    /// With `Checksum::Ignored` the checksum field is left zero.
    pub fn emit(&self, packet: &mut icmpv4, payload: &[u8], checksum: Checksum) {
        let (msg_type, ident, seq_no) = match *self {
            Repr::EchoRequest { ident, seq_no, .. } => (ECHO_REQUEST, ident, seq_no),
            Repr::EchoReply { ident, seq_no, .. } => (ECHO_REPLY, ident, seq_no),
        };

        let header = &mut packet.0[..HEADER_LEN];
        header[0] = msg_type;
        header[1] = 0;
        NetworkEndian::write_u16(&mut header[2..4], 0);
        NetworkEndian::write_u16(&mut header[4..6], ident);
        NetworkEndian::write_u16(&mut header[6..8], seq_no);
        packet.payload_mut_slice()[..payload.len()].copy_from_slice(payload);

        if checksum.manual() {
            packet.fill_checksum();
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, ident, seq_no) = match *self {
            Repr::EchoRequest { ident, seq_no, .. } => ("request", ident, seq_no),
            Repr::EchoReply { ident, seq_no, .. } => ("reply", ident, seq_no),
        };
        write!(f, "echo {} id={} seq={} len={}", kind, ident, seq_no, self.payload_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Identifier 0x1234, sequence number 0xabcd and four octets of payload.
    const REQUEST: [u8; 12] = [
        0x08, 0x00, 0x8e, 0xfe, 0x12, 0x34, 0xab, 0xcd,
        0xaa, 0x00, 0x00, 0xff,
    ];

    const REQUEST_REPR: Repr = Repr::EchoRequest { ident: 0x1234, seq_no: 0xabcd, payload: 4 };

    #[test]
    fn read_request() {
        let packet = icmpv4::new_checked(&REQUEST).unwrap();
        assert!(packet.verify_checksum());
        assert_eq!(Repr::parse(packet, Checksum::Manual), Ok(REQUEST_REPR));
        assert_eq!(packet.payload_slice(), &REQUEST[8..]);
    }

    #[test]
    fn write_request() {
        let mut bytes = [0x5a; 12];
        REQUEST_REPR.emit(icmpv4::new_unchecked_mut(&mut bytes), &REQUEST[8..], Checksum::Manual);
        assert_eq!(bytes, REQUEST);
    }

    #[test]
    fn reply_keeps_ident_and_sequence() {
        let reply = REQUEST_REPR.echo_reply().unwrap();
        assert_eq!(reply, Repr::EchoReply { ident: 0x1234, seq_no: 0xabcd, payload: 4 });
        assert_eq!(reply.echo_reply(), None);
    }

    #[test]
    fn only_echo_is_understood() {
        // Time exceeded, with a valid checksum.
        let mut bytes = REQUEST;
        bytes[0] = 11;
        let packet = icmpv4::new_unchecked_mut(&mut bytes);
        packet.fill_checksum();
        assert_eq!(Repr::parse(packet, Checksum::Manual), Err(Error::Unrecognized));
        assert_eq!(icmpv4::new_checked(&REQUEST[..7]).err(), Some(Error::Truncated));
    }
}
