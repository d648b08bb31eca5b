use core::fmt;

use super::Ipv4Address;

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        Icmp = 0x01,
        Tcp  = 0x06,
        Udp  = 0x11,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Tcp  => write!(f, "TCP"),
            Protocol::Udp  => write!(f, "UDP"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// Compare two addresses for equality.
pub fn ip_equal(a: Ipv4Address, b: Ipv4Address) -> bool {
    a == b
}

/// Test if `other` lies in the same subnet as `addr` under `mask`.
///
/// Both addresses are masked octet by octet and then compared.
pub fn ip_in_subnet(addr: Ipv4Address, other: Ipv4Address, mask: Ipv4Address) -> bool {
    addr.0.iter()
        .zip(other.0.iter())
        .zip(mask.0.iter())
        .all(|((a, o), m)| a & m == o & m)
}

/// One's complement arithmetic of RFC 1071.
///
/// All functions treat their input as a sequence of big-endian 16-bit words. A trailing odd
/// octet is padded with a zero octet on the right.
pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::{Ipv4Address, Protocol};

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Accumulate `data` into a running 32-bit sum.
    ///
    /// Carries are kept in the upper half and only folded by [`fold`]. Chunks summed one after
    /// another must all be of even length, except the last one.
    ///
    /// [`fold`]: fn.fold.html
    pub fn sum_words(mut data: &[u8], sum: &mut u32) {
        while data.len() >= 2 {
            add(sum, NetworkEndian::read_u16(data));
            data = &data[2..];
        }

        if let Some(&value) = data.first() {
            add(sum, u16::from(value) << 8);
        }
    }

    fn add(sum: &mut u32, word: u16) {
        // Fold early instead of overflowing on very long inputs.
        if *sum >= 0xffff_0000 {
            *sum = u32::from(propagate_carries(*sum));
        }
        *sum += u32::from(word);
    }

    /// Fold all carries into the low 16 bits and return the one's complement.
    ///
    /// A buffer that contains its own correct checksum folds to zero.
    pub fn fold(sum: u32) -> u16 {
        !propagate_carries(sum)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub fn data(data: &[u8]) -> u16 {
        let mut accum = 0;
        sum_words(data, &mut accum);
        propagate_carries(accum)
    }

    /// Combine several RFC 1071 compliant checksums.
    pub fn combine(checksums: &[u16]) -> u16 {
        let mut accum: u32 = 0;
        for &word in checksums {
            accum += u32::from(word);
        }
        propagate_carries(accum)
    }

    /// Compute an IP pseudo header checksum.
    ///
    /// The pseudo header is the source address, the destination address, a zero octet, the
    /// protocol and the length of the upper layer packet.
    pub fn pseudo_header(src_addr: Ipv4Address, dst_addr: Ipv4Address,
                         protocol: Protocol, length: u16) -> u16 {
        let mut proto_len = [0u8; 4];
        proto_len[1] = protocol.into();
        NetworkEndian::write_u16(&mut proto_len[2..4], length);

        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..])
        ])
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_membership() {
        let mask = Ipv4Address::new(255, 255, 255, 0);
        let local = Ipv4Address::new(192, 168, 1, 118);
        assert!(ip_in_subnet(local, Ipv4Address::new(192, 168, 1, 1), mask));
        assert!(!ip_in_subnet(local, Ipv4Address::new(192, 168, 2, 1), mask));
        assert!(ip_in_subnet(local, Ipv4Address::new(10, 0, 0, 1), Ipv4Address::UNSPECIFIED));
        assert!(ip_equal(local, Ipv4Address::new(192, 168, 1, 118)));
        assert!(!ip_equal(local, Ipv4Address::new(192, 168, 1, 119)));
    }
}
