//! Initial sequence numbers after RFC 6528.
//!
//! `ISN = M + F(localip, localport, remoteip, remoteport, secretkey)`, with SipHash-2-4 as `F`
//! and the tick count as the clock `M`.
use crate::wire::{Ipv4Address, TcpSeqNumber};

/// Sequence space the clock advances per tick, 4 microseconds granularity for 1 second ticks.
const TICK_SCALE: u32 = 250_000;

/// The addresses and ports that identify a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    pub local: Ipv4Address,
    pub local_port: u16,
    pub remote: Ipv4Address,
    pub remote_port: u16,
}

impl FourTuple {
    /// The twelve message octets as two little endian SipHash blocks, the second one with the
    /// message length in its top octet.
    fn blocks(&self) -> [u64; 2] {
        let addrs = u64::from(self.local.to_bits()) | u64::from(self.remote.to_bits()) << 32;
        let ports = u64::from(self.local_port) | u64::from(self.remote_port) << 16 | 12_u64 << 56;
        [addrs, ports]
    }
}

/// Keyed generator of initial sequence numbers.
#[derive(Clone, Copy, Debug)]
pub struct IsnGenerator {
    key: [u64; 2],
}

impl IsnGenerator {
    /// The key should come from a random source unique to the device.
    pub fn new(key: [u64; 2]) -> Self {
        IsnGenerator { key }
    }

    pub fn get_isn(&self, connection: FourTuple, ticks: u32) -> TcpSeqNumber {
        let offset = sip24(self.key, &connection.blocks());
        let clock = ticks.wrapping_mul(TICK_SCALE);
        TcpSeqNumber(offset as i32) + clock as usize
    }
}

/// SipHash-2-4 over message blocks that already carry the length octet.
fn sip24(key: [u64; 2], blocks: &[u64]) -> u64 {
    let mut v = [
        key[0] ^ 0x736f_6d65_7073_6575,
        key[1] ^ 0x646f_7261_6e64_6f6d,
        key[0] ^ 0x6c79_6765_6e65_7261,
        key[1] ^ 0x7465_6462_7974_6573,
    ];

    for &m in blocks {
        v[3] ^= m;
        sip_round(&mut v);
        sip_round(&mut v);
        v[0] ^= m;
    }

    v[2] ^= 0xff;
    for _ in 0..4 {
        sip_round(&mut v);
    }
    v[0] ^ v[1] ^ v[2] ^ v[3]
}

fn sip_round(v: &mut [u64; 4]) {
    v[0] = v[0].wrapping_add(v[1]);
    v[2] = v[2].wrapping_add(v[3]);
    v[1] = v[1].rotate_left(13) ^ v[0];
    v[3] = v[3].rotate_left(16) ^ v[2];
    v[0] = v[0].rotate_left(32);

    v[2] = v[2].wrapping_add(v[1]);
    v[0] = v[0].wrapping_add(v[3]);
    v[1] = v[1].rotate_left(17) ^ v[2];
    v[3] = v[3].rotate_left(21) ^ v[0];
    v[2] = v[2].rotate_left(32);
}
