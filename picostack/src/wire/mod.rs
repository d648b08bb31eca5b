/*! Packet layouts of the protocols the stack speaks.

Every protocol comes in two forms. The lowercase types, such as [`ethernet_frame`] or
[`tcp_packet`], are views over a byte slice with getters and setters for single fields. The
`Repr` types, such as [`ArpRepr`] or [`Ipv4Repr`], hold the decoded header as plain values.

[`ethernet_frame`]: struct.ethernet_frame.html
[`tcp_packet`]: struct.tcp_packet.html
[`ArpRepr`]: struct.ArpRepr.html
[`Ipv4Repr`]: struct.Ipv4Repr.html

Received bytes go through `new_checked` first. Once it succeeded, no getter of that view panics.
`Repr::parse` runs the same check on its own and additionally rejects contradictory or
unsupported headers.

For sending, a buffer of exactly `Repr::buffer_len()` octets (plus the payload, where the header
length is all `buffer_len` covers) is viewed with `new_unchecked_mut` and filled by `Repr::emit`.
Checking such a buffer first would inspect stale bytes of an earlier packet.

```rust
use picostack::wire::*;
let repr = Ipv4Repr {
    src_addr: Ipv4Address::new(10, 0, 0, 1),
    dst_addr: Ipv4Address::new(10, 0, 0, 2),
    protocol: IpProtocol::Tcp,
    payload_len: 10,
    hop_limit: 64,
    ident: 0,
};
let mut buffer = vec![0; repr.buffer_len() + repr.payload_len];
repr.emit(ipv4_packet::new_unchecked_mut(&mut buffer), Checksum::Manual);

let packet = ipv4_packet::new_checked(&buffer).expect("length fields match the buffer");
assert_eq!(Ipv4Repr::parse(packet, Checksum::Manual), Ok(repr));
```
*/
// Field accessors are self-explanatory, their semantics follow the respective RFC.
#![allow(missing_docs)]

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod error;
pub mod ethernet;
pub mod arp;
pub mod ip;
pub mod ipv4;
pub mod icmpv4;
pub mod udp;
pub mod tcp;

/// Describes how to handle checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// Checksum must be computed or checked manually.
    Manual,

    /// The checksum field is filled or checked by the NIC.
    Ignored,
}

impl Checksum {
    /// Whether the checksum must be handled in software.
    pub fn manual(self) -> bool {
        self == Checksum::Manual
    }
}

pub use self::error::{
    Error,
    Result};

pub use self::ethernet::{
    ethernet as ethernet_frame,
    EtherType as EthernetProtocol,
    Address as EthernetAddress,
    Repr as EthernetRepr};

pub use self::arp::{
    arp as arp_packet,
    Hardware as ArpHardware,
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ip::{
    Protocol as IpProtocol,
    ip_equal,
    ip_in_subnet};

pub use self::ipv4::{
    ipv4 as ipv4_packet,
    Address as Ipv4Address,
    Repr as Ipv4Repr};

pub use self::icmpv4::{
    icmpv4 as icmpv4_packet,
    Repr as Icmpv4Repr};

pub use self::udp::{
    udp as udp_packet,
    Checksum as UdpChecksum,
    Repr as UdpRepr};

pub use self::tcp::{
    tcp as tcp_packet,
    Checksum as TcpChecksum,
    Flags as TcpFlags,
    SeqNumber as TcpSeqNumber,
    TcpOption,
    Repr as TcpRepr};
