//! Datagram endpoints.
//!
//! A datagram socket is bound to a local port and sends one datagram at a time: the payload is
//! staged in the transmit buffer of the socket until the next hop was resolved and then sent in
//! a single frame.
use crate::wire::{udp_packet, Ipv4Address, UdpChecksum, UdpRepr};
use super::socket::{Socket, SocketHandle, SocketKind, SocketTable};
use super::{Error, Result};

/// Bind a datagram socket to a local port.
///
/// Rebinding an already bound socket is allowed. Fails with `Illegal` if the socket is not a
/// datagram socket, the port is zero or another socket uses it.
pub fn bind(sockets: &mut SocketTable, handle: SocketHandle, port: u16) -> Result<()> {
    if port == 0 {
        return Err(Error::Illegal);
    }

    match sockets.find_by_local_port(port) {
        Some(other) if other != handle => return Err(Error::Illegal),
        _ => (),
    }

    let socket = sockets.get_mut(handle).ok_or(Error::Illegal)?;
    if socket.kind != SocketKind::Datagram {
        return Err(Error::Illegal);
    }

    socket.local_port = port;
    Ok(())
}

/// Find the datagram socket bound to `port`.
pub fn find(sockets: &SocketTable, port: u16) -> Option<SocketHandle> {
    sockets.iter()
        .find(|(_, socket)| socket.kind == SocketKind::Datagram && socket.local_port == port)
        .map(|(handle, _)| handle)
}

/// Stage a datagram for sending.
///
/// Only one datagram can be in flight per socket, a second one fails with `Exhausted` until the
/// first was sent or dropped.
pub fn stage(socket: &mut Socket, dst_addr: Ipv4Address, dst_port: u16, payload: &[u8]) -> Result<()> {
    if socket.kind != SocketKind::Datagram || socket.local_port == 0 || dst_port == 0 {
        return Err(Error::Illegal);
    }

    if !socket.tx.is_empty() {
        return Err(Error::Exhausted);
    }

    if payload.len() > socket.tx.capacity() {
        return Err(Error::BadSize);
    }

    socket.remote_ip = dst_addr;
    socket.remote_port = dst_port;
    socket.tx.extend_from_slice(payload).map_err(|_| Error::BadSize)
}

/// The header of the staged datagram.
pub fn repr(socket: &Socket) -> UdpRepr {
    UdpRepr {
        src_port: socket.local_port,
        dst_port: socket.remote_port,
        payload_len: socket.tx.len(),
    }
}

/// Write the staged datagram into an IP payload of `repr(socket).buffer_len()` bytes.
pub fn emit(socket: &Socket, payload: &mut [u8], src_addr: Ipv4Address) {
    let checksum = UdpChecksum::for_pseudo_header(src_addr, socket.remote_ip);
    repr(socket).emit(udp_packet::new_unchecked_mut(payload), &socket.tx, checksum);
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: Ipv4Address = Ipv4Address::new(192, 168, 1, 1);

    #[test]
    fn bind_rejects_conflicts() {
        let mut sockets = SocketTable::new(1);
        let stream = sockets.allocate(SocketKind::Stream).unwrap();
        let first = sockets.allocate(SocketKind::Datagram).unwrap();
        let second = sockets.allocate(SocketKind::Datagram).unwrap();

        assert_eq!(bind(&mut sockets, stream, 68), Err(Error::Illegal));
        assert_eq!(bind(&mut sockets, first, 0), Err(Error::Illegal));
        assert_eq!(bind(&mut sockets, first, 68), Ok(()));
        assert_eq!(bind(&mut sockets, first, 68), Ok(()));
        assert_eq!(bind(&mut sockets, second, 68), Err(Error::Illegal));

        let stream_port = sockets.get(stream).unwrap().local_port();
        assert_eq!(bind(&mut sockets, second, stream_port), Err(Error::Illegal));

        assert_eq!(find(&sockets, 68), Some(first));
        assert_eq!(find(&sockets, stream_port), None);
    }

    #[test]
    fn one_datagram_in_flight() {
        let mut sockets = SocketTable::new(1);
        let handle = sockets.allocate(SocketKind::Datagram).unwrap();
        let socket = sockets.get_mut(handle).unwrap();
        assert_eq!(stage(socket, PEER, 67, b"x"), Err(Error::Illegal));

        socket.local_port = 68;
        assert_eq!(stage(socket, PEER, 67, &[0; 257]), Err(Error::BadSize));
        assert_eq!(stage(socket, PEER, 67, b"discover"), Ok(()));
        assert_eq!(stage(socket, PEER, 67, b"again"), Err(Error::Exhausted));

        assert_eq!(repr(socket), UdpRepr { src_port: 68, dst_port: 67, payload_len: 8 });
    }

    #[test]
    fn emitted_datagram_verifies() {
        let mut sockets = SocketTable::new(1);
        let handle = sockets.allocate(SocketKind::Datagram).unwrap();
        let socket = sockets.get_mut(handle).unwrap();
        socket.local_port = 68;
        stage(socket, PEER, 67, b"hello").unwrap();

        let src = Ipv4Address::new(192, 168, 1, 118);
        let mut buffer = vec![0; repr(socket).buffer_len()];
        emit(socket, &mut buffer, src);

        let packet = udp_packet::new_checked(&buffer).unwrap();
        let parsed = UdpRepr::parse(packet, UdpChecksum::for_pseudo_header(src, PEER)).unwrap();
        assert_eq!(parsed.dst_port, 67);
        assert_eq!(packet.payload_slice(), b"hello");
    }
}
