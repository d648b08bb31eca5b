use std::string::{String, ToString};
use std::vec::Vec;

use super::*;
use crate::nic::External;
use crate::wire::TcpSeqNumber;

const MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x01]);
const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x02]);
const ADDRESS: Ipv4Address = Ipv4Address::new(192, 168, 1, 118);
const NETMASK: Ipv4Address = Ipv4Address::new(255, 255, 255, 0);
const GATEWAY: Ipv4Address = Ipv4Address::new(192, 168, 1, 1);
const PEER: Ipv4Address = Ipv4Address::new(192, 168, 1, 16);
const REMOTE_ISN: TcpSeqNumber = TcpSeqNumber(0x0bad_cafe);

#[derive(Default)]
struct Recorder {
    errors: Vec<(SocketHandle, ErrorKind, String)>,
    resolved: Vec<(Token, core::result::Result<EthernetAddress, ()>)>,
    received: Vec<(SocketHandle, Vec<u8>)>,
    datagrams: Vec<(SocketHandle, Ipv4Address, u16, Vec<u8>)>,
    echo_replies: Vec<EchoReply>,
    echo_failures: Vec<EchoError>,
    timers: Vec<Token>,
    release_on_error: bool,
}

impl Handler for Recorder {
    fn socket_error(
        &mut self,
        sockets: &mut SocketTable,
        socket: SocketHandle,
        _: Token,
        error: &SocketError,
    ) {
        self.errors.push((socket, error.kind, error.message.as_str().to_string()));
        if self.release_on_error {
            assert!(sockets.release(socket));
        }
    }

    fn resolved(&mut self, token: Token, result: core::result::Result<EthernetAddress, ()>) {
        self.resolved.push((token, result));
    }

    fn received(&mut self, socket: SocketHandle, data: &[u8]) {
        self.received.push((socket, data.to_vec()));
    }

    fn datagram(&mut self, socket: SocketHandle, from: Ipv4Address, port: u16, data: &[u8]) {
        self.datagrams.push((socket, from, port, data.to_vec()));
    }

    fn echo_reply(&mut self, reply: &EchoReply) {
        self.echo_replies.push(*reply);
    }

    fn echo_failed(&mut self, error: EchoError) {
        self.echo_failures.push(error);
    }

    fn timer(&mut self, token: Token) {
        self.timers.push(token);
    }
}

#[derive(Debug)]
enum Sent {
    Arp(ArpRepr),
    Tcp(Ipv4Repr, TcpRepr, Vec<u8>),
    Udp(Ipv4Repr, UdpRepr, Vec<u8>),
    Icmp(Ipv4Repr, Icmpv4Repr, Vec<u8>),
}

fn stack() -> Stack<External> {
    Stack::new(External::new(MAC), Config::new(ADDRESS, NETMASK, GATEWAY))
}

fn frame<F: FnOnce(&mut [u8])>(dst_addr: EthernetAddress, ethertype: EthernetProtocol, len: usize, f: F)
    -> Vec<u8>
{
    let mut buffer = vec![0; ethernet_frame::buffer_len(len)];
    let frame = ethernet_frame::new_unchecked_mut(&mut buffer);
    EthernetRepr { src_addr: PEER_MAC, dst_addr, ethertype }.emit(frame);
    f(frame.payload_mut_slice());
    buffer
}

fn arp(operation: ArpOperation, target: Ipv4Address) -> Vec<u8> {
    let repr = ArpRepr {
        operation,
        source_hardware_addr: PEER_MAC,
        source_protocol_addr: PEER,
        target_hardware_addr: if operation == ArpOperation::Reply { MAC } else { EthernetAddress([0; 6]) },
        target_protocol_addr: target,
    };
    let dst = if operation == ArpOperation::Reply { MAC } else { EthernetAddress::BROADCAST };
    frame(dst, EthernetProtocol::Arp, repr.buffer_len(), |buffer| {
        repr.emit(arp_packet::new_unchecked_mut(buffer))
    })
}

fn ip<F: FnOnce(&mut [u8])>(dst_addr: Ipv4Address, protocol: IpProtocol, payload_len: usize, f: F)
    -> Vec<u8>
{
    let repr = Ipv4Repr {
        src_addr: PEER,
        dst_addr,
        protocol,
        payload_len,
        hop_limit: 64,
        ident: 1,
    };
    frame(MAC, EthernetProtocol::Ipv4, repr.buffer_len() + payload_len, |buffer| {
        let packet = ipv4_packet::new_unchecked_mut(buffer);
        repr.emit(packet, Checksum::Manual);
        f(packet.payload_mut_slice())
    })
}

fn segment(flags: TcpFlags, seq_number: TcpSeqNumber, ack_number: Option<TcpSeqNumber>, dst_port: u16, payload: &[u8])
    -> Vec<u8>
{
    let repr = TcpRepr {
        src_port: 80,
        dst_port,
        flags,
        seq_number,
        ack_number,
        window_len: 4096,
        max_seg_size: None,
        sack_permitted: false,
        payload_len: payload.len(),
    };
    ip(ADDRESS, IpProtocol::Tcp, repr.buffer_len(), |buffer| {
        let checksum = TcpChecksum::Manual { src_addr: PEER, dst_addr: ADDRESS };
        repr.emit(tcp_packet::new_unchecked_mut(buffer), payload, checksum)
    })
}

fn datagram(dst_addr: Ipv4Address, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let repr = UdpRepr { src_port: 67, dst_port, payload_len: payload.len() };
    ip(dst_addr, IpProtocol::Udp, repr.buffer_len(), |buffer| {
        let checksum = UdpChecksum::for_pseudo_header(PEER, dst_addr);
        repr.emit(udp_packet::new_unchecked_mut(buffer), payload, checksum)
    })
}

fn echo(repr: Icmpv4Repr, payload: &[u8]) -> Vec<u8> {
    ip(ADDRESS, IpProtocol::Icmp, repr.buffer_len(), |buffer| {
        repr.emit(icmpv4_packet::new_unchecked_mut(buffer), payload, Checksum::Manual)
    })
}

fn parse(bytes: &[u8]) -> (EthernetRepr, Sent) {
    let frame = ethernet_frame::new_checked(bytes).unwrap();
    let eth = EthernetRepr::parse(frame).unwrap();
    assert_eq!(eth.src_addr, MAC);

    let sent = match eth.ethertype {
        EthernetProtocol::Arp => {
            let packet = arp_packet::new_checked(frame.payload_slice()).unwrap();
            Sent::Arp(ArpRepr::parse(packet).unwrap())
        },
        EthernetProtocol::Ipv4 => {
            let packet = ipv4_packet::new_checked(frame.payload_slice()).unwrap();
            let ip = Ipv4Repr::parse(packet, Checksum::Manual).unwrap();
            assert_eq!(ip.src_addr, ADDRESS);
            let payload = packet.payload_slice();
            match ip.protocol {
                IpProtocol::Tcp => {
                    let packet = tcp_packet::new_checked(payload).unwrap();
                    let checksum = TcpChecksum::Manual { src_addr: ip.src_addr, dst_addr: ip.dst_addr };
                    let repr = TcpRepr::parse(packet, checksum).unwrap();
                    Sent::Tcp(ip, repr, packet.payload_slice().to_vec())
                },
                IpProtocol::Udp => {
                    let packet = udp_packet::new_checked(payload).unwrap();
                    let checksum = UdpChecksum::for_pseudo_header(ip.src_addr, ip.dst_addr);
                    let repr = UdpRepr::parse(packet, checksum).unwrap();
                    Sent::Udp(ip, repr, packet.payload_slice().to_vec())
                },
                IpProtocol::Icmp => {
                    let packet = icmpv4_packet::new_checked(payload).unwrap();
                    let repr = Icmpv4Repr::parse(packet, Checksum::Manual).unwrap();
                    Sent::Icmp(ip, repr, packet.payload_slice().to_vec())
                },
                other => panic!("unexpected protocol {}", other),
            }
        },
        other => panic!("unexpected ethertype {}", other),
    };

    (eth, sent)
}

fn sent(stack: &mut Stack<External>) -> Vec<(EthernetRepr, Sent)> {
    stack.device_mut().take_tx().iter().map(|bytes| parse(bytes)).collect()
}

fn segments(stack: &mut Stack<External>) -> Vec<(Ipv4Repr, TcpRepr, Vec<u8>)> {
    sent(stack).into_iter()
        .map(|(eth, sent)| match sent {
            Sent::Tcp(ip, repr, payload) => {
                assert_eq!(eth.dst_addr, PEER_MAC);
                (ip, repr, payload)
            },
            other => panic!("expected a segment, sent {:?}", other),
        })
        .collect()
}

fn receive(stack: &mut Stack<External>, frame: Vec<u8>, handler: &mut Recorder) {
    stack.device_mut().push_rx(frame);
    assert_eq!(stack.poll(handler), Ok(true));
}

/// Learn the peer from an unsolicited reply.
fn learn_peer(stack: &mut Stack<External>) {
    stack.device_mut().push_rx(arp(ArpOperation::Reply, ADDRESS));
    assert_eq!(stack.poll(&mut ()), Ok(true));
    assert_eq!(stack.resolver().lookup(PEER), Some(PEER_MAC));
}

/// Connect to the peer, returning the socket and its initial sequence number.
fn establish(stack: &mut Stack<External>, handler: &mut Recorder) -> (SocketHandle, TcpSeqNumber) {
    learn_peer(stack);
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.sockets_mut().set_error_token(handle, Some(Token(1)));
    stack.connect(handle, PEER, 80).unwrap();
    assert_eq!(stack.poll(handler), Ok(false));

    let syn = segments(stack);
    assert_eq!(syn.len(), 1);
    let isn = syn[0].1.seq_number;
    let port = stack.sockets().get(handle).unwrap().local_port();

    receive(stack, segment(TcpFlags::SYN | TcpFlags::ACK, REMOTE_ISN, Some(isn + 1), port, &[]), handler);
    assert_eq!(stack.poll(handler), Ok(false));
    assert_eq!(segments(stack).len(), 1);
    (handle, isn)
}

fn local_port(stack: &Stack<External>, handle: SocketHandle) -> u16 {
    stack.sockets().get(handle).unwrap().local_port()
}

fn state(stack: &Stack<External>, handle: SocketHandle) -> State {
    stack.sockets().get(handle).unwrap().state()
}

#[test]
fn arp_request_is_answered() {
    let mut stack = stack();
    receive(&mut stack, arp(ArpOperation::Request, ADDRESS), &mut Recorder::default());

    let sent = sent(&mut stack);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        (eth, Sent::Arp(reply)) => {
            assert_eq!(eth.dst_addr, PEER_MAC);
            assert_eq!(reply.operation, ArpOperation::Reply);
            assert_eq!(reply.source_hardware_addr, MAC);
            assert_eq!(reply.source_protocol_addr, ADDRESS);
            assert_eq!(reply.target_hardware_addr, PEER_MAC);
            assert_eq!(reply.target_protocol_addr, PEER);
        },
        other => panic!("expected an arp reply, sent {:?}", other),
    }

    receive(&mut stack, arp(ArpOperation::Request, GATEWAY), &mut Recorder::default());
    assert!(stack.device().tx().is_empty());
}

#[test]
fn handshake() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.connect(handle, PEER, 80).unwrap();
    assert_eq!(state(&stack, handle), State::Closed);
    assert_eq!(stack.connect(handle, PEER, 80), Err(Error::Illegal));

    // The next hop is resolved first.
    match &sent(&mut stack)[..] {
        [(eth, Sent::Arp(request))] => {
            assert_eq!(eth.dst_addr, EthernetAddress::BROADCAST);
            assert_eq!(request.target_protocol_addr, PEER);
        },
        other => panic!("expected an arp request, sent {:?}", other),
    }

    receive(&mut stack, arp(ArpOperation::Reply, ADDRESS), &mut handler);
    assert_eq!(state(&stack, handle), State::SynSent);

    assert_eq!(stack.poll(&mut handler), Ok(false));
    let syn = segments(&mut stack);
    assert_eq!(syn.len(), 1);
    let (ip, syn, _) = &syn[0];
    assert_eq!(ip.dst_addr, PEER);
    assert_eq!(ip.ident, CONTROL_IDENT);
    assert_eq!(ip.hop_limit, 128);
    assert_eq!(ip.payload_len, 28);
    assert_eq!(syn.flags, TcpFlags::SYN);
    assert_eq!(syn.dst_port, 80);
    assert_eq!(syn.src_port, local_port(&stack, handle));
    assert_eq!(syn.max_seg_size, Some(1460));
    assert!(syn.sack_permitted);
    let isn = syn.seq_number;

    let port = local_port(&stack, handle);
    receive(&mut stack, segment(TcpFlags::SYN | TcpFlags::ACK, REMOTE_ISN, Some(isn + 1), port, &[]), &mut handler);
    assert_eq!(state(&stack, handle), State::Established);

    assert_eq!(stack.poll(&mut handler), Ok(false));
    let ack = segments(&mut stack);
    assert_eq!(ack.len(), 1);
    assert_eq!(ack[0].1.flags, TcpFlags::ACK);
    assert_eq!(ack[0].1.seq_number, isn + 1);
    assert_eq!(ack[0].1.ack_number, Some(REMOTE_ISN + 1));

    let socket = stack.sockets().get(handle).unwrap();
    assert_eq!(socket.seq_number(), isn + 1);
    assert_eq!(socket.ack_number(), REMOTE_ISN + 1);
    assert_eq!(socket.to_string(),
        format!("TCP   192.168.1.118:{} -> 192.168.1.16:80   ESTABLISHED", port));

    // Address resolution and connection timers are gone.
    assert_eq!(stack.inner.timers.active(), 0);
    assert!(handler.errors.is_empty());
}

#[test]
fn syn_retries_are_bounded() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    learn_peer(&mut stack);

    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.sockets_mut().set_error_token(handle, Some(Token(3)));
    stack.connect(handle, PEER, 80).unwrap();
    assert_eq!(state(&stack, handle), State::SynSent);

    let mut syns = Vec::new();
    for _ in 0..12 {
        stack.poll(&mut handler).unwrap();
        syns.extend(segments(&mut stack).into_iter().map(|(_, repr, _)| repr));
        stack.tick(&mut handler);
    }

    assert_eq!(syns.len(), usize::from(stack.config().syn_max_attempts));
    assert!(syns.iter().all(|syn| syn.flags == TcpFlags::SYN));
    assert!(syns.iter().all(|syn| syn.seq_number == syns[0].seq_number));

    assert_eq!(state(&stack, handle), State::Closed);
    assert_eq!(handler.errors.len(), 1);
    let (socket, kind, message) = &handler.errors[0];
    assert_eq!(*socket, handle);
    assert_eq!(*kind, ErrorKind::SynAckTimeout);
    assert_eq!(message, "No response from 192.168.1.16 (timed out)");
}

#[test]
fn unresolved_peer_fails_connect() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.sockets_mut().set_error_token(handle, Some(Token(1)));
    stack.connect(handle, PEER, 80).unwrap();

    for _ in 0..5 {
        stack.tick(&mut handler);
    }

    let requests = sent(&mut stack).into_iter()
        .filter(|(_, sent)| match sent {
            Sent::Arp(repr) => repr.target_protocol_addr == PEER,
            _ => false,
        })
        .count();
    assert_eq!(requests, usize::from(stack.config().arp_max_attempts));
    assert!(stack.resolver().pending().is_empty());
    assert_eq!(state(&stack, handle), State::Closed);
    assert_eq!(handler.errors.len(), 1);
    assert_eq!(handler.errors[0].1, ErrorKind::ArpTimeout);
    assert_eq!(handler.errors[0].2, "Could not reach 192.168.1.16 (timed out)");

    // Errors without a token are only logged.
    let silent = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.connect(silent, PEER, 80).unwrap();
    for _ in 0..5 {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.errors.len(), 1);
}

#[test]
fn remote_peers_resolve_the_gateway() {
    let mut stack = stack();
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.connect(handle, Ipv4Address::new(93, 184, 216, 34), 80).unwrap();
    match &sent(&mut stack)[..] {
        [(_, Sent::Arp(request))] => assert_eq!(request.target_protocol_addr, GATEWAY),
        other => panic!("expected an arp request, sent {:?}", other),
    }
}

#[test]
fn data_exchange() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let (handle, isn) = establish(&mut stack, &mut handler);
    let port = local_port(&stack, handle);

    stack.send(handle, b"hello").unwrap();
    stack.poll(&mut handler).unwrap();
    let data = segments(&mut stack);
    assert_eq!(data.len(), 1);
    let (ip, repr, payload) = &data[0];
    assert_eq!(ip.ident, 0);
    assert_eq!(repr.flags, TcpFlags::PSH | TcpFlags::ACK);
    assert_eq!(repr.seq_number, isn + 1);
    assert_eq!(payload, b"hello");
    assert_eq!(stack.sockets().get(handle).unwrap().seq_number(), isn + 6);

    let reply = segment(TcpFlags::PSH | TcpFlags::ACK, REMOTE_ISN + 1, Some(isn + 6), port, b"world");
    receive(&mut stack, reply, &mut handler);
    assert_eq!(handler.received, [(handle, b"world".to_vec())]);

    stack.poll(&mut handler).unwrap();
    let ack = segments(&mut stack);
    assert_eq!(ack[0].1.flags, TcpFlags::ACK);
    assert_eq!(ack[0].1.ack_number, Some(REMOTE_ISN + 6));

    assert_eq!(stack.send(handle, &[0; 257]), Err(Error::BadSize));
}

#[test]
fn send_requires_connection() {
    let mut stack = stack();
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    assert_eq!(stack.send(handle, b"early"), Err(Error::Illegal));
    let datagram = stack.sockets_mut().allocate(SocketKind::Datagram).unwrap();
    assert_eq!(stack.connect(datagram, PEER, 80), Err(Error::Illegal));
    assert!(stack.release(handle));
    assert_eq!(stack.send(handle, b"late"), Err(Error::Illegal));
}

#[test]
fn graceful_close() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let (handle, isn) = establish(&mut stack, &mut handler);
    let port = local_port(&stack, handle);

    stack.close(handle).unwrap();
    assert_eq!(state(&stack, handle), State::FinWait1);
    stack.poll(&mut handler).unwrap();
    let fin = segments(&mut stack);
    assert_eq!(fin[0].1.flags, TcpFlags::FIN | TcpFlags::ACK);
    assert_eq!(fin[0].1.seq_number, isn + 1);

    receive(&mut stack, segment(TcpFlags::ACK, REMOTE_ISN + 1, Some(isn + 2), port, &[]), &mut handler);
    assert_eq!(state(&stack, handle), State::FinWait2);

    receive(&mut stack, segment(TcpFlags::FIN | TcpFlags::ACK, REMOTE_ISN + 1, Some(isn + 2), port, &[]), &mut handler);
    assert_eq!(state(&stack, handle), State::TimeWait);
    stack.poll(&mut handler).unwrap();
    let ack = segments(&mut stack);
    assert_eq!(ack[0].1.flags, TcpFlags::ACK);
    assert_eq!(ack[0].1.seq_number, isn + 2);
    assert_eq!(ack[0].1.ack_number, Some(REMOTE_ISN + 2));

    let linger = stack.config().linger;
    for _ in 1..linger {
        stack.tick(&mut handler);
    }
    assert_eq!(state(&stack, handle), State::TimeWait);
    stack.tick(&mut handler);

    assert!(stack.sockets().get(handle).is_none());
    assert!(stack.sockets().is_empty());
    assert!(!stack.release(handle));
    assert!(handler.errors.is_empty());
}

#[test]
fn passive_close() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let (handle, isn) = establish(&mut stack, &mut handler);
    let port = local_port(&stack, handle);

    receive(&mut stack, segment(TcpFlags::FIN | TcpFlags::ACK, REMOTE_ISN + 1, Some(isn + 1), port, &[]), &mut handler);
    stack.poll(&mut handler).unwrap();
    assert_eq!(segments(&mut stack)[0].1.ack_number, Some(REMOTE_ISN + 2));
    assert_eq!(state(&stack, handle), State::CloseWait);

    stack.close(handle).unwrap();
    assert_eq!(state(&stack, handle), State::LastAck);
    stack.poll(&mut handler).unwrap();
    assert_eq!(segments(&mut stack)[0].1.flags, TcpFlags::FIN | TcpFlags::ACK);

    receive(&mut stack, segment(TcpFlags::ACK, REMOTE_ISN + 2, Some(isn + 2), port, &[]), &mut handler);
    assert!(stack.sockets().get(handle).is_none());
}

#[test]
fn reset_is_reported() {
    let mut stack = stack();
    let mut handler = Recorder { release_on_error: true, ..Recorder::default() };
    let (handle, _) = establish(&mut stack, &mut handler);
    let port = local_port(&stack, handle);

    receive(&mut stack, segment(TcpFlags::RST, REMOTE_ISN + 1, None, port, &[]), &mut handler);
    assert_eq!(handler.errors.len(), 1);
    assert_eq!(handler.errors[0].1, ErrorKind::ConnectionReset);
    assert_eq!(handler.errors[0].2, "Connection was reset by remote host (192.168.1.16:80)");
    assert!(stack.sockets().is_empty());
    assert!(stack.device().tx().is_empty());
}

#[test]
fn reconnect_after_reset_sends_only_new_data() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let (handle, _) = establish(&mut stack, &mut handler);
    let port = local_port(&stack, handle);

    // Staged on the first connection, never sent.
    stack.device_mut().set_link_up(false);
    stack.send(handle, b"secret").unwrap();
    receive(&mut stack, segment(TcpFlags::RST, REMOTE_ISN + 1, None, port, &[]), &mut handler);
    assert_eq!(handler.errors.len(), 1);
    assert_eq!(handler.errors[0].1, ErrorKind::ConnectionReset);
    assert_eq!(state(&stack, handle), State::Closed);
    stack.device_mut().set_link_up(true);
    assert!(stack.device().tx().is_empty());

    // The handler kept the socket, reuse it.
    stack.connect(handle, PEER, 80).unwrap();
    assert_eq!(stack.poll(&mut handler), Ok(false));
    let syn = segments(&mut stack);
    assert_eq!(syn.len(), 1);
    assert_eq!(syn[0].1.flags, TcpFlags::SYN);
    assert!(syn[0].2.is_empty());
    let isn = syn[0].1.seq_number;

    let remote_isn = TcpSeqNumber(0x0f00_0000);
    receive(&mut stack, segment(TcpFlags::SYN | TcpFlags::ACK, remote_isn, Some(isn + 1), port, &[]), &mut handler);
    assert_eq!(state(&stack, handle), State::Established);
    stack.poll(&mut handler).unwrap();
    assert_eq!(segments(&mut stack).len(), 1);

    stack.send(handle, b"new").unwrap();
    stack.poll(&mut handler).unwrap();
    let data = segments(&mut stack);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].1.seq_number, isn + 1);
    assert_eq!(data[0].2, b"new");
    assert_eq!(stack.sockets().get(handle).unwrap().seq_number(), isn + 4);
}

#[test]
fn stray_segments_are_reset() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    learn_peer(&mut stack);

    receive(&mut stack, segment(TcpFlags::SYN, REMOTE_ISN, None, 8080, &[]), &mut handler);
    let reset = segments(&mut stack);
    assert_eq!(reset.len(), 1);
    let (ip, repr, _) = &reset[0];
    assert_eq!(ip.dst_addr, PEER);
    assert_eq!(repr.flags, TcpFlags::RST | TcpFlags::ACK);
    assert_eq!(repr.src_port, 8080);
    assert_eq!(repr.dst_port, 80);
    assert_eq!(repr.seq_number, TcpSeqNumber(0));
    assert_eq!(repr.ack_number, Some(REMOTE_ISN + 1));

    // A closed socket does not accept segments either.
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    let port = local_port(&stack, handle);
    receive(&mut stack, segment(TcpFlags::ACK, REMOTE_ISN, Some(TcpSeqNumber(7)), port, &[]), &mut handler);
    let reset = segments(&mut stack);
    assert_eq!(reset[0].1.seq_number, TcpSeqNumber(7));

    receive(&mut stack, segment(TcpFlags::RST, REMOTE_ISN, None, 8080, &[]), &mut handler);
    assert!(stack.device().tx().is_empty());
}

#[test]
fn corrupted_frames_are_dropped() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    learn_peer(&mut stack);

    let mut frame = segment(TcpFlags::SYN, REMOTE_ISN, None, 8080, &[]);
    let last = frame.len() - 1;
    frame[last] ^= 0xff;
    receive(&mut stack, frame, &mut handler);

    let other = Ipv4Address::new(192, 168, 1, 200);
    receive(&mut stack, datagram(other, 68, b"not ours"), &mut handler);
    receive(&mut stack, frame_for_other_host(), &mut handler);

    assert!(stack.device().tx().is_empty());
    assert!(handler.datagrams.is_empty());
}

fn frame_for_other_host() -> Vec<u8> {
    let mut frame = arp(ArpOperation::Request, ADDRESS);
    let frame_ref = ethernet_frame::new_unchecked_mut(&mut frame);
    frame_ref.set_dst_addr(EthernetAddress([0x02, 0, 0, 0, 0, 0x09]));
    frame
}

#[test]
fn link_down_keeps_segments_staged() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let (handle, isn) = establish(&mut stack, &mut handler);

    stack.send(handle, b"later").unwrap();
    stack.device_mut().set_link_up(false);
    stack.poll(&mut handler).unwrap();
    assert!(stack.device().tx().is_empty());
    assert_eq!(stack.sockets().get(handle).unwrap().pending().count(), 1);

    stack.device_mut().set_link_up(true);
    stack.poll(&mut handler).unwrap();
    let data = segments(&mut stack);
    assert_eq!(data[0].1.seq_number, isn + 1);
    assert_eq!(data[0].2, b"later");
}

#[test]
fn datagrams() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    learn_peer(&mut stack);

    let handle = stack.sockets_mut().allocate(SocketKind::Datagram).unwrap();
    assert_eq!(stack.send_to(handle, PEER, 67, b"unbound"), Err(Error::Illegal));
    stack.bind(handle, 68).unwrap();
    stack.send_to(handle, PEER, 67, b"request").unwrap();

    match &sent(&mut stack)[..] {
        [(eth, Sent::Udp(ip, repr, payload))] => {
            assert_eq!(eth.dst_addr, PEER_MAC);
            assert_eq!(ip.dst_addr, PEER);
            assert_eq!(repr.src_port, 68);
            assert_eq!(repr.dst_port, 67);
            assert_eq!(payload, b"request");
        },
        other => panic!("expected a datagram, sent {:?}", other),
    }

    receive(&mut stack, datagram(ADDRESS, 68, b"answer"), &mut handler);
    receive(&mut stack, datagram(Ipv4Address::BROADCAST, 68, b"offer"), &mut handler);
    receive(&mut stack, datagram(ADDRESS, 69, b"nobody"), &mut handler);
    assert_eq!(handler.datagrams, [
        (handle, PEER, 67, b"answer".to_vec()),
        (handle, PEER, 67, b"offer".to_vec()),
    ]);

    let row = stack.sockets().get(handle).unwrap().to_string();
    assert_eq!(row, "UDP   0.0.0.0:68 -> 192.168.1.16:67   ");
}

#[test]
fn broadcast_datagram_needs_no_resolution() {
    let mut stack = stack();
    let handle = stack.sockets_mut().allocate(SocketKind::Datagram).unwrap();
    stack.bind(handle, 68).unwrap();
    stack.send_to(handle, Ipv4Address::BROADCAST, 67, b"discover").unwrap();
    match &sent(&mut stack)[..] {
        [(eth, Sent::Udp(ip, _, _))] => {
            assert_eq!(eth.dst_addr, EthernetAddress::BROADCAST);
            assert_eq!(ip.dst_addr, Ipv4Address::BROADCAST);
        },
        other => panic!("expected a datagram, sent {:?}", other),
    }
}

#[test]
fn unresolved_datagram_fails() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let handle = stack.sockets_mut().allocate(SocketKind::Datagram).unwrap();
    stack.sockets_mut().set_error_token(handle, Some(Token(5)));
    stack.bind(handle, 5000).unwrap();
    stack.send_to(handle, PEER, 7, b"echo").unwrap();
    assert_eq!(stack.send_to(handle, PEER, 7, b"again"), Err(Error::Exhausted));

    for _ in 0..3 {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.errors.len(), 1);
    assert_eq!(handler.errors[0].1, ErrorKind::ArpTimeout);

    // The failed datagram was dropped.
    stack.send_to(handle, PEER, 7, b"again").unwrap();
}

#[test]
fn ping_round_trip() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    learn_peer(&mut stack);

    stack.ping(PEER).unwrap();
    assert_eq!(stack.ping(PEER), Err(Error::Illegal));
    let request = match &sent(&mut stack)[..] {
        [(_, Sent::Icmp(ip, repr, payload))] => {
            assert_eq!(ip.dst_addr, PEER);
            assert_eq!(&payload[..], &ECHO_PAYLOAD[..]);
            *repr
        },
        other => panic!("expected an echo request, sent {:?}", other),
    };
    assert_eq!(request, Icmpv4Repr::EchoRequest { ident: 0, seq_no: 0, payload: 32 });

    stack.tick(&mut handler);
    receive(&mut stack, echo(request.echo_reply().unwrap(), ECHO_PAYLOAD), &mut handler);
    assert_eq!(handler.echo_replies, [EchoReply { from: PEER, bytes: 32, ticks: 1, ttl: 64 }]);

    for _ in 0..5 {
        stack.tick(&mut handler);
    }
    assert!(handler.echo_failures.is_empty());
    stack.ping(PEER).unwrap();
}

#[test]
fn ping_failures() {
    let mut stack = stack();
    let mut handler = Recorder::default();

    stack.ping(PEER).unwrap();
    for _ in 0..3 {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.echo_failures, [EchoError::Unreachable]);

    learn_peer(&mut stack);
    stack.ping(PEER).unwrap();
    for _ in 0..stack.config().echo_timeout {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.echo_failures, [EchoError::Unreachable, EchoError::TimedOut]);
}

#[test]
fn ping_needs_a_timer() {
    let mut stack = stack();
    learn_peer(&mut stack);
    while stack.start_timer(Token(9), 100, false).is_ok() {}

    assert_eq!(stack.ping(PEER), Err(Error::Exhausted));
    assert!(stack.device().tx().is_empty());
    // Nothing stays outstanding.
    assert_eq!(stack.ping(PEER), Err(Error::Exhausted));
}

#[test]
fn echo_requests_are_answered() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let request = Icmpv4Repr::EchoRequest { ident: 0x4242, seq_no: 3, payload: 5 };
    receive(&mut stack, echo(request, b"probe"), &mut handler);

    match &sent(&mut stack)[..] {
        [(eth, Sent::Icmp(ip, repr, payload))] => {
            assert_eq!(eth.dst_addr, PEER_MAC);
            assert_eq!(ip.dst_addr, PEER);
            assert_eq!(*repr, Icmpv4Repr::EchoReply { ident: 0x4242, seq_no: 3, payload: 5 });
            assert_eq!(payload, b"probe");
        },
        other => panic!("expected an echo reply, sent {:?}", other),
    }
}

#[test]
fn resolution_for_the_program() {
    let mut stack = stack();
    let mut handler = Recorder::default();

    stack.resolve(PEER, Token(1), &mut handler).unwrap();
    stack.resolve(PEER, Token(2), &mut handler).unwrap();
    assert!(handler.resolved.is_empty());
    assert_eq!(sent(&mut stack).len(), 1);

    receive(&mut stack, arp(ArpOperation::Reply, ADDRESS), &mut handler);
    assert_eq!(handler.resolved, [(Token(1), Ok(PEER_MAC)), (Token(2), Ok(PEER_MAC))]);

    stack.resolve(PEER, Token(3), &mut handler).unwrap();
    assert_eq!(handler.resolved[2], (Token(3), Ok(PEER_MAC)));
    assert!(stack.device().tx().is_empty());

    let far = Ipv4Address::new(192, 168, 1, 99);
    stack.resolve(far, Token(4), &mut handler).unwrap();
    for _ in 0..3 {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.resolved[3], (Token(4), Err(())));

    stack.config_mut().gateway = Ipv4Address::UNSPECIFIED;
    assert_eq!(stack.resolve(far, Token(5), &mut handler), Err(Error::Unreachable));
}

#[test]
fn program_timers() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let periodic = stack.start_timer(Token(1), 2, true).unwrap();
    stack.start_timer(Token(2), 3, false).unwrap();

    for _ in 0..6 {
        stack.tick(&mut handler);
    }
    assert_eq!(handler.timers, [Token(1), Token(2), Token(1), Token(1)]);
    assert!(stack.stop_timer(periodic));
    assert_eq!(stack.ticks(), 6);
}

#[test]
fn close_abandons_connection_attempt() {
    let mut stack = stack();
    let mut handler = Recorder::default();
    let handle = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
    stack.sockets_mut().set_error_token(handle, Some(Token(1)));
    stack.connect(handle, PEER, 80).unwrap();
    stack.close(handle).unwrap();
    assert!(!stack.resolver().is_waiting(Completion::Connect(handle)));

    // The resolution still completes, without opening the socket.
    receive(&mut stack, arp(ArpOperation::Reply, ADDRESS), &mut handler);
    assert_eq!(state(&stack, handle), State::Closed);
    stack.poll(&mut handler).unwrap();
    let _ = sent(&mut stack);
    assert!(handler.errors.is_empty());
}
