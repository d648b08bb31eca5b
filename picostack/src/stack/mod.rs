//! The stack driver.
//!
//! A [`Stack`] owns the interface and every table of the protocol layers. It is driven from two
//! entry points that must not run concurrently:
//!
//! * [`Stack::poll`] transmits at most one staged segment per socket and then processes at most
//!   one received frame.
//! * [`Stack::tick`] advances the clock by one tick and dispatches all timers that expired.
//!
//! Everything that completes later than the call causing it is reported to the [`Handler`]
//! passed into these two methods. The handler is called from within the driver and must not call
//! back into the stack; it gets mutable access to the socket table where it has to decide about a
//! socket.
//!
//! [`Stack`]: struct.Stack.html
//! [`Stack::poll`]: struct.Stack.html#method.poll
//! [`Stack::tick`]: struct.Stack.html#method.tick
//! [`Handler`]: trait.Handler.html
use crate::config::{Config, MAX_FRAME_LEN, NUM_TIMERS};
use crate::layer::{arp, icmp, tcp, udp, Error, Result};
use crate::layer::arp::{Lookup, Resolver};
use crate::layer::eth::{Interface, Ipv4Out};
use crate::layer::icmp::{EchoError, EchoReply, Pinger, ECHO_PAYLOAD};
use crate::layer::socket::{ErrorKind, SocketError, SocketHandle, SocketKind, SocketTable};
use crate::layer::tcp::{FourTuple, IsnGenerator, Signal, State};
use crate::nic::Device;
use crate::time::{TimerHandle, Timers};
use crate::wire::{self,
    arp_packet,
    ethernet_frame,
    icmpv4_packet,
    ipv4_packet,
    tcp_packet,
    udp_packet,
    ArpOperation,
    ArpRepr,
    Checksum,
    EthernetAddress,
    EthernetProtocol,
    EthernetRepr,
    Icmpv4Repr,
    IpProtocol,
    Ipv4Address,
    Ipv4Repr,
    TcpChecksum,
    TcpFlags,
    TcpRepr,
    UdpChecksum,
    UdpRepr,
};

#[cfg(test)]
mod tests;

/// IP identification of packets without application data.
const CONTROL_IDENT: u16 = 0x5555;

/// An opaque value chosen by the program to recognize its requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token(pub u32);

/// What a timer of the stack stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// Repeat the request of a pending resolution.
    ArpRetry(Ipv4Address),
    /// The connection request of a socket was not answered.
    SynTimeout(SocketHandle),
    /// A closed connection has lingered long enough.
    Linger(SocketHandle),
    /// The outstanding echo request was not answered.
    EchoTimeout,
    /// A timer of the program.
    User(Token),
}

/// What to do once a hardware address was resolved, or failed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Start the handshake of the socket.
    Connect(SocketHandle),
    /// Send the staged datagram of the socket.
    Datagram(SocketHandle),
    /// Send the outstanding echo request.
    Echo,
    /// Report to the program.
    Notify(Token),
}

/// The timer table of a stack.
pub type StackTimers = Timers<TimerEvent, NUM_TIMERS>;

/// Receives everything that the stack reports asynchronously.
///
/// All methods default to doing nothing.
pub trait Handler {
    /// A transport error occurred on a socket that has an error token.
    ///
    /// The socket is left in the table. It is up to the handler to release it or to reuse it
    /// for another connection attempt.
    fn socket_error(
        &mut self,
        _sockets: &mut SocketTable,
        _socket: SocketHandle,
        _token: Token,
        _error: &SocketError,
    ) { }

    /// A resolution requested with [`Stack::resolve`] finished.
    ///
    /// [`Stack::resolve`]: struct.Stack.html#method.resolve
    fn resolved(&mut self, _token: Token, _result: core::result::Result<EthernetAddress, ()>) { }

    /// A connection received data.
    fn received(&mut self, _socket: SocketHandle, _data: &[u8]) { }

    /// A bound datagram socket received a datagram from `from:port`.
    fn datagram(&mut self, _socket: SocketHandle, _from: Ipv4Address, _port: u16, _data: &[u8]) { }

    /// The outstanding echo request was answered.
    fn echo_reply(&mut self, _reply: &EchoReply) { }

    /// The outstanding echo request failed.
    fn echo_failed(&mut self, _error: EchoError) { }

    /// A timer started with [`Stack::start_timer`] expired.
    ///
    /// [`Stack::start_timer`]: struct.Stack.html#method.start_timer
    fn timer(&mut self, _token: Token) { }
}

/// Ignores all reports.
impl Handler for () { }

/// A complete stack on one interface.
pub struct Stack<D> {
    rx: [u8; MAX_FRAME_LEN],
    inner: Inner<D>,
}

struct Inner<D> {
    iface: Interface<D>,
    resolver: Resolver,
    sockets: SocketTable,
    timers: StackTimers,
    isn: IsnGenerator,
    pinger: Pinger,
}

impl<D: Device> Stack<D> {
    /// Create a stack with empty tables.
    pub fn new(device: D, config: Config) -> Self {
        Stack {
            rx: [0; MAX_FRAME_LEN],
            inner: Inner {
                iface: Interface::new(device, config),
                resolver: Resolver::new(),
                sockets: SocketTable::new(config.seed),
                timers: StackTimers::new(),
                isn: IsnGenerator::new(config.isn_key),
                pinger: Pinger::new(),
            },
        }
    }

    /// Transmit staged segments and process one received frame.
    ///
    /// Returns `Ok(true)` if a frame was received. Frames that fail to parse are dropped and
    /// still count as received. Errors are those of the device.
    pub fn poll<H: Handler + ?Sized>(&mut self, handler: &mut H) -> Result<bool> {
        self.inner.flush();

        let len = match self.inner.iface.receive(&mut self.rx)? {
            Some(len) => len,
            None => return Ok(false),
        };

        if let Err(err) = self.inner.process(&self.rx[..len], handler) {
            net_trace!("dropped frame: {}", err);
        }

        Ok(true)
    }

    /// Advance the clock by one tick and handle all expired timers.
    pub fn tick<H: Handler + ?Sized>(&mut self, handler: &mut H) {
        self.inner.timers.tick();
        while let Some(event) = self.inner.timers.next_due() {
            self.inner.dispatch(event, handler);
        }
    }

    /// Open a connection from a stream socket to `remote_ip:remote_port`.
    ///
    /// The socket must be closed. The handshake starts once the next hop was resolved, which may
    /// happen immediately. A failed resolution is reported as `ArpTimeout` on the socket.
    pub fn connect(&mut self, handle: SocketHandle, remote_ip: Ipv4Address, remote_port: u16)
        -> Result<()>
    {
        let inner = &mut self.inner;
        let completion = Completion::Connect(handle);
        let socket = inner.sockets.get_mut(handle).ok_or(Error::Illegal)?;
        if socket.kind != SocketKind::Stream
            || socket.state != State::Closed
            || remote_port == 0
            || inner.resolver.is_waiting(completion)
        {
            return Err(Error::Illegal);
        }

        socket.remote_ip = remote_ip;
        socket.remote_port = remote_port;
        match inner.resolver.resolve(remote_ip, completion, &mut inner.iface, &mut inner.timers)? {
            Lookup::Cached(mac) => inner.open(handle, mac),
            Lookup::Pending => (),
        }

        Ok(())
    }

    /// Queue data on an open connection.
    ///
    /// The data is appended to the transmit buffer and sent with the next flush of the socket.
    pub fn send(&mut self, handle: SocketHandle, data: &[u8]) -> Result<()> {
        let socket = self.inner.sockets.get_mut(handle).ok_or(Error::Illegal)?;
        match (socket.kind, socket.state) {
            (SocketKind::Stream, State::Established)
            | (SocketKind::Stream, State::CloseWait) => (),
            _ => return Err(Error::Illegal),
        }

        if data.is_empty() {
            return Ok(());
        }

        socket.tx.extend_from_slice(data).map_err(|_| Error::BadSize)?;
        socket.queue(TcpFlags::PSH | TcpFlags::ACK);
        Ok(())
    }

    /// Close a connection.
    ///
    /// An open connection is shut down orderly and its socket released once the peer finished as
    /// well. A connection attempt is abandoned. The socket stays allocated in either case.
    pub fn close(&mut self, handle: SocketHandle) -> Result<()> {
        let inner = &mut self.inner;
        let socket = inner.sockets.get_mut(handle).ok_or(Error::Illegal)?;
        if socket.kind != SocketKind::Stream || !tcp::close(socket) {
            return Err(Error::Illegal);
        }

        if socket.state == State::Closed {
            if let Some(timer) = socket.timer.take() {
                inner.timers.stop(timer);
            }
            inner.resolver.withdraw(Completion::Connect(handle));
        }

        Ok(())
    }

    /// Release a socket immediately, whatever its state.
    ///
    /// Nothing is sent to the peer of an open connection.
    pub fn release(&mut self, handle: SocketHandle) -> bool {
        let inner = &mut self.inner;
        if let Some(timer) = inner.sockets.get_mut(handle).and_then(|socket| socket.timer.take()) {
            inner.timers.stop(timer);
        }

        inner.resolver.withdraw(Completion::Connect(handle));
        inner.resolver.withdraw(Completion::Datagram(handle));
        inner.sockets.release(handle)
    }

    /// Bind a datagram socket to a local port.
    pub fn bind(&mut self, handle: SocketHandle, port: u16) -> Result<()> {
        udp::bind(&mut self.inner.sockets, handle, port)
    }

    /// Send a datagram from a bound socket.
    ///
    /// The datagram is sent once the next hop was resolved, a failed resolution is reported as
    /// `ArpTimeout` on the socket. Datagrams to the broadcast address are sent immediately.
    pub fn send_to(&mut self, handle: SocketHandle, ip: Ipv4Address, port: u16, data: &[u8])
        -> Result<()>
    {
        let inner = &mut self.inner;
        let socket = inner.sockets.get_mut(handle).ok_or(Error::Illegal)?;
        udp::stage(socket, ip, port, data)?;

        if ip.is_broadcast() {
            return inner.send_datagram(handle, EthernetAddress::BROADCAST);
        }

        let completion = Completion::Datagram(handle);
        match inner.resolver.resolve(ip, completion, &mut inner.iface, &mut inner.timers) {
            Ok(Lookup::Cached(mac)) => inner.send_datagram(handle, mac),
            Ok(Lookup::Pending) => Ok(()),
            Err(err) => {
                inner.drop_datagram(handle);
                Err(err)
            },
        }
    }

    /// Send an echo request.
    ///
    /// Only one request can be outstanding, its outcome is reported to the handler.
    pub fn ping(&mut self, ip: Ipv4Address) -> Result<()> {
        let inner = &mut self.inner;
        inner.pinger.start(ip)?;

        match inner.resolver.resolve(ip, Completion::Echo, &mut inner.iface, &mut inner.timers) {
            Ok(Lookup::Cached(mac)) => inner.send_echo(mac),
            Ok(Lookup::Pending) => Ok(()),
            Err(err) => {
                inner.pinger.cancel(&mut inner.timers);
                Err(err)
            },
        }
    }

    /// Resolve the hardware address of the next hop towards `ip`.
    ///
    /// A cached address is reported to the handler before returning.
    pub fn resolve<H: Handler + ?Sized>(&mut self, ip: Ipv4Address, token: Token, handler: &mut H)
        -> Result<()>
    {
        let inner = &mut self.inner;
        let completion = Completion::Notify(token);
        match inner.resolver.resolve(ip, completion, &mut inner.iface, &mut inner.timers)? {
            Lookup::Cached(mac) => handler.resolved(token, Ok(mac)),
            Lookup::Pending => (),
        }

        Ok(())
    }

    /// Start a timer reported to [`Handler::timer`].
    ///
    /// [`Handler::timer`]: trait.Handler.html#method.timer
    pub fn start_timer(&mut self, token: Token, delay: u32, periodic: bool) -> Result<TimerHandle> {
        let timers = &mut self.inner.timers;
        let event = TimerEvent::User(token);
        let handle = if periodic {
            timers.start_periodic(event, delay)
        } else {
            timers.start_oneshot(event, delay)
        };
        handle.ok_or(Error::Exhausted)
    }

    pub fn stop_timer(&mut self, handle: TimerHandle) -> bool {
        self.inner.timers.stop(handle)
    }

    pub fn sockets(&self) -> &SocketTable {
        &self.inner.sockets
    }

    /// Direct access to the socket table.
    ///
    /// Sockets are allocated here. Releasing a socket through the table does not stop its
    /// timers; they expire without effect.
    pub fn sockets_mut(&mut self) -> &mut SocketTable {
        &mut self.inner.sockets
    }

    /// The address cache and outstanding resolutions.
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn config(&self) -> &Config {
        self.inner.iface.config()
    }

    /// Change the configuration.
    ///
    /// The seed and the sequence number key are only read when the stack is created.
    pub fn config_mut(&mut self) -> &mut Config {
        self.inner.iface.config_mut()
    }

    pub fn device(&self) -> &D {
        self.inner.iface.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.inner.iface.device_mut()
    }

    /// Ticks since creation, wrapping.
    pub fn ticks(&self) -> u32 {
        self.inner.timers.ticks()
    }
}

impl<D: Device> Inner<D> {
    /// Send the oldest staged segment of every socket.
    fn flush(&mut self) {
        for handle in self.sockets.handles() {
            if let Err(err) = self.flush_socket(handle) {
                net_debug!("socket {}: segment not sent: {}", handle, err);
            }
        }
    }

    fn flush_socket(&mut self, handle: SocketHandle) -> Result<()> {
        let config = *self.iface.config();
        let socket = match self.sockets.get_mut(handle) {
            Some(socket) => socket,
            None => return Ok(()),
        };

        // Stays staged if the transmission fails.
        let flags = match socket.pending().next() {
            Some(flags) => flags,
            None => return Ok(()),
        };

        let repr = tcp::segment(socket, flags, &config);
        let out = Ipv4Out {
            dst_mac: socket.remote_mac,
            dst_addr: socket.remote_ip,
            protocol: IpProtocol::Tcp,
            ident: if repr.payload_len > 0 { 0 } else { CONTROL_IDENT },
            payload_len: repr.buffer_len(),
        };

        let dst_addr = socket.remote_ip;
        let data = &socket.tx[..repr.payload_len];
        self.iface.send_ipv4(out, |buffer, src_addr| {
            let checksum = TcpChecksum::Manual { src_addr, dst_addr };
            repr.emit(tcp_packet::new_unchecked_mut(buffer), data, checksum)
        })?;

        net_trace!("socket {}: sent {}", handle, repr);
        socket.next_pending();
        tcp::transmitted(socket, flags, repr.payload_len);

        if flags.syn() && socket.state == State::SynSent {
            socket.timer = self.timers.start_oneshot(TimerEvent::SynTimeout(handle), config.syn_timeout);
            if socket.timer.is_none() {
                net_debug!("socket {}: connection attempt without retry timer", handle);
            }
        }

        Ok(())
    }

    fn process<H: Handler + ?Sized>(&mut self, frame: &[u8], handler: &mut H) -> wire::Result<()> {
        let frame = ethernet_frame::new_checked(frame)?;
        let repr = EthernetRepr::parse(frame)?;

        if repr.dst_addr != self.iface.mac() && !repr.dst_addr.is_broadcast() {
            net_trace!("frame for {} ignored", repr.dst_addr);
            return Ok(());
        }

        match repr.ethertype {
            EthernetProtocol::Arp => self.process_arp(frame.payload_slice(), handler),
            EthernetProtocol::Ipv4 => self.process_ipv4(repr.src_addr, frame.payload_slice(), handler),
            other => {
                net_trace!("ethertype {} ignored", other);
                Ok(())
            },
        }
    }

    fn process_arp<H: Handler + ?Sized>(&mut self, payload: &[u8], handler: &mut H) -> wire::Result<()> {
        let repr = ArpRepr::parse(arp_packet::new_checked(payload)?)?;

        let address = self.iface.config().address;
        if let Some(reply) = arp::answer(&repr, self.iface.mac(), address) {
            if let Err(err) = self.iface.send_arp(repr.source_hardware_addr, &reply) {
                net_debug!("arp reply to {} not sent: {}", repr.source_protocol_addr, err);
            }
            return Ok(());
        }

        if repr.operation != ArpOperation::Reply {
            return Ok(());
        }

        if let Some((mac, waiters)) = self.resolver.process_reply(&repr, &mut self.timers) {
            for completion in waiters {
                self.complete(completion, Ok(mac), handler);
            }
        }

        Ok(())
    }

    fn process_ipv4<H: Handler + ?Sized>(
        &mut self,
        src_mac: EthernetAddress,
        payload: &[u8],
        handler: &mut H,
    ) -> wire::Result<()> {
        let packet = ipv4_packet::new_checked(payload)?;
        let repr = Ipv4Repr::parse(packet, Checksum::Manual)?;

        let to_us = repr.dst_addr == self.iface.config().address;
        let broadcast = repr.dst_addr.is_broadcast() && repr.protocol == IpProtocol::Udp;
        if !to_us && !broadcast {
            net_trace!("packet for {} ignored", repr.dst_addr);
            return Ok(());
        }

        let payload = packet.payload_slice();
        match repr.protocol {
            IpProtocol::Tcp => self.process_tcp(src_mac, &repr, payload, handler),
            IpProtocol::Udp => self.process_udp(&repr, payload, handler),
            IpProtocol::Icmp => self.process_icmp(src_mac, &repr, payload, handler),
            other => {
                net_trace!("protocol {} ignored", other);
                Ok(())
            },
        }
    }

    fn process_tcp<H: Handler + ?Sized>(
        &mut self,
        src_mac: EthernetAddress,
        ip: &Ipv4Repr,
        payload: &[u8],
        handler: &mut H,
    ) -> wire::Result<()> {
        let packet = tcp_packet::new_checked(payload)?;
        let checksum = TcpChecksum::Manual { src_addr: ip.src_addr, dst_addr: ip.dst_addr };
        let repr = TcpRepr::parse(packet, checksum)?;

        let sockets = &self.sockets;
        let handle = sockets.find_by_local_port(repr.dst_port)
            .filter(|&handle| match sockets.get(handle) {
                Some(socket) => socket.kind == SocketKind::Stream && socket.state != State::Closed,
                None => false,
            });

        let handle = match handle {
            Some(handle) => handle,
            None => {
                self.send_reset(src_mac, ip, &repr);
                return Ok(());
            },
        };

        let signal = match self.sockets.get_mut(handle) {
            Some(socket) => tcp::process(socket, &repr),
            None => return Ok(()),
        };

        match signal {
            Signal::None | Signal::TimedOut => (),
            Signal::Established => self.stop_socket_timer(handle),
            Signal::Deliver => handler.received(handle, packet.payload_slice()),
            Signal::Reset => {
                self.stop_socket_timer(handle);
                self.sockets.throw_error(handle, ErrorKind::ConnectionReset, handler);
            },
            Signal::Linger => self.linger(handle),
            Signal::Release => {
                self.stop_socket_timer(handle);
                self.sockets.release(handle);
            },
        }

        Ok(())
    }

    fn process_udp<H: Handler + ?Sized>(&mut self, ip: &Ipv4Repr, payload: &[u8], handler: &mut H)
        -> wire::Result<()>
    {
        let packet = udp_packet::new_checked(payload)?;
        let checksum = UdpChecksum::for_pseudo_header(ip.src_addr, ip.dst_addr);
        let repr = UdpRepr::parse(packet, checksum)?;

        match udp::find(&self.sockets, repr.dst_port) {
            Some(handle) => handler.datagram(handle, ip.src_addr, repr.src_port, packet.payload_slice()),
            None => net_trace!("no socket bound to udp port {}", repr.dst_port),
        }

        Ok(())
    }

    fn process_icmp<H: Handler + ?Sized>(
        &mut self,
        src_mac: EthernetAddress,
        ip: &Ipv4Repr,
        payload: &[u8],
        handler: &mut H,
    ) -> wire::Result<()> {
        let packet = icmpv4_packet::new_checked(payload)?;
        let repr = Icmpv4Repr::parse(packet, Checksum::Manual)?;

        if let Some(reply) = icmp::answer(&repr) {
            let out = Ipv4Out {
                dst_mac: src_mac,
                dst_addr: ip.src_addr,
                protocol: IpProtocol::Icmp,
                ident: CONTROL_IDENT,
                payload_len: reply.buffer_len(),
            };
            let data = packet.payload_slice();
            if let Err(err) = self.iface.send_ipv4(out, |buffer, _| icmp::emit(&reply, data, buffer)) {
                net_debug!("echo reply to {} not sent: {}", ip.src_addr, err);
            }
            return Ok(());
        }

        if let Some(reply) = self.pinger.process_reply(ip.src_addr, ip.hop_limit, &repr, &mut self.timers) {
            handler.echo_reply(&reply);
        }

        Ok(())
    }

    fn send_reset(&mut self, src_mac: EthernetAddress, ip: &Ipv4Repr, repr: &TcpRepr) {
        let reply = match tcp::reset_reply(repr) {
            Some(reply) => reply,
            None => return,
        };

        net_trace!("no connection for {}, resetting", repr);
        let out = Ipv4Out {
            dst_mac: src_mac,
            dst_addr: ip.src_addr,
            protocol: IpProtocol::Tcp,
            ident: CONTROL_IDENT,
            payload_len: reply.buffer_len(),
        };
        let dst_addr = ip.src_addr;
        let sent = self.iface.send_ipv4(out, |buffer, src_addr| {
            let checksum = TcpChecksum::Manual { src_addr, dst_addr };
            reply.emit(tcp_packet::new_unchecked_mut(buffer), &[], checksum)
        });

        if let Err(err) = sent {
            net_debug!("reset to {} not sent: {}", dst_addr, err);
        }
    }

    fn dispatch<H: Handler + ?Sized>(&mut self, event: TimerEvent, handler: &mut H) {
        match event {
            TimerEvent::ArpRetry(target) => {
                if let Some(waiters) = self.resolver.retry(target, &mut self.iface, &mut self.timers) {
                    for completion in waiters {
                        self.complete(completion, Err(()), handler);
                    }
                }
            },
            TimerEvent::SynTimeout(handle) => {
                let max_attempts = self.iface.config().syn_max_attempts;
                let signal = match self.sockets.get_mut(handle) {
                    Some(socket) => tcp::syn_timeout(socket, max_attempts),
                    None => return,
                };

                if signal == Signal::TimedOut {
                    self.sockets.throw_error(handle, ErrorKind::SynAckTimeout, handler);
                }
            },
            TimerEvent::Linger(handle) => {
                let lingering = self.sockets.get(handle)
                    .map_or(false, |socket| socket.state == State::TimeWait);
                if lingering {
                    net_debug!("socket {}: linger expired", handle);
                    self.sockets.release(handle);
                }
            },
            TimerEvent::EchoTimeout => {
                if let Some(error) = self.pinger.timeout() {
                    handler.echo_failed(error);
                }
            },
            TimerEvent::User(token) => handler.timer(token),
        }
    }

    /// Carry out a finished resolution.
    fn complete<H: Handler + ?Sized>(
        &mut self,
        completion: Completion,
        result: core::result::Result<EthernetAddress, ()>,
        handler: &mut H,
    ) {
        match (completion, result) {
            (Completion::Connect(handle), Ok(mac)) => self.open(handle, mac),
            (Completion::Connect(handle), Err(())) => {
                self.sockets.throw_error(handle, ErrorKind::ArpTimeout, handler);
            },
            (Completion::Datagram(handle), Ok(mac)) => {
                if let Err(err) = self.send_datagram(handle, mac) {
                    net_debug!("socket {}: datagram not sent: {}", handle, err);
                }
            },
            (Completion::Datagram(handle), Err(())) => {
                self.drop_datagram(handle);
                self.sockets.throw_error(handle, ErrorKind::ArpTimeout, handler);
            },
            (Completion::Echo, Ok(mac)) => {
                if let Err(err) = self.send_echo(mac) {
                    net_debug!("echo request not sent: {}", err);
                }
            },
            (Completion::Echo, Err(())) => {
                if let Some(error) = self.pinger.unreachable() {
                    handler.echo_failed(error);
                }
            },
            (Completion::Notify(token), result) => handler.resolved(token, result),
        }
    }

    /// Start the handshake of a connecting socket.
    fn open(&mut self, handle: SocketHandle, mac: EthernetAddress) {
        let address = self.iface.config().address;
        let ticks = self.timers.ticks();
        let socket = match self.sockets.get_mut(handle) {
            Some(socket) if socket.kind == SocketKind::Stream && socket.state == State::Closed => socket,
            _ => return,
        };

        socket.remote_mac = mac;
        socket.local_ip = address;
        let tuple = FourTuple {
            local: address,
            local_port: socket.local_port,
            remote: socket.remote_ip,
            remote_port: socket.remote_port,
        };
        tcp::open(socket, self.isn.get_isn(tuple, ticks));
    }

    fn linger(&mut self, handle: SocketHandle) {
        let linger = self.iface.config().linger;
        let socket = match self.sockets.get_mut(handle) {
            Some(socket) => socket,
            None => return,
        };

        match self.timers.start_oneshot(TimerEvent::Linger(handle), linger) {
            Some(timer) => socket.timer = Some(timer),
            None => {
                net_debug!("socket {}: no linger timer, releasing", handle);
                self.sockets.release(handle);
            },
        }
    }

    fn stop_socket_timer(&mut self, handle: SocketHandle) {
        if let Some(timer) = self.sockets.get_mut(handle).and_then(|socket| socket.timer.take()) {
            self.timers.stop(timer);
        }
    }

    fn send_datagram(&mut self, handle: SocketHandle, mac: EthernetAddress) -> Result<()> {
        let socket = match self.sockets.get_mut(handle) {
            Some(socket) if socket.kind == SocketKind::Datagram => socket,
            _ => return Ok(()),
        };

        let out = Ipv4Out {
            dst_mac: mac,
            dst_addr: socket.remote_ip,
            protocol: IpProtocol::Udp,
            ident: 0,
            payload_len: udp::repr(socket).buffer_len(),
        };
        let sent = self.iface.send_ipv4(out, |buffer, src_addr| udp::emit(socket, buffer, src_addr));
        socket.tx.clear();
        sent
    }

    fn drop_datagram(&mut self, handle: SocketHandle) {
        if let Some(socket) = self.sockets.get_mut(handle) {
            socket.tx.clear();
        }
    }

    fn send_echo(&mut self, mac: EthernetAddress) -> Result<()> {
        let target = match self.pinger.target() {
            Some(target) => target,
            None => return Ok(()),
        };

        let timeout = self.iface.config().echo_timeout;
        let repr = match self.pinger.request(timeout, &mut self.timers)? {
            Some(repr) => repr,
            None => return Ok(()),
        };

        let out = Ipv4Out {
            dst_mac: mac,
            dst_addr: target,
            protocol: IpProtocol::Icmp,
            ident: CONTROL_IDENT,
            payload_len: repr.buffer_len(),
        };
        let sent = self.iface.send_ipv4(out, |buffer, _| icmp::emit(&repr, ECHO_PAYLOAD, buffer));
        if sent.is_err() {
            self.pinger.cancel(&mut self.timers);
        }
        sent
    }
}
