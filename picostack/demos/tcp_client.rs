//! Opens one connection over a raw socket and prints what the peer answers.
//!
//! # Usage
//!
//! The stack needs a network interface of its own, since the host would otherwise answer the
//! segments of our connection with resets. A veth pair works well. Opening the raw socket requires
//! `CAP_NET_RAW`.
//!
//!   > $ ip link add veth0 type veth peer name veth1
//!   > $ ip addr add 10.0.0.1/24 dev veth1
//!   > $ ip link set up dev veth0 && ip link set up dev veth1
//!   > $ nc -l 10.0.0.1 8080 &
//!   > $ cargo run --example tcp_client -- veth0 10.0.0.2 255.255.255.0 10.0.0.1 10.0.0.1 8080
//!
//! Each line typed into the netcat session shows up here. The connection is closed once the peer
//! closes it or after the given number of seconds.
use std::time::{Duration, Instant};
use structopt::StructOpt;

use picostack::{Config, Handler, Stack};
use picostack::layer::socket::{SocketError, SocketHandle, SocketKind, SocketTable};
use picostack::layer::tcp::State;
use picostack::nic::RawSocket;
use picostack::stack::Token;
use picostack::wire::Ipv4Address;

fn main() {
    let Args {
        name,
        address,
        netmask,
        gateway,
        remote,
        port,
        seconds,
    } = Args::from_args();

    let device = RawSocket::new(&name)
        .expect("Couldn't open raw socket");
    let mut stack = Stack::new(device, Config::new(address, netmask, gateway));

    let socket = stack.sockets_mut().allocate(SocketKind::Stream)
        .expect("No free socket");
    stack.sockets_mut().set_error_token(socket, Some(Token(1)));
    stack.connect(socket, remote, port)
        .expect("Couldn't start the connection");

    let mut handler = Print { greeted: false };
    let start = Instant::now();
    let mut last_tick = start;

    loop {
        let received = stack.poll(&mut handler)
            .unwrap_or_else(|err| panic!("Error during poll {}: {:?}", err, stack.device_mut().last_err()));

        if last_tick.elapsed() >= Duration::from_secs(1) {
            last_tick += Duration::from_secs(1);
            stack.tick(&mut handler);
        }

        let state = match stack.sockets().get(socket) {
            Some(socket) => socket.state(),
            None => break,
        };

        if state == State::Established && !handler.greeted {
            handler.greeted = true;
            for (_, socket) in stack.sockets().iter() {
                println!("{}", socket);
            }
            stack.send(socket, b"hello from picostack\n").unwrap();
        }

        let expired = start.elapsed() >= Duration::from_secs(seconds);
        if state == State::CloseWait || (expired && state == State::Established) {
            stack.close(socket).unwrap();
        }

        if !received {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    println!("Connection finished");
}

struct Print {
    greeted: bool,
}

impl Handler for Print {
    fn socket_error(
        &mut self,
        sockets: &mut SocketTable,
        socket: SocketHandle,
        _: Token,
        error: &SocketError,
    ) {
        eprintln!("{}", error);
        sockets.release(socket);
    }

    fn received(&mut self, _: SocketHandle, data: &[u8]) {
        print!("{}", String::from_utf8_lossy(data));
    }
}

#[derive(StructOpt)]
struct Args {
    /// The interface to open.
    name: String,
    address: Ipv4Address,
    netmask: Ipv4Address,
    gateway: Ipv4Address,
    /// The host to connect to.
    remote: Ipv4Address,
    port: u16,
    /// Close the connection after this many seconds.
    #[structopt(default_value = "30")]
    seconds: u64,
}
