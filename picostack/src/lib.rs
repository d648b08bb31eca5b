//! A heap-free TCP/IP stack for controllers with a single Ethernet interface.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [The layers](layer/index.html)
//! 4. [The stack driver](stack/index.html)
//! 5. [Network interfaces](nic/index.html)
//!
//! ## Design
//!
//! All state lives in fixed-capacity tables owned by one [`Stack`]: the timer slots, the address
//! cache, the in-flight resolutions and the sockets. Nothing ever allocates. Running out of a
//! table is reported to the caller as [`layer::Error::Exhausted`] and never retried silently.
//!
//! The stack is driven cooperatively from two places. [`Stack::poll`] flushes one queued segment
//! per socket and then handles at most one received frame. [`Stack::tick`] advances the timers
//! by one unit and dispatches whatever expired: address resolution retries, connection attempts,
//! linger timeouts. Results that arrive later than the call that caused them, a resolved address
//! or a reset connection, are delivered through the [`Handler`] trait passed into both.
//!
//! Only active open is supported. A connection is made by allocating a stream socket, calling
//! [`Stack::connect`] and then ticking and polling until the handshake completes.
//!
//! ```no_run
//! # #[cfg(feature = "std")] {
//! use picostack::{Config, Handler, Stack};
//! use picostack::layer::socket::SocketKind;
//! use picostack::wire::Ipv4Address;
//!
//! struct Print;
//! impl Handler for Print {}
//!
//! let config = Config::new(
//!     Ipv4Address::new(192, 168, 1, 118),
//!     Ipv4Address::new(255, 255, 255, 0),
//!     Ipv4Address::new(192, 168, 1, 1));
//! let device = picostack::nic::RawSocket::new("eth0").unwrap();
//! let mut stack = Stack::new(device, config);
//! let socket = stack.sockets_mut().allocate(SocketKind::Stream).unwrap();
//! stack.connect(socket, Ipv4Address::new(192, 168, 1, 1), 80).unwrap();
//! loop {
//!     stack.poll(&mut Print).unwrap();
//! #   break;
//! }
//! # }
//! ```
//!
//! [`Stack`]: stack/struct.Stack.html
//! [`Stack::poll`]: stack/struct.Stack.html#method.poll
//! [`Stack::tick`]: stack/struct.Stack.html#method.tick
//! [`Stack::connect`]: stack/struct.Stack.html#method.connect
//! [`Handler`]: stack/trait.Handler.html
//! [`layer::Error::Exhausted`]: layer/enum.Error.html#variant.Exhausted
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod config;
pub mod layer;
pub mod nic;
pub mod rand;
pub mod stack;
pub mod time;
pub mod wire;

pub use self::config::{
    Config,
    MAX_ARP_ENTRIES,
    MAX_ARP_REQUESTS,
    MAX_FRAME_LEN,
    MAX_SOCKETS,
    NUM_TIMERS,
    TX_BUFFER_LEN};

pub use self::stack::{
    Handler,
    Stack};
