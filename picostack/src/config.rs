//! Interface configuration and protocol tunables.
//!
//! The table capacities are compile time constants, everything else can be chosen per stack
//! instance through [`Config`].
//!
//! [`Config`]: struct.Config.html
use crate::wire::Ipv4Address;

/// Number of simultaneously allocated sockets.
pub const MAX_SOCKETS: usize = 5;

/// Number of learned hardware addresses.
pub const MAX_ARP_ENTRIES: usize = 20;

/// Number of addresses that may be resolved at the same time.
pub const MAX_ARP_REQUESTS: usize = 5;

/// Number of timer slots.
pub const NUM_TIMERS: usize = 25;

/// Capacity of the transmit buffer of each socket.
pub const TX_BUFFER_LEN: usize = 256;

/// Largest Ethernet frame, without the frame check sequence.
pub const MAX_FRAME_LEN: usize = 1518;

/// Addresses of the interface and the tunables of all protocols.
///
/// Durations are counted in ticks, the unit in which [`Stack::tick`] is called. On the intended
/// hardware this is one second.
///
/// [`Stack::tick`]: ../stack/struct.Stack.html#method.tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// The address of the interface.
    pub address: Ipv4Address,
    /// The mask of the local subnet.
    pub netmask: Ipv4Address,
    /// The router for any destination outside the local subnet.
    pub gateway: Ipv4Address,
    /// A name server. Not used by the stack itself.
    pub dns: Ipv4Address,
    /// Time to live of every sent packet.
    pub hop_limit: u8,
    /// Ticks between two address resolution requests.
    pub arp_retry_interval: u32,
    /// Number of retry timeouts after which a resolution fails.
    pub arp_max_attempts: u8,
    /// Ticks to wait for the answer to a connection request.
    pub syn_timeout: u32,
    /// Number of connection requests sent before giving up.
    pub syn_max_attempts: u8,
    /// Ticks spent in `TimeWait` before the socket is released.
    pub linger: u32,
    /// The advertised receive window.
    pub window: u16,
    /// The advertised maximum segment size.
    pub mss: u16,
    /// Ticks to wait for an echo reply.
    pub echo_timeout: u32,
    /// Seed of the generator for ephemeral ports.
    pub seed: u64,
    /// Key of the initial sequence number generator.
    pub isn_key: [u64; 2],
}

impl Config {
    /// A configuration with default tunables for the given interface addresses.
    pub fn new(address: Ipv4Address, netmask: Ipv4Address, gateway: Ipv4Address) -> Self {
        Config {
            address,
            netmask,
            gateway,
            ..Config::default()
        }
    }

    /// Whether address, gateway and netmask are all configured.
    pub fn is_ready(&self) -> bool {
        !self.address.is_unspecified()
            && !self.gateway.is_unspecified()
            && !self.netmask.is_unspecified()
    }

    /// Whether `ip` is directly reachable on the link.
    pub fn in_local_subnet(&self, ip: Ipv4Address) -> bool {
        self.address.in_subnet(ip, self.netmask)
    }

    /// The address whose hardware address must be resolved to reach `ip`.
    ///
    /// This is `ip` itself inside the local subnet and the gateway otherwise.
    pub fn next_hop(&self, ip: Ipv4Address) -> Ipv4Address {
        if self.in_local_subnet(ip) {
            ip
        } else {
            self.gateway
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: Ipv4Address::UNSPECIFIED,
            netmask: Ipv4Address::UNSPECIFIED,
            gateway: Ipv4Address::UNSPECIFIED,
            dns: Ipv4Address::UNSPECIFIED,
            hop_limit: 128,
            arp_retry_interval: 1,
            arp_max_attempts: 3,
            syn_timeout: 2,
            syn_max_attempts: 3,
            linger: 10,
            window: 1284,
            mss: 1460,
            echo_timeout: 2,
            seed: 0x5eed_cafe_f00d_0001,
            isn_key: [0x0706_0504_0302_0100, 0x0f0e_0d0c_0b0a_0908],
        }
    }
}
