//! The address resolution layer.
//!
//! Maps IPv4 addresses of the local link to hardware addresses. Lookups that miss the cache
//! broadcast a request and complete later, when the reply arrives or the retries run out.
//!
//! A resolution is always for the *effective target*: the destination itself when it is in the
//! local subnet and the gateway otherwise.
use heapless::Vec;

use crate::config::{MAX_ARP_ENTRIES, MAX_ARP_REQUESTS};
use crate::nic::Device;
use crate::stack::{Completion, StackTimers, TimerEvent};
use crate::time::TimerHandle;
use crate::wire::{ArpOperation, ArpRepr, EthernetAddress, Ipv4Address};
use super::eth::Interface;
use super::{Error, Result};


/// Number of completions that can wait on the same pending resolution.
pub const MAX_WAITERS: usize = 4;

/// The completions of one resolution.
pub type Waiters = Vec<Completion, MAX_WAITERS>;

/// A learned hardware address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Neighbor {
    pub ip: Ipv4Address,
    pub mac: EthernetAddress,
}

/// A resolution waiting for a reply.
#[derive(Debug)]
pub struct Pending {
    target: Ipv4Address,
    attempts: u8,
    timer: TimerHandle,
    waiters: Waiters,
}

/// The immediate outcome of a resolve call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The address was cached, nothing was sent.
    Cached(EthernetAddress),
    /// A request is in flight, the completion will be reported later.
    Pending,
}

/// The address cache and the table of outstanding resolutions.
#[derive(Debug, Default)]
pub struct Resolver {
    cache: Vec<Neighbor, MAX_ARP_ENTRIES>,
    pending: Vec<Pending, MAX_ARP_REQUESTS>,
}

impl Pending {
    /// The address being resolved.
    pub fn target(&self) -> Ipv4Address {
        self.target
    }

    /// Number of retry timeouts so far.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Completions waiting for the result.
    pub fn waiters(&self) -> &[Completion] {
        &self.waiters
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver::default()
    }

    /// Look up a cached hardware address.
    pub fn lookup(&self, ip: Ipv4Address) -> Option<EthernetAddress> {
        self.cache.iter()
            .find(|neighbor| neighbor.ip == ip)
            .map(|neighbor| neighbor.mac)
    }

    /// All learned addresses, in the order they were learned.
    pub fn cache(&self) -> &[Neighbor] {
        &self.cache
    }

    /// All outstanding resolutions, oldest first.
    pub fn pending(&self) -> &[Pending] {
        &self.pending
    }

    /// Check if a completion waits on any outstanding resolution.
    pub fn is_waiting(&self, completion: Completion) -> bool {
        self.pending.iter().any(|pending| pending.waiters.contains(&completion))
    }

    /// Remove a completion from the resolution it waits on.
    ///
    /// The resolution itself continues and its result is still learned.
    pub fn withdraw(&mut self, completion: Completion) -> bool {
        for pending in self.pending.iter_mut() {
            if let Some(index) = pending.waiters.iter().position(|&waiter| waiter == completion) {
                pending.waiters.remove(index);
                return true;
            }
        }
        false
    }

    /// Insert or update a cache entry.
    ///
    /// Returns `false` if the address is new and the cache is full. Entries are never evicted.
    pub fn learn(&mut self, ip: Ipv4Address, mac: EthernetAddress) -> bool {
        if let Some(neighbor) = self.cache.iter_mut().find(|neighbor| neighbor.ip == ip) {
            neighbor.mac = mac;
            return true;
        }

        match self.cache.push(Neighbor { ip, mac }) {
            Ok(()) => true,
            Err(_) => {
                net_debug!("arp cache full, not learning {}", ip);
                false
            },
        }
    }

    /// Resolve the hardware address of the next hop towards `target`.
    ///
    /// On a cache hit the address is returned immediately and `completion` is not stored. On a
    /// miss a request is broadcast and a periodic retry timer started, unless the effective
    /// target is already pending, in which case `completion` joins the waiting ones.
    pub fn resolve<D: Device>(
        &mut self,
        target: Ipv4Address,
        completion: Completion,
        iface: &mut Interface<D>,
        timers: &mut StackTimers,
    ) -> Result<Lookup> {
        if !iface.config().is_ready() {
            return Err(Error::Unreachable);
        }

        let effective = iface.config().next_hop(target);
        if let Some(mac) = self.lookup(effective) {
            return Ok(Lookup::Cached(mac));
        }

        if let Some(pending) = self.pending.iter_mut().find(|pending| pending.target == effective) {
            pending.waiters.push(completion).map_err(|_| Error::Exhausted)?;
            return Ok(Lookup::Pending);
        }

        if self.pending.is_full() {
            net_debug!("arp request table full, can not resolve {}", effective);
            return Err(Error::Exhausted);
        }

        let interval = iface.config().arp_retry_interval;
        let timer = timers.start_periodic(TimerEvent::ArpRetry(effective), interval)
            .ok_or(Error::Exhausted)?;

        let mut waiters = Waiters::new();
        // Capacity is at least one.
        let _ = waiters.push(completion);
        let entry = Pending {
            target: effective,
            attempts: 0,
            timer,
            waiters,
        };

        if self.pending.push(entry).is_err() {
            timers.stop(timer);
            return Err(Error::Exhausted);
        }

        Self::send_request(effective, iface);
        Ok(Lookup::Pending)
    }

    /// Handle the retry timer of a pending resolution.
    ///
    /// Returns the waiting completions when the maximum number of attempts was reached, the
    /// entry and its timer are gone in that case. Otherwise the request is sent again.
    pub fn retry<D: Device>(
        &mut self,
        target: Ipv4Address,
        iface: &mut Interface<D>,
        timers: &mut StackTimers,
    ) -> Option<Waiters> {
        let index = self.pending.iter().position(|pending| pending.target == target)?;
        let pending = &mut self.pending[index];
        pending.attempts += 1;

        if pending.attempts >= iface.config().arp_max_attempts {
            net_debug!("arp resolution of {} timed out", target);
            timers.stop(pending.timer);
            let pending = self.pending.remove(index);
            return Some(pending.waiters);
        }

        Self::send_request(target, iface);
        None
    }

    /// Process a received reply.
    ///
    /// The sender is learned unconditionally. If a resolution for it was pending, its timer is
    /// stopped and the entry removed, returning the completions to notify.
    pub fn process_reply(&mut self, repr: &ArpRepr, timers: &mut StackTimers)
        -> Option<(EthernetAddress, Waiters)>
    {
        let ip = repr.source_protocol_addr;
        let mac = repr.source_hardware_addr;
        self.learn(ip, mac);

        let index = self.pending.iter().position(|pending| pending.target == ip)?;
        let pending = self.pending.remove(index);
        timers.stop(pending.timer);
        net_debug!("arp resolved {} to {}", ip, mac);
        Some((mac, pending.waiters))
    }

    fn send_request<D: Device>(target: Ipv4Address, iface: &mut Interface<D>) {
        let repr = ArpRepr {
            operation: ArpOperation::Request,
            source_hardware_addr: iface.mac(),
            source_protocol_addr: iface.config().address,
            target_hardware_addr: EthernetAddress([0; 6]),
            target_protocol_addr: target,
        };

        net_debug!("arp who-has {} tell {}", target, repr.source_protocol_addr);
        if let Err(err) = iface.send_arp(EthernetAddress::BROADCAST, &repr) {
            // The retry timer sends again.
            net_debug!("arp request for {} not sent: {}", target, err);
        }
    }
}

/// Construct the answer to a request for our own address.
///
/// Returns `None` if the packet is not such a request. An interface without address answers
/// nothing.
pub fn answer(repr: &ArpRepr, mac: EthernetAddress, address: Ipv4Address) -> Option<ArpRepr> {
    if address.is_unspecified() {
        return None;
    }

    if repr.operation != ArpOperation::Request || repr.target_protocol_addr != address {
        return None;
    }

    Some(ArpRepr {
        operation: ArpOperation::Reply,
        source_hardware_addr: mac,
        source_protocol_addr: address,
        target_hardware_addr: repr.source_hardware_addr,
        target_protocol_addr: repr.source_protocol_addr,
    })
}
