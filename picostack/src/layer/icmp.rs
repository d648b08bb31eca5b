//! Echo requests and replies.
//!
//! Requests addressed to us are answered in place. A single outgoing echo request, a *ping*, can
//! be outstanding at any time; its reply or its failure is reported once.
use core::fmt;

use crate::stack::{StackTimers, TimerEvent};
use crate::time::TimerHandle;
use crate::wire::{icmpv4_packet, Checksum, Icmpv4Repr, Ipv4Address};
use super::{Error, Result};

/// The payload of every echo request we send.
pub const ECHO_PAYLOAD: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyzabcdef";

/// A received answer to our echo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EchoReply {
    /// The answering host.
    pub from: Ipv4Address,
    /// Length of the echoed data.
    pub bytes: usize,
    /// Ticks passed since the request was sent.
    pub ticks: u32,
    /// Remaining hop limit of the reply.
    pub ttl: u8,
}

/// Why an echo request was not answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EchoError {
    /// The next hop could not be resolved.
    Unreachable,
    /// No reply arrived in time.
    TimedOut,
}

#[derive(Clone, Copy, Debug)]
struct Outstanding {
    target: Ipv4Address,
    /// Tick count at transmission, unset while resolving.
    sent_at: Option<u32>,
    timer: Option<TimerHandle>,
}

/// The state of the one outstanding echo request.
#[derive(Debug, Default)]
pub struct Pinger {
    outstanding: Option<Outstanding>,
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EchoError::Unreachable => "Destination host unreachable.",
            EchoError::TimedOut => "Request timed out.",
        })
    }
}

impl Pinger {
    pub fn new() -> Self {
        Pinger::default()
    }

    /// The host currently pinged.
    pub fn target(&self) -> Option<Ipv4Address> {
        self.outstanding.map(|outstanding| outstanding.target)
    }

    /// Claim the pinger for a new request.
    pub fn start(&mut self, target: Ipv4Address) -> Result<()> {
        if self.outstanding.is_some() {
            return Err(Error::Illegal);
        }

        self.outstanding = Some(Outstanding {
            target,
            sent_at: None,
            timer: None,
        });
        Ok(())
    }

    /// Give up the request without reporting anything.
    pub fn cancel(&mut self, timers: &mut StackTimers) {
        if let Some(Outstanding { timer: Some(timer), .. }) = self.outstanding.take() {
            timers.stop(timer);
        }
    }

    /// The request that goes out now, with its reply timer started.
    ///
    /// Returns `None` if no request is outstanding or it was already sent. Without a free timer
    /// the request is given up with `Exhausted`, it could never time out.
    pub fn request(&mut self, timeout: u32, timers: &mut StackTimers) -> Result<Option<Icmpv4Repr>> {
        let outstanding = match self.outstanding.as_mut() {
            Some(outstanding) if outstanding.sent_at.is_none() => outstanding,
            _ => return Ok(None),
        };

        let timer = match timers.start_oneshot(TimerEvent::EchoTimeout, timeout) {
            Some(timer) => timer,
            None => {
                net_debug!("ping to {}: no timer", outstanding.target);
                self.outstanding = None;
                return Err(Error::Exhausted);
            },
        };

        outstanding.sent_at = Some(timers.ticks());
        outstanding.timer = Some(timer);
        Ok(Some(Icmpv4Repr::EchoRequest {
            ident: 0,
            seq_no: 0,
            payload: ECHO_PAYLOAD.len(),
        }))
    }

    /// Match a received echo reply against the outstanding request.
    pub fn process_reply(
        &mut self,
        from: Ipv4Address,
        ttl: u8,
        repr: &Icmpv4Repr,
        timers: &mut StackTimers,
    ) -> Option<EchoReply> {
        let outstanding = self.outstanding?;
        let sent_at = outstanding.sent_at?;
        match *repr {
            Icmpv4Repr::EchoReply { ident: 0, seq_no: 0, payload } if from == outstanding.target => {
                if let Some(timer) = outstanding.timer {
                    timers.stop(timer);
                }
                self.outstanding = None;
                Some(EchoReply {
                    from,
                    bytes: payload,
                    ticks: timers.ticks().wrapping_sub(sent_at),
                    ttl,
                })
            },
            _ => None,
        }
    }

    /// The reply timer expired.
    pub fn timeout(&mut self) -> Option<EchoError> {
        let outstanding = self.outstanding?;
        outstanding.sent_at?;
        self.outstanding = None;
        Some(EchoError::TimedOut)
    }

    /// The next hop of the request could not be resolved.
    pub fn unreachable(&mut self) -> Option<EchoError> {
        self.outstanding.take().map(|_| EchoError::Unreachable)
    }
}

/// The reply to an echo request, `None` for any other message.
pub fn answer(repr: &Icmpv4Repr) -> Option<Icmpv4Repr> {
    repr.echo_reply()
}

/// Write a message into an IP payload of `repr.buffer_len()` bytes.
pub fn emit(repr: &Icmpv4Repr, payload: &[u8], buffer: &mut [u8]) {
    repr.emit(icmpv4_packet::new_unchecked_mut(buffer), payload, Checksum::Manual);
}
