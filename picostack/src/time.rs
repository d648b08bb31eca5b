/*! The timer service.

Timers count in *ticks*, an abstract unit advanced by calling [`Timers::tick`]. On the
controllers this stack targets one tick is one second, driven from a hardware interrupt.

Expired timers do not run code by themselves. Each timer carries an event value that becomes
*due* when the timer expires, and the owner drains due events with [`Timers::next_due`] right
after ticking. This keeps every reaction to a timeout inside the single execution context of the
owner, which is free to mutate its tables while handling the event.

```
use picostack::time::Timers;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event { Retry, Linger }

let mut timers: Timers<Event, 4> = Timers::new();
let retry = timers.start_periodic(Event::Retry, 1).unwrap();
timers.start_oneshot(Event::Linger, 2).unwrap();

timers.tick();
assert_eq!(timers.next_due(), Some(Event::Retry));
assert_eq!(timers.next_due(), None);

timers.tick();
assert_eq!(timers.next_due(), Some(Event::Retry));
assert_eq!(timers.next_due(), Some(Event::Linger));

assert!(timers.stop(retry));
assert_eq!(timers.active(), 0);
```

[`Timers::tick`]: struct.Timers.html#method.tick
[`Timers::next_due`]: struct.Timers.html#method.next_due
*/

/// Identifies a started timer.
///
/// The handle stays unique after its timer was stopped or fired, even when the slot is reused
/// for another timer. Stopping through a stale handle does nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    index: u8,
    generation: u16,
}

#[derive(Clone, Copy, Debug)]
struct Slot<E> {
    event: E,
    period: u32,
    remaining: u32,
    periodic: bool,
    due: bool,
    /// Registration order, for dispatching timers expiring in the same tick.
    order: u32,
}

/// A fixed table of one-shot and periodic timers.
#[derive(Debug)]
pub struct Timers<E, const N: usize> {
    slots: [Option<Slot<E>>; N],
    generations: [u16; N],
    order: u32,
    ticks: u32,
}

impl<E: Copy, const N: usize> Timers<E, N> {
    /// Handles store the slot index in a byte.
    const INDEX_FITS: () = assert!(N <= 1 << 8, "a timer table holds at most 256 slots");

    /// Create a table with all slots free.
    pub fn new() -> Self {
        let () = Self::INDEX_FITS;
        Timers {
            slots: [None; N],
            generations: [0; N],
            order: 0,
            ticks: 0,
        }
    }

    /// Start a timer that becomes due once, `delay` ticks from now.
    ///
    /// A delay of zero is treated as one, the timer is due after the next tick.
    ///
    /// Returns `None` when all slots are occupied.
    pub fn start_oneshot(&mut self, event: E, delay: u32) -> Option<TimerHandle> {
        self.start(event, delay, false)
    }

    /// Start a timer that becomes due every `period` ticks until stopped.
    ///
    /// Returns `None` when all slots are occupied.
    pub fn start_periodic(&mut self, event: E, period: u32) -> Option<TimerHandle> {
        self.start(event, period, true)
    }

    fn start(&mut self, event: E, delay: u32, periodic: bool) -> Option<TimerHandle> {
        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => index,
            None => {
                net_debug!("timer table exhausted ({} slots)", N);
                return None
            },
        };

        let delay = delay.max(1);
        self.slots[index] = Some(Slot {
            event,
            period: delay,
            remaining: delay,
            periodic,
            due: false,
            order: self.order,
        });
        self.order = self.order.wrapping_add(1);

        Some(TimerHandle {
            index: index as u8,
            generation: self.generations[index],
        })
    }

    /// Stop a timer and free its slot.
    ///
    /// A due event of the timer that has not been taken yet is discarded. Returns `false` if the
    /// handle does not refer to an active timer.
    pub fn stop(&mut self, handle: TimerHandle) -> bool {
        if !self.is_active(handle) {
            return false;
        }

        self.free(usize::from(handle.index));
        true
    }

    /// Check if the timer of the handle is still active.
    ///
    /// A one-shot timer stays active until its due event was taken.
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        let index = usize::from(handle.index);
        index < N
            && self.generations[index] == handle.generation
            && self.slots[index].is_some()
    }

    /// The number of occupied slots.
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// The number of ticks since creation, wrapping.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Advance all timers by one tick.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);

        for slot in self.slots.iter_mut().flatten() {
            // An expired one-shot waiting to be taken.
            if slot.remaining == 0 {
                continue;
            }

            slot.remaining -= 1;
            if slot.remaining == 0 {
                slot.due = true;
                if slot.periodic {
                    slot.remaining = slot.period;
                }
            }
        }
    }

    /// Take the next due event.
    ///
    /// Events are returned in the order in which their timers were started. Taking the event of
    /// a one-shot timer frees its slot.
    pub fn next_due(&mut self) -> Option<E> {
        let (_, index) = self.slots.iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Some(slot) if slot.due => Some((slot.order.wrapping_sub(self.order), index)),
                _ => None,
            })
            .min()?;

        let slot = self.slots[index].as_mut()?;
        slot.due = false;
        let event = slot.event;
        if !slot.periodic {
            self.free(index);
        }

        Some(event)
    }

    fn free(&mut self, index: usize) {
        self.slots[index] = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
    }
}

impl<E: Copy, const N: usize> Default for Timers<E, N> {
    fn default() -> Self {
        Timers::new()
    }
}
