// Cancellable one-shot/repeating timers for a single-threaded event loop.
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[cfg(test)]
use std::cell::Cell;

/// Clock abstraction to make scheduling deterministic in unit tests.
pub trait Clock: 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Minimal fake clock for deterministic timer unit tests.
#[cfg(test)]
#[derive(Clone)]
pub struct FakeClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new(base: Instant) -> Self {
        Self {
            base,
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get().saturating_add(by));
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// Opaque handle returned by [`ClockSource::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Every,
}

pub type TimerCallback = Box<dyn FnMut()>;

/// Schedules callbacks on the event loop.
///
/// Cancelling a handle that already fired or was already cancelled is a no-op.
pub trait ClockSource {
    fn schedule(&self, delay: Duration, repeat: Repeat, callback: TimerCallback) -> TimerHandle;

    /// Returns `true` when a pending timer was removed.
    fn cancel(&self, handle: TimerHandle) -> bool;

    fn is_scheduled(&self, handle: TimerHandle) -> bool;
}

struct TimerEntry {
    interval: Duration,
    repeat: Repeat,
    generation: u64,
    // Taken out while a repeating callback runs.
    callback: Option<TimerCallback>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    next_seq: u64,
    // (deadline, seq, id, generation); seq keeps equal deadlines in scheduling order.
    heap: BinaryHeap<Reverse<(Instant, u64, u64, u64)>>,
    timers: HashMap<u64, TimerEntry>,
}

impl QueueState {
    fn push(&mut self, deadline: Instant, id: u64, generation: u64) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Reverse((deadline, seq, id, generation)));
    }

    fn is_live(&self, id: u64, generation: u64) -> bool {
        self.timers
            .get(&id)
            .is_some_and(|entry| entry.generation == generation && entry.callback.is_some())
    }

    /// Pop the next due timer, re-arming repeating entries before their callback runs.
    fn pop_due(&mut self, now: Instant) -> Option<(u64, Repeat, TimerCallback)> {
        while let Some(Reverse((deadline, _, id, generation))) = self.heap.peek().copied() {
            if deadline > now {
                return None;
            }
            let _ = self.heap.pop();
            if !self.is_live(id, generation) {
                continue;
            }

            let repeat = self.timers.get(&id).map(|entry| entry.repeat)?;
            match repeat {
                Repeat::Once => {
                    let entry = self.timers.remove(&id)?;
                    let callback = entry.callback?;
                    return Some((id, Repeat::Once, callback));
                }
                Repeat::Every => {
                    let entry = self.timers.get_mut(&id)?;
                    let callback = entry.callback.take()?;
                    entry.generation = entry.generation.wrapping_add(1);
                    let next_generation = entry.generation;
                    let next_deadline = deadline + entry.interval;
                    self.push(next_deadline, id, next_generation);
                    return Some((id, Repeat::Every, callback));
                }
            }
        }
        None
    }
}

/// Deterministic timer queue driven by the host's event loop.
///
/// The host sleeps for [`TimerQueue::next_wakeup_delay`], delivers any pending input for the
/// tick, then calls [`TimerQueue::fire_due`]. Timers fire in deadline order; ties fire in the
/// order they were scheduled.
pub struct TimerQueue<C: Clock> {
    clock: C,
    state: Rc<RefCell<QueueState>>,
}

impl<C: Clock + Clone> Clone for TimerQueue<C> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<C: Clock> TimerQueue<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(QueueState::default())),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of timers that are scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Delay until the earliest live timer is due, or `None` when nothing is scheduled.
    pub fn next_wakeup_delay(&self) -> Option<Duration> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        // Discard stale heap heads so the answer reflects a live timer.
        while let Some(Reverse((deadline, _, id, generation))) = state.heap.peek().copied() {
            if state.is_live(id, generation) {
                return Some(deadline.saturating_duration_since(now));
            }
            let _ = state.heap.pop();
        }
        None
    }

    /// Run every timer whose deadline has passed and return how many callbacks ran.
    pub fn fire_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let next = self.state.borrow_mut().pop_due(now);
            let Some((id, repeat, mut callback)) = next else {
                break;
            };

            callback();
            fired += 1;

            if repeat == Repeat::Every {
                // A cancel from inside the callback removed the entry; the callback is dropped.
                let mut state = self.state.borrow_mut();
                if let Some(entry) = state.timers.get_mut(&id) {
                    entry.callback = Some(callback);
                }
            }
        }
        fired
    }
}

#[cfg(test)]
impl TimerQueue<FakeClock> {
    /// Advance virtual time in 1 ms steps, firing timers as their deadlines pass.
    pub fn run_for(&self, by: Duration) {
        let step = Duration::from_millis(1);
        let mut remaining = by;
        let _ = self.fire_due();
        while !remaining.is_zero() {
            let delta = remaining.min(step);
            self.clock.advance(delta);
            remaining -= delta;
            let _ = self.fire_due();
        }
    }

    pub fn run_for_ms(&self, ms: u64) {
        self.run_for(Duration::from_millis(ms));
    }
}

impl<C: Clock> ClockSource for TimerQueue<C> {
    fn schedule(&self, delay: Duration, repeat: Repeat, callback: TimerCallback) -> TimerHandle {
        let deadline = self.clock.now() + delay;
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        let interval = match repeat {
            // A zero interval would re-fire forever within one `fire_due` pass.
            Repeat::Every => delay.max(Duration::from_millis(1)),
            Repeat::Once => delay,
        };
        state.timers.insert(
            id,
            TimerEntry {
                interval,
                repeat,
                generation: 0,
                callback: Some(callback),
            },
        );
        state.push(deadline, id, 0);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        // Drop the callback after the borrow ends; its captures may cancel other timers.
        let removed = self.state.borrow_mut().timers.remove(&handle.0);
        removed.is_some()
    }

    fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.state.borrow().timers.contains_key(&handle.0)
    }
}
