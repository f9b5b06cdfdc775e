//! Synchronization primitives with RTOS-style timeout conventions.
//!
//! All primitives share one wait policy: `0` ticks polls without blocking,
//! `0xFFFF_FFFF` blocks forever, anything else is a bounded wait in
//! milliseconds. Handles are cheap clones sharing the same kernel object.

use std::time::{Duration, Instant};

use heapless::Deque;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::error::{OsError, OsResult};

/// Tick value meaning "do not block".
pub const NO_WAIT: u32 = 0;
/// Tick value meaning "block until the condition holds".
pub const WAIT_FOREVER: u32 = 0xffff_ffff;

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Poll only; fail immediately when the condition does not hold.
    None,
    /// Block indefinitely.
    Forever,
    /// Block for at most this many milliseconds.
    Millis(u32),
}

impl Wait {
    /// Maps the raw tick convention onto a policy.
    pub fn from_ticks(ticks: u32) -> Self {
        match ticks {
            NO_WAIT => Wait::None,
            WAIT_FOREVER => Wait::Forever,
            ms => Wait::Millis(ms),
        }
    }

    fn deadline(self) -> Option<Instant> {
        match self {
            Wait::Millis(ms) => Some(Instant::now() + Duration::from_millis(u64::from(ms))),
            _ => None,
        }
    }
}

/// Counting semaphore.
pub struct Semaphore {
    inner: Arc<SemInner>,
}

struct SemInner {
    state: Mutex<SemState>,
    cond: Condvar,
}

struct SemState {
    count: u32,
    max: u32,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self::with_max(initial, u32::MAX)
    }

    pub fn with_max(initial: u32, max: u32) -> Self {
        Self {
            inner: Arc::new(SemInner {
                state: Mutex::new(SemState {
                    count: initial,
                    max,
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Binary semaphore, initially empty.
    pub fn binary() -> Self {
        Self::with_max(0, 1)
    }

    pub fn try_take(&self) -> bool {
        let mut st = self.inner.state.lock();
        if st.count > 0 {
            st.count -= 1;
            true
        } else {
            false
        }
    }

    pub fn take(&self, wait: Wait) -> OsResult<()> {
        let mut st = self.inner.state.lock();
        let deadline = wait.deadline();
        while st.count == 0 {
            match wait {
                Wait::None => return Err(OsError::Timeout),
                Wait::Forever => self.inner.cond.wait(&mut st),
                Wait::Millis(_) => {
                    let deadline = deadline.unwrap_or_else(Instant::now);
                    if self.inner.cond.wait_until(&mut st, deadline).timed_out() && st.count == 0 {
                        return Err(OsError::Timeout);
                    }
                }
            }
        }
        st.count -= 1;
        Ok(())
    }

    pub fn give(&self) -> OsResult<()> {
        let mut st = self.inner.state.lock();
        if st.count >= st.max {
            return Err(OsError::Overflow);
        }
        st.count += 1;
        self.inner.cond.notify_one();
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.inner.state.lock().count
    }
}

impl Clone for Semaphore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Bit-pattern selection for [`EventGroup::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Wake once every requested bit is set.
    All,
    /// Wake once any requested bit is set.
    Any,
}

/// Group of event bits tasks can block on.
pub struct EventGroup {
    inner: Arc<EgInner>,
}

struct EgInner {
    bits: Mutex<u32>,
    cond: Condvar,
}

impl EventGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EgInner {
                bits: Mutex::new(0),
                cond: Condvar::new(),
            }),
        }
    }

    /// Sets `bits` and wakes every waiter; returns the bits now set.
    pub fn send(&self, bits: u32) -> u32 {
        let mut b = self.inner.bits.lock();
        *b |= bits;
        self.inner.cond.notify_all();
        *b
    }

    /// Clears `bits`; returns the bits still set.
    pub fn clear(&self, bits: u32) -> u32 {
        let mut b = self.inner.bits.lock();
        *b &= !bits;
        *b
    }

    pub fn bits(&self) -> u32 {
        *self.inner.bits.lock()
    }

    fn satisfied(have: u32, want: u32, mode: WaitMode) -> bool {
        match mode {
            WaitMode::All => have & want == want,
            WaitMode::Any => have & want != 0,
        }
    }

    /// Blocks until the requested pattern is set or the wait elapses.
    ///
    /// Returns the bits that were actually set at wake time; on timeout that
    /// may be an incomplete pattern, and the caller decides what to do with
    /// it. With `clear_on_exit` a satisfied wait consumes the requested bits.
    pub fn wait(&self, want: u32, mode: WaitMode, clear_on_exit: bool, wait: Wait) -> u32 {
        let mut b = self.inner.bits.lock();
        let deadline = wait.deadline();
        while !Self::satisfied(*b, want, mode) {
            match wait {
                Wait::None => break,
                Wait::Forever => self.inner.cond.wait(&mut b),
                Wait::Millis(_) => {
                    let deadline = deadline.unwrap_or_else(Instant::now);
                    if self.inner.cond.wait_until(&mut b, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        let got = *b;
        if clear_on_exit && Self::satisfied(got, want, mode) {
            *b &= !want;
        }
        got
    }
}

impl Default for EventGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventGroup {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Ticket one blocked sender holds while waiting for a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SenderTicket {
    prio: i32,
    seq: u64,
}

/// Bounded FIFO queue carrying typed items between tasks.
///
/// Storage is a fixed `heapless` deque; `try_send` never blocks, which makes
/// it the only variant safe from interrupt-adjacent contexts. Blocked senders
/// are released in priority order (ties broken by arrival).
pub struct MessageQueue<T, const N: usize> {
    inner: Arc<MqInner<T, N>>,
}

struct MqInner<T, const N: usize> {
    state: Mutex<MqState<T, N>>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct MqState<T, const N: usize> {
    queue: Deque<T, N>,
    senders: Vec<SenderTicket>,
    next_seq: u64,
}

impl<T, const N: usize> MessageQueue<T, N> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MqInner {
                state: Mutex::new(MqState {
                    queue: Deque::new(),
                    senders: Vec::new(),
                    next_seq: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    fn head(senders: &[SenderTicket]) -> Option<SenderTicket> {
        senders
            .iter()
            .copied()
            .max_by(|a, b| a.prio.cmp(&b.prio).then(b.seq.cmp(&a.seq)))
    }

    /// Enqueues without blocking; fails with `QueueFull` when no slot is
    /// free. Existing entries are never disturbed.
    pub fn try_send(&self, item: T) -> OsResult<()> {
        let mut st = self.inner.state.lock();
        if st.queue.is_full() {
            return Err(OsError::QueueFull);
        }
        let _ = st.queue.push_back(item);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Enqueues, blocking up to `wait` for a free slot.
    pub fn send(&self, item: T, wait: Wait) -> OsResult<()> {
        self.send_wait(item, wait, 0)
    }

    /// Enqueues with a priority hint ordering this sender among other blocked
    /// senders. Higher `prio` wins a freed slot first.
    pub fn send_wait(&self, item: T, wait: Wait, prio: i32) -> OsResult<()> {
        let mut st = self.inner.state.lock();

        if !st.queue.is_full() && st.senders.is_empty() {
            let _ = st.queue.push_back(item);
            self.inner.not_empty.notify_one();
            return Ok(());
        }
        if matches!(wait, Wait::None) {
            return Err(OsError::QueueFull);
        }

        let ticket = SenderTicket {
            prio,
            seq: st.next_seq,
        };
        st.next_seq += 1;
        st.senders.push(ticket);
        let deadline = wait.deadline();

        loop {
            let my_turn = Self::head(&st.senders) == Some(ticket);
            if my_turn && !st.queue.is_full() {
                st.senders.retain(|t| *t != ticket);
                let _ = st.queue.push_back(item);
                self.inner.not_empty.notify_one();
                // Let the next blocked sender re-evaluate its turn.
                self.inner.not_full.notify_all();
                return Ok(());
            }
            match wait {
                Wait::Forever => self.inner.not_full.wait(&mut st),
                Wait::Millis(_) => {
                    let deadline = deadline.unwrap_or_else(Instant::now);
                    if self.inner.not_full.wait_until(&mut st, deadline).timed_out() {
                        let my_turn = Self::head(&st.senders) == Some(ticket);
                        if my_turn && !st.queue.is_full() {
                            continue;
                        }
                        st.senders.retain(|t| *t != ticket);
                        return Err(OsError::Timeout);
                    }
                }
                Wait::None => unreachable!("handled before registering"),
            }
        }
    }

    pub fn try_recv(&self) -> OsResult<T> {
        let mut st = self.inner.state.lock();
        match st.queue.pop_front() {
            Some(item) => {
                self.inner.not_full.notify_all();
                Ok(item)
            }
            None => Err(OsError::QueueEmpty),
        }
    }

    /// Dequeues, blocking up to `wait` for an item.
    pub fn recv(&self, wait: Wait) -> OsResult<T> {
        let mut st = self.inner.state.lock();
        let deadline = wait.deadline();
        while st.queue.is_empty() {
            match wait {
                Wait::None => return Err(OsError::QueueEmpty),
                Wait::Forever => self.inner.not_empty.wait(&mut st),
                Wait::Millis(_) => {
                    let deadline = deadline.unwrap_or_else(Instant::now);
                    if self.inner.not_empty.wait_until(&mut st, deadline).timed_out()
                        && st.queue.is_empty()
                    {
                        return Err(OsError::Timeout);
                    }
                }
            }
        }
        let item = match st.queue.pop_front() {
            Some(item) => item,
            None => return Err(OsError::QueueEmpty),
        };
        self.inner.not_full.notify_all();
        Ok(item)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.state.lock().queue.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for MessageQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Clone for MessageQueue<T, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn semaphore_counts() {
        let sem = Semaphore::new(2);
        assert!(sem.try_take());
        assert!(sem.try_take());
        assert!(!sem.try_take());
        sem.give().unwrap();
        assert_eq!(sem.count(), 1);
        sem.take(Wait::None).unwrap();
    }

    #[test]
    fn binary_semaphore_rejects_double_give() {
        let sem = Semaphore::binary();
        sem.give().unwrap();
        assert_eq!(sem.give(), Err(OsError::Overflow));
    }

    #[test]
    fn semaphore_timed_take_elapses() {
        let sem = Semaphore::binary();
        assert_eq!(sem.take(Wait::Millis(20)), Err(OsError::Timeout));
    }

    #[test]
    fn semaphore_wakes_blocked_taker() {
        let sem = Semaphore::binary();
        let giver = sem.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            giver.give().unwrap();
        });
        sem.take(Wait::Forever).unwrap();
    }

    #[test]
    fn event_group_any_vs_all() {
        let eg = EventGroup::new();
        eg.send(0b001);
        assert_eq!(eg.wait(0b011, WaitMode::Any, false, Wait::None), 0b001);
        // ALL is not satisfied yet; poll returns what was set.
        let got = eg.wait(0b011, WaitMode::All, false, Wait::Millis(10));
        assert_eq!(got, 0b001);
        eg.send(0b010);
        let got = eg.wait(0b011, WaitMode::All, true, Wait::Forever);
        assert_eq!(got & 0b011, 0b011);
        assert_eq!(eg.bits(), 0);
    }

    #[test]
    fn event_group_wakes_cross_thread() {
        let eg = EventGroup::new();
        let sender = eg.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.send(0b100);
        });
        let got = eg.wait(0b100, WaitMode::Any, true, Wait::Millis(2000));
        assert_eq!(got & 0b100, 0b100);
    }

    #[test]
    fn queue_is_fifo() {
        let q: MessageQueue<u32, 4> = MessageQueue::new();
        q.try_send(1).unwrap();
        q.try_send(2).unwrap();
        q.try_send(3).unwrap();
        assert_eq!(q.recv(Wait::None).unwrap(), 1);
        assert_eq!(q.recv(Wait::None).unwrap(), 2);
        assert_eq!(q.recv(Wait::None).unwrap(), 3);
        assert_eq!(q.try_recv(), Err(OsError::QueueEmpty));
    }

    #[test]
    fn full_queue_try_send_fails_without_side_effects() {
        let q: MessageQueue<u32, 2> = MessageQueue::new();
        q.try_send(10).unwrap();
        q.try_send(20).unwrap();
        assert_eq!(q.try_send(30), Err(OsError::QueueFull));
        assert_eq!(q.len(), 2);
        assert_eq!(q.recv(Wait::None).unwrap(), 10);
        assert_eq!(q.recv(Wait::None).unwrap(), 20);
    }

    #[test]
    fn recv_times_out_on_empty() {
        let q: MessageQueue<u8, 2> = MessageQueue::new();
        assert_eq!(q.recv(Wait::Millis(20)), Err(OsError::Timeout));
    }

    #[test]
    fn blocked_sender_completes_after_drain() {
        let q: MessageQueue<u32, 1> = MessageQueue::new();
        q.try_send(1).unwrap();
        let tx = q.clone();
        let handle = thread::spawn(move || tx.send(2, Wait::Millis(2000)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.recv(Wait::None).unwrap(), 1);
        handle.join().unwrap().unwrap();
        assert_eq!(q.recv(Wait::Millis(500)).unwrap(), 2);
    }

    #[test]
    fn higher_priority_sender_wins_freed_slot() {
        let q: MessageQueue<u32, 1> = MessageQueue::new();
        q.try_send(0).unwrap();

        let low = q.clone();
        let low_handle = thread::spawn(move || low.send_wait(1, Wait::Millis(2000), 1));
        thread::sleep(Duration::from_millis(30));
        let high = q.clone();
        let high_handle = thread::spawn(move || high.send_wait(2, Wait::Millis(2000), 5));
        thread::sleep(Duration::from_millis(30));

        assert_eq!(q.recv(Wait::None).unwrap(), 0);
        let first = q.recv(Wait::Millis(500)).unwrap();
        let second = q.recv(Wait::Millis(500)).unwrap();
        assert_eq!(first, 2, "high priority sender should win the first slot");
        assert_eq!(second, 1);
        low_handle.join().unwrap().unwrap();
        high_handle.join().unwrap().unwrap();
    }
}
