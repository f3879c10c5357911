//! Cooperative CPU model.
//!
//! Each node owns a [`Cpu`] with a fixed number of cores and a FIFO ready
//! queue. Protocol events are admitted through [`Cpu::intake`]: they run
//! immediately when a core is free and queue otherwise. A running handler
//! accrues simulated service time with [`Cpu::add_time`]; when the run ends,
//! a `FreeCore` event scheduled after the accrued time returns the core.
//!
//! Locks are asynchronous. A handler that needs a lock suspends its run:
//! the acquire travels through the event queue (arriving after the run's
//! accrued time), and the continuation resumes either immediately on grant,
//! consuming the core slot the suspended run left behind, or later from the
//! lock's FIFO. Releases wake the longest-waiting acquire to the *front* of
//! the ready queue.
//!
//! At most one protocol run starts per delivered event; chains happen
//! through scheduled events, never through reentrant dispatch.

use rainsim_core::{Event, LockId, RwLockId, Scheduler};
use rainsim_types::{NodeId, SimTime};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::trace;

struct Lock {
    locked: bool,
    waiters: VecDeque<Event>,
}

// The first reader takes the write_locked flag and the last one releases
// it; writers wait on the flag, readers only wait when a writer holds it.
struct RwLock {
    readers: u32,
    write_locked: bool,
    waiters: VecDeque<Event>,
}

/// Queue-depth and usage statistics, sampled every `stats_interval`.
#[derive(Debug, Default)]
pub struct CpuStats {
    busy_time: SimTime,
    events_processed: u64,
    queue_depth_samples: Vec<usize>,
    max_queue_depth_samples: Vec<usize>,
    max_depth_since_sample: usize,
}

/// Snapshot of [`CpuStats`] for the per-node statistics document.
#[derive(Debug, Serialize)]
pub struct CpuStatsDocument {
    /// Fraction of simulated time a core was busy.
    pub usage: f64,
    pub events_processed: u64,
    pub queue_depth_average: f64,
    pub queue_depth_max: usize,
    pub queue_depth_samples: usize,
}

pub struct Cpu {
    node: NodeId,
    now: SimTime,
    cores: u32,
    busy_cores: u32,
    /// Service cost of each lock or unlock call.
    lock_cost: SimTime,
    stats_interval: SimTime,
    queue: VecDeque<Event>,
    locks: Vec<Lock>,
    rwlocks: Vec<RwLock>,
    // State of the current run.
    elapsed: SimTime,
    lock_called: bool,
    allow_no_time: bool,
    stats: CpuStats,
}

impl Cpu {
    pub fn new(node: NodeId, cores: u32, lock_cost: SimTime, stats_interval: SimTime) -> Self {
        assert!(cores > 0, "{node}: CPU needs at least one core");
        Self {
            node,
            now: Duration::ZERO,
            cores,
            busy_cores: 0,
            lock_cost,
            stats_interval,
            queue: VecDeque::new(),
            locks: Vec::new(),
            rwlocks: Vec::new(),
            elapsed: Duration::ZERO,
            lock_called: false,
            allow_no_time: false,
            stats: CpuStats::default(),
        }
    }

    /// Register a lock. All locks are created at protocol init.
    pub fn new_lock(&mut self) -> LockId {
        let id = LockId(self.locks.len() as u32);
        self.locks.push(Lock {
            locked: false,
            waiters: VecDeque::new(),
        });
        id
    }

    pub fn new_rwlock(&mut self) -> RwLockId {
        let id = RwLockId(self.rwlocks.len() as u32);
        self.rwlocks.push(RwLock {
            readers: 0,
            write_locked: false,
            waiters: VecDeque::new(),
        });
        id
    }

    /// Schedule the first queue-depth sample.
    pub fn arm_stats(&mut self, now: SimTime, sched: &mut dyn Scheduler) {
        sched.schedule_at(self.node, now + self.stats_interval, Event::CpuStatsTick);
    }

    /// Admit one delivered event. CPU-substrate events are consumed here;
    /// the returned event, if any, is the protocol run the caller must
    /// execute now (followed by [`Cpu::end_run`]).
    pub fn intake(&mut self, now: SimTime, event: Event, sched: &mut dyn Scheduler) -> Option<Event> {
        self.now = now;
        match event {
            Event::FreeCore => {
                self.busy_dec();
                self.next_in_queue(sched)
            }
            Event::RunQueued => {
                assert!(
                    !self.saturated(),
                    "{}: wake-up delivered to a saturated CPU at {:?}",
                    self.node,
                    now
                );
                self.next_in_queue(sched)
            }
            Event::CpuStatsTick => {
                self.sample_queue_depth();
                sched.schedule_at(self.node, now + self.stats_interval, Event::CpuStatsTick);
                None
            }
            event if event.is_lock_op() => self.lock_op(event, sched),
            event => {
                if self.saturated() {
                    trace!(node = %self.node, depth = self.queue.len() + 1,
                        kind = event.type_name(), "cpu saturated, queueing");
                    self.queue.push_back(event);
                    self.note_queue_depth();
                    None
                } else {
                    Some(self.begin_run(event))
                }
            }
        }
    }

    /// Account service time to the current run.
    pub fn add_time(&mut self, time: SimTime) {
        assert!(
            !self.lock_called,
            "{}: add_time after suspending on a lock",
            self.node
        );
        self.elapsed += time;
    }

    /// Permit the current run to end with zero accrued time.
    pub fn allow_no_time(&mut self) {
        self.allow_no_time = true;
    }

    pub fn elapsed_time(&self) -> SimTime {
        self.elapsed
    }

    /// Overwrite the accrued time. Statistics bookkeeping that should cost
    /// nothing saves and restores around its work.
    pub fn set_elapsed_time(&mut self, value: SimTime) {
        self.elapsed = value;
    }

    /// True once the current run has suspended on a lock; sends and
    /// self-scheduling are forbidden after that point.
    pub fn lock_called(&self) -> bool {
        self.lock_called
    }

    /// Suspend the current run to acquire `lock`; `cont` resumes under it.
    pub fn lock_acquire(&mut self, sched: &mut dyn Scheduler, lock: LockId, cont: Event) {
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::LockAcquire {
                lock,
                cont: Box::new(cont),
            },
        );
    }

    /// Suspend the current run to release `lock`; `cont`, if any, resumes
    /// outside the critical section.
    pub fn lock_release(&mut self, sched: &mut dyn Scheduler, lock: LockId, cont: Option<Event>) {
        assert!(
            self.locks[lock.0 as usize].locked,
            "{}: releasing {lock:?} while unlocked",
            self.node
        );
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::LockRelease {
                lock,
                cont: cont.map(Box::new),
            },
        );
    }

    pub fn rw_read_acquire(&mut self, sched: &mut dyn Scheduler, lock: RwLockId, cont: Event) {
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::RwReadAcquire {
                lock,
                cont: Box::new(cont),
            },
        );
    }

    pub fn rw_read_release(&mut self, sched: &mut dyn Scheduler, lock: RwLockId, cont: Option<Event>) {
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::RwReadRelease {
                lock,
                cont: cont.map(Box::new),
            },
        );
    }

    pub fn rw_write_acquire(&mut self, sched: &mut dyn Scheduler, lock: RwLockId, cont: Event) {
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::RwWriteAcquire {
                lock,
                cont: Box::new(cont),
            },
        );
    }

    pub fn rw_write_release(&mut self, sched: &mut dyn Scheduler, lock: RwLockId, cont: Option<Event>) {
        assert!(
            self.rwlocks[lock.0 as usize].write_locked,
            "{}: write-releasing {lock:?} while unlocked",
            self.node
        );
        self.add_time(self.lock_cost);
        self.suspend(
            sched,
            Event::RwWriteRelease {
                lock,
                cont: cont.map(Box::new),
            },
        );
    }

    /// Close the run started by [`Cpu::intake`]. Unless the run suspended
    /// on a lock, the core frees after the accrued time.
    pub fn end_run(&mut self, sched: &mut dyn Scheduler) {
        if !self.allow_no_time {
            assert!(
                self.elapsed > Duration::ZERO,
                "{}: run ended at {:?} without accounting any CPU time",
                self.node,
                self.now
            );
        }
        self.stats.busy_time += self.elapsed;
        self.stats.events_processed += 1;
        if !self.lock_called {
            sched.schedule_at(self.node, self.now + self.elapsed, Event::FreeCore);
        }
    }

    pub fn stats_document(&self) -> CpuStatsDocument {
        let samples = &self.stats.queue_depth_samples;
        let average = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<usize>() as f64 / samples.len() as f64
        };
        let usage = if self.now > Duration::ZERO {
            self.stats.busy_time.as_secs_f64() / self.now.as_secs_f64()
        } else {
            0.0
        };
        CpuStatsDocument {
            usage,
            events_processed: self.stats.events_processed,
            queue_depth_average: average,
            queue_depth_max: self
                .stats
                .max_queue_depth_samples
                .iter()
                .copied()
                .max()
                .unwrap_or(0),
            queue_depth_samples: samples.len(),
        }
    }

    fn saturated(&self) -> bool {
        self.busy_cores >= self.cores
    }

    fn busy_inc(&mut self) {
        assert!(self.busy_cores < self.cores);
        self.busy_cores += 1;
    }

    fn busy_dec(&mut self) {
        assert!(self.busy_cores > 0);
        self.busy_cores -= 1;
    }

    fn begin_run(&mut self, event: Event) -> Event {
        self.busy_inc();
        self.elapsed = Duration::ZERO;
        self.lock_called = false;
        self.allow_no_time = false;
        event
    }

    fn suspend(&mut self, sched: &mut dyn Scheduler, event: Event) {
        // One suspension per run: the continuation must re-enter through
        // the event queue before it can take another lock.
        assert!(
            !self.lock_called,
            "{}: run suspended twice at {:?}",
            self.node,
            self.now
        );
        self.lock_called = true;
        sched.schedule_at(self.node, self.now + self.elapsed, event);
    }

    fn next_in_queue(&mut self, sched: &mut dyn Scheduler) -> Option<Event> {
        let event = self.queue.pop_front()?;
        if event.is_lock_op() {
            // A woken acquire claims the core first, then the grant logic
            // hands it to the continuation or parks again.
            self.busy_inc();
            self.lock_op(event, sched)
        } else {
            Some(self.begin_run(event))
        }
    }

    fn lock_op(&mut self, event: Event, sched: &mut dyn Scheduler) -> Option<Event> {
        // Every lock op consumes the core slot its suspended run held.
        self.busy_dec();
        match event {
            Event::LockAcquire { lock, cont } => {
                let entry = &mut self.locks[lock.0 as usize];
                if entry.locked {
                    entry.waiters.push_back(Event::LockAcquire { lock, cont });
                    sched.schedule_at(self.node, self.now, Event::RunQueued);
                    None
                } else {
                    entry.locked = true;
                    Some(self.begin_run(*cont))
                }
            }
            Event::LockRelease { lock, cont } => {
                let entry = &mut self.locks[lock.0 as usize];
                assert!(entry.locked);
                entry.locked = false;
                if let Some(waiter) = entry.waiters.pop_front() {
                    self.queue.push_front(waiter);
                }
                match cont {
                    Some(cont) => Some(self.begin_run(*cont)),
                    None => self.next_in_queue(sched),
                }
            }
            Event::RwReadAcquire { lock, cont } => {
                let entry = &mut self.rwlocks[lock.0 as usize];
                if entry.write_locked && entry.readers == 0 {
                    entry.waiters.push_back(Event::RwReadAcquire { lock, cont });
                    sched.schedule_at(self.node, self.now, Event::RunQueued);
                    None
                } else {
                    entry.readers += 1;
                    if entry.readers == 1 {
                        entry.write_locked = true;
                    }
                    Some(self.begin_run(*cont))
                }
            }
            Event::RwReadRelease { lock, cont } => {
                let entry = &mut self.rwlocks[lock.0 as usize];
                assert!(entry.readers > 0);
                entry.readers -= 1;
                if entry.readers == 0 {
                    assert!(entry.write_locked);
                    entry.write_locked = false;
                    if let Some(waiter) = entry.waiters.pop_front() {
                        self.queue.push_front(waiter);
                    }
                }
                match cont {
                    Some(cont) => Some(self.begin_run(*cont)),
                    None => self.next_in_queue(sched),
                }
            }
            Event::RwWriteAcquire { lock, cont } => {
                let entry = &mut self.rwlocks[lock.0 as usize];
                if entry.write_locked {
                    entry.waiters.push_back(Event::RwWriteAcquire { lock, cont });
                    sched.schedule_at(self.node, self.now, Event::RunQueued);
                    None
                } else {
                    entry.write_locked = true;
                    Some(self.begin_run(*cont))
                }
            }
            Event::RwWriteRelease { lock, cont } => {
                let entry = &mut self.rwlocks[lock.0 as usize];
                assert!(entry.write_locked);
                entry.write_locked = false;
                if let Some(waiter) = entry.waiters.pop_front() {
                    self.queue.push_front(waiter);
                }
                match cont {
                    Some(cont) => Some(self.begin_run(*cont)),
                    None => self.next_in_queue(sched),
                }
            }
            other => unreachable!("{}: {} is not a lock op", self.node, other.type_name()),
        }
    }

    fn note_queue_depth(&mut self) {
        if self.queue.len() > self.stats.max_depth_since_sample {
            self.stats.max_depth_since_sample = self.queue.len();
        }
    }

    fn sample_queue_depth(&mut self) {
        self.stats.queue_depth_samples.push(self.queue.len());
        self.stats
            .max_queue_depth_samples
            .push(self.stats.max_depth_since_sample);
        self.stats.max_depth_since_sample = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainsim_core::ScalarEvent;

    const US: Duration = Duration::from_micros(1);

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[derive(Default)]
    struct Recorder {
        scheduled: Vec<(NodeId, SimTime, Event)>,
    }

    impl Scheduler for Recorder {
        fn schedule_at(&mut self, to: NodeId, at: SimTime, event: Event) {
            self.scheduled.push((to, at, event));
        }
    }

    fn cpu(cores: u32) -> Cpu {
        Cpu::new(NodeId(0), cores, US, Duration::from_millis(100))
    }

    fn tick() -> Event {
        Event::Scalar(ScalarEvent::ClockTick)
    }

    fn tick_locked() -> Event {
        Event::Scalar(ScalarEvent::ClockTickLocked)
    }

    #[test]
    fn test_run_frees_core_after_accrued_time() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let run = cpu.intake(us(10), tick(), &mut sched);
        assert_eq!(run, Some(tick()));
        cpu.add_time(us(3));
        cpu.end_run(&mut sched);
        assert_eq!(sched.scheduled.len(), 1);
        let (to, at, ref event) = sched.scheduled[0];
        assert_eq!(to, NodeId(0));
        assert_eq!(at, us(13));
        assert_eq!(*event, Event::FreeCore);
    }

    #[test]
    #[should_panic(expected = "without accounting any CPU time")]
    fn test_zero_time_run_panics() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        cpu.intake(us(10), tick(), &mut sched);
        cpu.end_run(&mut sched);
    }

    #[test]
    fn test_allow_no_time_escape_hatch() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        cpu.intake(us(10), tick(), &mut sched);
        cpu.allow_no_time();
        cpu.end_run(&mut sched);
        assert_eq!(sched.scheduled[0].1, us(10));
    }

    #[test]
    fn test_saturated_cpu_queues_and_frees_in_fifo_order() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let run = cpu.intake(us(0), tick(), &mut sched);
        assert!(run.is_some());
        cpu.add_time(us(5));

        // Second and third events arrive while the core is busy.
        assert_eq!(cpu.intake(us(1), tick(), &mut sched), None);
        assert_eq!(
            cpu.intake(us(2), Event::Scalar(ScalarEvent::StartGstRound), &mut sched),
            None
        );
        cpu.end_run(&mut sched);

        // The FreeCore starts the oldest queued event.
        let run = cpu.intake(us(5), Event::FreeCore, &mut sched);
        assert_eq!(run, Some(tick()));
        cpu.add_time(us(1));
        cpu.end_run(&mut sched);

        let run = cpu.intake(us(6), Event::FreeCore, &mut sched);
        assert_eq!(run, Some(Event::Scalar(ScalarEvent::StartGstRound)));
    }

    #[test]
    fn test_lock_suspension_schedules_acquire_after_elapsed() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let lock = cpu.new_lock();
        cpu.intake(us(0), tick(), &mut sched);
        cpu.add_time(us(2));
        cpu.lock_acquire(&mut sched, lock, tick_locked());
        assert!(cpu.lock_called());
        cpu.end_run(&mut sched);

        // One message: the acquire at now + elapsed (2us + 1us lock cost).
        // No FreeCore; the suspended run keeps its core.
        assert_eq!(sched.scheduled.len(), 1);
        let (_, at, ref event) = sched.scheduled[0];
        assert_eq!(at, us(3));
        assert!(matches!(event, Event::LockAcquire { .. }));
    }

    #[test]
    #[should_panic(expected = "add_time after suspending")]
    fn test_add_time_after_suspension_panics() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let lock = cpu.new_lock();
        cpu.intake(us(0), tick(), &mut sched);
        cpu.add_time(us(2));
        cpu.lock_acquire(&mut sched, lock, tick_locked());
        cpu.add_time(us(1));
    }

    #[test]
    #[should_panic]
    fn test_double_suspension_panics() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let lock = cpu.new_lock();
        cpu.intake(us(0), tick(), &mut sched);
        cpu.add_time(us(2));
        cpu.lock_acquire(&mut sched, lock, tick_locked());
        cpu.lock_acquire(&mut sched, lock, tick_locked());
    }

    #[test]
    fn test_free_lock_grant_runs_continuation_immediately() {
        let mut cpu = cpu(1);
        let mut sched = Recorder::default();
        let lock = cpu.new_lock();
        cpu.intake(us(0), tick(), &mut sched);
        cpu.add_time(us(2));
        cpu.lock_acquire(&mut sched, lock, tick_locked());
        cpu.end_run(&mut sched);

        // Deliver the acquire: the lock is free, so the continuation runs
        // in the same delivery, reusing the suspended run's core.
        let run = cpu.intake(us(3), sched.scheduled.remove(0).2, &mut sched);
        assert_eq!(run, Some(tick_locked()));
        cpu.add_time(us(1));
        cpu.lock_release(&mut sched, lock, None);
        cpu.end_run(&mut sched);
    }

    #[test]
    fn test_contended_lock_parks_and_wakes_on_release() {
        let mut cpu = cpu(2);
        let mut sched = Recorder::default();
        let lock = cpu.new_lock();

        // First run takes the lock; its locked stage holds it for a while
        // before releasing.
        cpu.intake(us(0), tick(), &mut sched);
        cpu.add_time(us(1));
        cpu.lock_acquire(&mut sched, lock, tick_locked());
        cpu.end_run(&mut sched);
        let acquire1 = sched.scheduled.remove(0).2;
        let run = cpu.intake(us(2), acquire1, &mut sched);
        assert_eq!(run, Some(tick_locked()));
        cpu.add_time(us(10));
        cpu.lock_release(&mut sched, lock, None);
        cpu.end_run(&mut sched);
        let release = sched.scheduled.remove(0).2;
        assert!(matches!(release, Event::LockRelease { .. }));

        // Second run wants the same lock before the release is delivered
        // and parks; parking frees the core with a zero-delay wake-up.
        let run = cpu.intake(us(3), tick(), &mut sched);
        assert_eq!(run, Some(tick()));
        cpu.add_time(us(1));
        cpu.lock_acquire(&mut sched, lock, Event::Scalar(ScalarEvent::LstRootLocked));
        cpu.end_run(&mut sched);
        let acquire2 = sched.scheduled.remove(0).2;
        assert_eq!(cpu.intake(us(5), acquire2, &mut sched), None);
        assert_eq!(sched.scheduled.remove(0), (NodeId(0), us(5), Event::RunQueued));
        assert_eq!(cpu.intake(us(5), Event::RunQueued, &mut sched), None);

        // Release delivered: the parked acquire is woken and, the lock now
        // free, granted in the same delivery.
        let run = cpu.intake(us(13), release, &mut sched);
        assert_eq!(run, Some(Event::Scalar(ScalarEvent::LstRootLocked)));
    }

    #[test]
    fn test_rwlock_readers_share_writer_waits() {
        let mut cpu = cpu(3);
        let mut sched = Recorder::default();
        let rw = cpu.new_rwlock();

        // Two readers in; each locked stage releases before ending its run,
        // but the releases stay undelivered until later.
        let mut releases = Vec::new();
        for n in 0..2 {
            cpu.intake(us(n), tick(), &mut sched);
            cpu.add_time(us(1));
            cpu.rw_read_acquire(&mut sched, rw, tick_locked());
            cpu.end_run(&mut sched);
            let acquire = sched.scheduled.remove(0).2;
            assert!(cpu.intake(us(n + 1), acquire, &mut sched).is_some());
            cpu.add_time(us(10));
            cpu.rw_read_release(&mut sched, rw, None);
            cpu.end_run(&mut sched);
            releases.push(sched.scheduled.remove(0).2);
        }

        // Writer parks behind the two readers.
        cpu.intake(us(3), tick(), &mut sched);
        cpu.add_time(us(1));
        cpu.rw_write_acquire(&mut sched, rw, Event::Scalar(ScalarEvent::LstRootLocked));
        cpu.end_run(&mut sched);
        let acquire = sched.scheduled.remove(0).2;
        assert_eq!(cpu.intake(us(4), acquire, &mut sched), None);
        assert!(matches!(sched.scheduled.remove(0).2, Event::RunQueued));
        assert_eq!(cpu.intake(us(4), Event::RunQueued, &mut sched), None);

        // First reader out: writer still waits.
        assert_eq!(cpu.intake(us(11), releases.remove(0), &mut sched), None);

        // Last reader out: writer woken and granted.
        let run = cpu.intake(us(12), releases.remove(0), &mut sched);
        assert_eq!(run, Some(Event::Scalar(ScalarEvent::LstRootLocked)));
    }
}
