//! A deterministic, single-threaded stand-in for the host runtime's event
//! loop. It owns the two queue classes the [Scheduler] contract names plus a
//! one-shot timer phase, and drains them in a fixed order so relative
//! scheduling of callbacks is reproducible in tests and embedders alike.

use std::cell::RefCell;
use std::collections::{BinaryHeap, VecDeque};
use std::mem;
use std::rc::Rc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::scheduler::{Scheduler, Task};

/// A unit of work to run when a point in time passes
///
/// In order to work with Rust's builtin [BinaryHeap] which is a max heap,
/// the [Ord] implementation of this struct is reversed; it can be
/// intuitively thought of as ordering by urgency.
struct Timer {
  expires: Instant,
  task: Box<dyn Task>,
}
impl Eq for Timer {}
impl PartialEq for Timer {
  fn eq(&self, other: &Self) -> bool { self.expires.eq(&other.expires) }
}
impl PartialOrd for Timer {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for Timer {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    other.expires.cmp(&self.expires)
  }
}

#[derive(Default)]
struct Queues {
  soon: VecDeque<Box<dyn Task>>,
  deferred: VecDeque<Box<dyn Task>>,
  timers: BinaryHeap<Timer>,
}

/// A cooperative event loop with two queue classes and a timer phase.
///
/// Every callback runs on the thread that calls [EventLoop::run], one at a
/// time. The loop holds no state other than its queues; dropping it drops
/// any work that never ran.
pub struct EventLoop {
  queues: Rc<RefCell<Queues>>,
}

impl EventLoop {
  /// Create an empty loop
  #[must_use]
  pub fn new() -> Self {
    Self { queues: Rc::new(RefCell::new(Queues::default())) }
  }

  /// Obtain a handle for enqueueing work onto this loop. Handles can be
  /// cloned freely, including from inside running callbacks.
  #[must_use]
  pub fn handle(&self) -> LoopHandle { LoopHandle(self.queues.clone()) }

  /// Run scheduled work until both queue classes and the timer heap are
  /// empty, then return.
  ///
  /// Each pass drains the soon queue to exhaustion, runs the deferred batch
  /// that was pending when the pass reached it, then runs every timer whose
  /// expiry has passed, re-draining the soon queue after each callback.
  /// Deferred work scheduled inside the deferred phase lands in the next
  /// pass, behind any timers that come due in between, so a task that keeps
  /// re-deferring itself cannot starve the timer phase. When only unexpired
  /// timers remain the loop sleeps until the earliest expiry.
  ///
  /// A callback that panics unwinds straight through this function.
  pub fn run(&mut self) {
    loop {
      self.drain_soon();
      let batch = mem::take(&mut self.queues.borrow_mut().deferred);
      if !batch.is_empty() {
        trace!(count = batch.len(), "running deferred batch");
      }
      for task in batch {
        task();
        self.drain_soon();
      }
      while let Some(task) = self.pop_due_timer() {
        task();
        self.drain_soon();
      }
      let expires = {
        let queues = self.queues.borrow();
        if !queues.soon.is_empty() || !queues.deferred.is_empty() {
          continue;
        }
        match queues.timers.peek() {
          Some(timer) => timer.expires,
          None => return,
        }
      };
      trace!("idle until the next timer expires");
      sleep(expires.saturating_duration_since(Instant::now()));
    }
  }

  fn drain_soon(&self) {
    while let Some(task) = self.pop_soon() {
      task()
    }
  }

  fn pop_soon(&self) -> Option<Box<dyn Task>> {
    self.queues.borrow_mut().soon.pop_front()
  }

  fn pop_due_timer(&self) -> Option<Box<dyn Task>> {
    let mut queues = self.queues.borrow_mut();
    let due = match queues.timers.peek() {
      Some(timer) => timer.expires <= Instant::now(),
      None => false,
    };
    due.then(|| queues.timers.pop().expect("checked above").task)
  }
}

impl Default for EventLoop {
  fn default() -> Self { Self::new() }
}

/// Cheaply cloneable enqueue half of an [EventLoop]. Implements [Scheduler],
/// and additionally arms one-shot timers for the loop's final phase.
///
/// The handle shares the loop's queues, so it is bound to the loop's thread;
/// cross-thread submission is out of scope for a cooperative loop.
#[derive(Clone)]
pub struct LoopHandle(Rc<RefCell<Queues>>);

impl LoopHandle {
  /// Run `task` once `delay` has passed, after all soon and deferred work
  /// pending at that point. A zero delay still loses to both queue classes.
  /// Timers fire in expiry order and cannot be cancelled.
  pub fn set_timeout(&self, delay: Duration, task: impl Task) {
    trace!(?delay, "timer armed");
    let timer = Timer { expires: Instant::now() + delay, task: Box::new(task) };
    self.0.borrow_mut().timers.push(timer)
  }
}

impl Scheduler for LoopHandle {
  fn run_soon(&self, task: Box<dyn Task>) {
    trace!("task queued for this tick");
    self.0.borrow_mut().soon.push_back(task)
  }
  fn run_after_soon(&self, task: Box<dyn Task>) {
    trace!("task queued for a later tick");
    self.0.borrow_mut().deferred.push_back(task)
  }
}
