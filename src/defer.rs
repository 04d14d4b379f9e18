//! The two deferral operations. Both are pass-throughs to the scheduler's
//! queue classes; any state the callback needs is captured by the closure.

use crate::scheduler::{Scheduler, Task};

/// Run `task` once the currently executing synchronous code returns, before
/// any deferred or timer callback already pending. Tasks submitted this way
/// in the same turn run in submission order. Returns at once; there is no
/// cancellation handle.
pub fn this_tick<S: Scheduler + ?Sized>(sched: &S, task: impl Task) {
  sched.run_soon(Box::new(task))
}

/// Run `task` after the current phase, including every [this_tick] callback
/// queued in the same turn, but before the next timer phase. Same ordering
/// and non-blocking guarantees as [this_tick].
pub fn later_tick<S: Scheduler + ?Sized>(sched: &S, task: impl Task) {
  sched.run_after_soon(Box::new(task))
}

/// [this_tick] under the name callers who think in loop iterations expect
pub use self::this_tick as this_iteration;

/// [later_tick] under the name callers who think in loop iterations expect
pub use self::later_tick as later_iteration;

#[cfg(test)]
mod test {
  use std::cell::RefCell;
  use std::rc::Rc;

  use super::{later_iteration, later_tick, this_iteration, this_tick};
  use crate::scheduler::{Scheduler, Task};

  /// Records the queue class of every submission instead of yielding
  /// control, so ordering is observable without a live loop
  #[derive(Default)]
  struct Recorder(RefCell<Vec<(&'static str, Box<dyn Task>)>>);
  impl Recorder {
    fn classes(&self) -> Vec<&'static str> {
      self.0.borrow().iter().map(|(class, _)| *class).collect()
    }
    fn run_all(&self) {
      let submissions = self.0.borrow_mut().split_off(0);
      for (_, task) in submissions {
        task()
      }
    }
  }
  impl Scheduler for Recorder {
    fn run_soon(&self, task: Box<dyn Task>) {
      self.0.borrow_mut().push(("soon", task))
    }
    fn run_after_soon(&self, task: Box<dyn Task>) {
      self.0.borrow_mut().push(("after_soon", task))
    }
  }

  #[test]
  fn operations_map_to_their_queue_class() {
    let rec = Recorder::default();
    this_tick(&rec, || ());
    later_tick(&rec, || ());
    this_iteration(&rec, || ());
    later_iteration(&rec, || ());
    assert_eq!(rec.classes(), ["soon", "after_soon", "soon", "after_soon"]);
  }

  #[test]
  fn submission_returns_before_the_task_runs() {
    let rec = Recorder::default();
    let ran = Rc::new(RefCell::new(false));
    this_tick(&rec, {
      let ran = ran.clone();
      move || *ran.borrow_mut() = true
    });
    assert!(!*ran.borrow(), "the task must not run inside this_tick");
    rec.run_all();
    assert!(*ran.borrow());
  }

  #[test]
  fn captured_state_reaches_the_task_untouched() {
    let rec = Recorder::default();
    let receiver = Rc::new("receiver");
    let observed = Rc::new(RefCell::new(None));
    later_tick(&rec, {
      let capture = receiver.clone();
      let observed = observed.clone();
      move || *observed.borrow_mut() = Some(capture)
    });
    assert!(observed.borrow().is_none());
    rec.run_all();
    let seen = observed.borrow_mut().take().expect("the task ran");
    assert!(Rc::ptr_eq(&receiver, &seen), "the capture was passed through");
  }

  #[test]
  fn resubmission_is_not_deduplicated() {
    let rec = Recorder::default();
    let count = Rc::new(RefCell::new(0));
    let bump = {
      let count = count.clone();
      move || *count.borrow_mut() += 1
    };
    this_tick(&rec, bump.clone());
    this_tick(&rec, bump);
    rec.run_all();
    assert_eq!(*count.borrow(), 2);
  }
}
