
//! Terminators for controlling and interrupting long-running solves.
//!
//! This module provides several implementations of the [`Terminator`] trait, including:
//! - [`NoOpTerminator`]: Never triggers; used when no limit is configured.
//! - [`InterruptTerminator`]: Responds to Ctrl-C (SIGINT) or programmatic interrupts.
//! - [`TimeOutTerminator`]: Terminates after a specified wall-clock limit.
//! - [`MultipleTerminators`]: Combines multiple terminators.
//!
//! The engines poll the terminator between simplex iterations and between
//! branch-and-bound nodes; termination is therefore cooperative and advisory.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and **can only be constructed once** per process. Attempting to create multiple instances will result in a panic.

use std::sync::{Arc, atomic::AtomicBool};
use std::time::Duration;

use crate::Status;


pub trait Terminator {
  fn initialize(&mut self) {}

  fn terminate(&mut self) -> Option<Status>;
}


/// Terminator that never triggers.
pub struct NoOpTerminator {}

impl NoOpTerminator {
  pub fn new() -> Self {
    Self {}
  }
}

impl Default for NoOpTerminator {
  fn default() -> Self {
    Self::new()
  }
}

impl Terminator for NoOpTerminator {
  fn terminate(&mut self) -> Option<Status> {
    None
  }
}


/// Terminator that responds to Ctrl-C (SIGINT) or programmatic interrupts.
///
/// # Note
/// Only one instance of `InterruptTerminator` can be constructed per process, as it installs a global signal handler.
/// Creating more than one will panic.
pub struct InterruptTerminator {
  interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
  pub fn new() -> Self {
    let interrupted = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
      let interrupted_clone = interrupted.clone();
      move || {
        interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
      }
    }).expect("Error setting Ctrl-C handler");
    Self { interrupted }
  }

  pub fn interrupt(&mut self) {
    self.interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
  }
}

impl Terminator for InterruptTerminator {
  fn terminate(&mut self) -> Option<Status> {
    if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
      Some(Status::Interrupted)
    } else {
      None
    }
  }
}


/// Terminator that triggers once the elapsed wall-clock time exceeds the limit.
///
/// The limit has millisecond granularity; `initialize` restarts the clock so a
/// single instance can be reused across solves.
pub struct TimeOutTerminator {
  max_time: Duration,
  start_time: std::time::Instant,
}

impl TimeOutTerminator {
  pub fn new(max_time: Duration) -> Self {
    Self {
      max_time,
      start_time: std::time::Instant::now(),
    }
  }
}

impl Terminator for TimeOutTerminator {
  fn initialize(&mut self) {
    self.start_time = std::time::Instant::now();
  }

  fn terminate(&mut self) -> Option<Status> {
    if self.start_time.elapsed() >= self.max_time {
      Some(Status::TimedOut)
      } else {
        None
      }
  }
}



/// Terminator that combines multiple terminators and triggers if any of them do.
pub struct MultipleTerminators {
  terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
  pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
    Self { terminators }
  }
}

impl Terminator for MultipleTerminators {
  fn initialize(&mut self) {
    for terminator in &mut self.terminators {
      terminator.initialize();
    }
  }

  fn terminate(&mut self) -> Option<Status> {
    for terminator in &mut self.terminators {
      if let Some(status) = terminator.as_mut().terminate() {
        return Some(status);
      }
    }
    None
  }
}
