use std::{
  cell::Cell,
  time::{Duration, Instant},
};

/// Cooperative cancellation seam threaded through catalog construction and
/// the solver. The solver polls it at every search node and before every
/// emission; once it reports cancelled, the grid sequence ends cleanly.
pub trait Context {
  fn is_cancelled(&self) -> bool;
}

/// A context that never cancels.
pub struct Unbounded;

impl Context for Unbounded {
  fn is_cancelled(&self) -> bool {
    false
  }
}

/// Wall-clock deadline: cancelled once the deadline passes.
pub struct Deadline {
  deadline: Instant,
}

impl Deadline {
  pub fn after(timeout: Duration) -> Self {
    Self { deadline: Instant::now() + timeout }
  }

  pub fn at(deadline: Instant) -> Self {
    Self { deadline }
  }
}

impl Context for Deadline {
  fn is_cancelled(&self) -> bool {
    Instant::now() >= self.deadline
  }
}

/// A shared flag the caller flips, e.g. from a consumer loop deciding it has
/// seen enough.
impl Context for Cell<bool> {
  fn is_cancelled(&self) -> bool {
    self.get()
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

  use std::{cell::Cell, time::Duration};

  use googletest::prelude::*;

  use super::{Context, Deadline, Unbounded};

  #[gtest]
  fn test_unbounded_never_cancels() {
    expect_false!(Unbounded.is_cancelled());
  }

  #[gtest]
  fn test_deadline_expires() {
    let ctx = Deadline::after(Duration::from_secs(3600));
    expect_false!(ctx.is_cancelled());

    let expired = Deadline::after(Duration::ZERO);
    expect_true!(expired.is_cancelled());
  }

  #[gtest]
  fn test_flag_flips() {
    let flag = Cell::new(false);
    expect_false!(flag.is_cancelled());
    flag.set(true);
    expect_true!(flag.is_cancelled());
  }
}
