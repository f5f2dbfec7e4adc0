use std::fmt::{Debug, Display, Formatter};

use crate::charset::BLOCKED;

/// One fully-decided line: its cell sequence over the 27-symbol alphabet and
/// the dictionary words it contains, in reading order.
///
/// Invariant: joining `words` with blocked cells at the recorded positions
/// reproduces `cells` exactly.
#[derive(Clone, PartialEq, Eq)]
pub struct ConcreteLine {
  cells: Vec<char>,
  words: Vec<String>,
}

impl ConcreteLine {
  pub fn from_word(word: &str) -> Self {
    Self {
      cells: word.chars().collect(),
      words: vec![word.to_owned()],
    }
  }

  pub fn cells(&self) -> &[char] {
    &self.cells
  }

  pub fn words(&self) -> &[String] {
    &self.words
  }

  pub fn num_letters(&self) -> usize {
    self.cells.len()
  }

  /// The cell sequence as a string.
  pub fn text(&self) -> String {
    self.cells.iter().collect()
  }

  pub(crate) fn blocked_before(inner: &ConcreteLine) -> Self {
    let mut cells = Vec::with_capacity(inner.cells.len() + 1);
    cells.push(BLOCKED);
    cells.extend_from_slice(&inner.cells);
    Self { cells, words: inner.words.clone() }
  }

  pub(crate) fn blocked_after(inner: &ConcreteLine) -> Self {
    let mut cells = Vec::with_capacity(inner.cells.len() + 1);
    cells.extend_from_slice(&inner.cells);
    cells.push(BLOCKED);
    Self { cells, words: inner.words.clone() }
  }

  pub(crate) fn blocked_between(first: &ConcreteLine, second: &ConcreteLine) -> Self {
    let mut cells = Vec::with_capacity(first.cells.len() + 1 + second.cells.len());
    cells.extend_from_slice(&first.cells);
    cells.push(BLOCKED);
    cells.extend_from_slice(&second.cells);

    let mut words = Vec::with_capacity(first.words.len() + second.words.len());
    words.extend_from_slice(&first.words);
    words.extend_from_slice(&second.words);
    Self { cells, words }
  }
}

impl Display for ConcreteLine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.text())
  }
}

impl Debug for ConcreteLine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "ConcreteLine({:?}, words: {:?})", self.text(), self.words)
  }
}
