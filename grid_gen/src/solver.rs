use std::{
  cell::RefCell,
  collections::{HashSet, VecDeque},
  vec,
};

use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom};
use util::{
  grid::{Grid as CellGrid, Gridlike},
  pos::Diff,
};

use crate::{
  charset::CharSet,
  context::Context,
  grid::Grid,
  line::ConcreteLine,
  possible_lines::PossibleLines,
};

/// Boards more blocked than this are not worth enumerating.
const MAX_BLOCKED_PERCENT: u64 = 25;
/// At or above this many candidates, a line is split by `make_choice` rather
/// than enumerated concretely.
const BINARY_CHOICE_THRESHOLD: u64 = 10;
const MAX_PREFILTER_PASSES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
  Horizontal,
  Vertical,
}

impl Direction {
  fn flip(self) -> Self {
    match self {
      Direction::Horizontal => Direction::Vertical,
      Direction::Vertical => Direction::Horizontal,
    }
  }
}

/// The rows and columns of one search node.
///
/// Entries are shared by reference: a child state clones the vectors but not
/// the `PossibleLines` values it leaves untouched.
#[derive(Clone)]
struct GridState<'a> {
  across: Vec<PossibleLines>,
  down: Vec<PossibleLines>,
  rng: &'a RefCell<StdRng>,
}

impl<'a> GridState<'a> {
  fn new(all_lines: PossibleLines, line_length: usize, rng: &'a RefCell<StdRng>) -> Self {
    Self {
      across: vec![all_lines.clone(); line_length],
      down: vec![all_lines; line_length],
      rng,
    }
  }

  fn line_length(&self) -> usize {
    self.down.len()
  }

  fn lines(&self, dir: Direction) -> &[PossibleLines] {
    match dir {
      Direction::Horizontal => &self.across,
      Direction::Vertical => &self.down,
    }
  }

  fn cross_lines(&self, dir: Direction) -> &[PossibleLines] {
    match dir {
      Direction::Horizontal => &self.down,
      Direction::Vertical => &self.across,
    }
  }

  fn with_axes(
    &self,
    dir: Direction,
    option_axis: Vec<PossibleLines>,
    opposite_axis: Vec<PossibleLines>,
  ) -> GridState<'a> {
    match dir {
      Direction::Horizontal => GridState {
        across: option_axis,
        down: opposite_axis,
        rng: self.rng,
      },
      Direction::Vertical => GridState {
        down: option_axis,
        across: opposite_axis,
        rng: self.rng,
      },
    }
  }

  fn any_impossible(&self) -> bool {
    self
      .down
      .iter()
      .chain(&self.across)
      .any(|line| line.max_possibilities() == 0)
  }

  fn has_duplicate_definite_words(&self) -> bool {
    let mut existing = HashSet::new();
    self
      .down
      .iter()
      .chain(&self.across)
      .flat_map(PossibleLines::definite_words)
      .any(|word| !existing.insert(word))
  }

  fn definitely_blocked_cells(&self) -> u64 {
    (0..self.line_length())
      .map(|i| {
        self
          .down
          .iter()
          .filter(|line| line.definitely_blocked_at(i))
          .count() as u64
      })
      .sum()
  }

  /// One propagation pass: narrow every line on `dir`'s axis to the symbols
  /// the crossing axis still allows at each shared cell. Returns the new
  /// state and whether any line shrank.
  fn prefilter(&self, ctx: &dyn Context, dir: Direction) -> (GridState<'a>, bool) {
    if self.any_impossible() || ctx.is_cancelled() {
      return (self.clone(), false);
    }

    let (to_filter, constraint) = match dir {
      Direction::Horizontal => (&self.across, &self.down),
      Direction::Vertical => (&self.down, &self.across),
    };

    // available[i][j]: the symbols constraint line i allows at its cell j.
    let available = constraint
      .iter()
      .map(|line| {
        (0..line.num_letters())
          .map(|j| {
            let mut cs = CharSet::new();
            line.chars_at(&mut cs, j);
            cs
          })
          .collect_vec()
      })
      .collect_vec();

    let mut filtered = to_filter.clone();
    let mut any_changed = false;
    for j in 0..filtered.len() {
      let line = &filtered[j];

      let all_full = (0..line.num_letters()).all(|i| available[i][j].is_full());
      if all_full {
        continue;
      }

      let mut new_line = line.clone();
      for i in 0..new_line.num_letters() {
        new_line = new_line.filter_any(&available[i][j], i);
      }
      if !new_line.same(&filtered[j]) {
        any_changed = true;
        filtered[j] = new_line;
      }
    }

    let state = match dir {
      Direction::Horizontal => GridState {
        across: filtered,
        down: constraint.clone(),
        rng: self.rng,
      },
      Direction::Vertical => GridState {
        down: filtered,
        across: constraint.clone(),
        rng: self.rng,
      },
    };
    (state, any_changed)
  }

  /// The most-constrained undecided line on this axis: minimal candidate
  /// count among lines still holding more than one, ties broken uniformly at
  /// random.
  fn undecided_index(&self, dir: Direction) -> Option<usize> {
    let lines = self.lines(dir);

    let least = lines
      .iter()
      .map(PossibleLines::max_possibilities)
      .filter(|&p| p > 1)
      .min()?;

    let opts = lines
      .iter()
      .enumerate()
      .filter(|(_, line)| line.max_possibilities() == least)
      .map(|(idx, _)| idx)
      .collect_vec();
    let mut rng = self.rng.borrow_mut();
    opts.choose(&mut *rng).copied()
  }

  /// True when the definitely-blocked cells split the board into
  /// disconnected regions (4-neighbour flood fill from the first open cell).
  fn is_divided(&self) -> bool {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    enum Explore {
      #[default]
      Unvisited,
      Visited,
      Blocked,
    }

    let n = self.line_length() as u32;
    let mut board: CellGrid<Explore> = CellGrid::new(n, n);
    for pos in board.positions() {
      if self.down[pos.x as usize].definitely_blocked_at(pos.y as usize)
        || self.across[pos.y as usize].definitely_blocked_at(pos.x as usize)
      {
        if let Some(cell) = board.get_mut(pos) {
          *cell = Explore::Blocked;
        }
      }
    }

    let mut explore = VecDeque::new();
    explore.extend(
      board
        .positions()
        .find(|&pos| board.get(pos) == Some(&Explore::Unvisited)),
    );

    while let Some(pos) = explore.pop_front() {
      if board.get(pos) != Some(&Explore::Unvisited) {
        continue;
      }
      if let Some(cell) = board.get_mut(pos) {
        *cell = Explore::Visited;
      }

      for diff in Diff::CARDINALS {
        let next = pos + diff;
        if board.get(next) == Some(&Explore::Unvisited) {
          explore.push_back(next);
        }
      }
    }

    board
      .positions()
      .any(|pos| board.get(pos) == Some(&Explore::Unvisited))
  }
}

fn definite_block_count(line: &PossibleLines) -> usize {
  (0..line.num_letters())
    .filter(|&i| line.definitely_blocked_at(i))
    .count()
}

enum Frame<'a> {
  /// A fresh state: prune, propagate, then either emit or branch.
  Expand(GridState<'a>),
  /// Binary-split enumeration of a large option set.
  Choices {
    state: GridState<'a>,
    dir: Direction,
    index: usize,
    options: PossibleLines,
  },
  /// Concrete enumeration of a small option set.
  Attempts {
    state: GridState<'a>,
    dir: Direction,
    index: usize,
    attempts: vec::IntoIter<ConcreteLine>,
  },
}

/// Lazy pull-sequence of solved grids.
///
/// The backtracking search is unwound onto an explicit frame stack so that
/// each `next()` call runs exactly until the next emission (or exhaustion),
/// and cancellation is observed at every node.
pub struct Grids<'a> {
  ctx: &'a dyn Context,
  stack: Vec<Frame<'a>>,
  seen: HashSet<String>,
}

impl<'a> Grids<'a> {
  pub(crate) fn new(
    ctx: &'a dyn Context,
    all_lines: PossibleLines,
    line_length: usize,
    rng: &'a RefCell<StdRng>,
  ) -> Self {
    let root = GridState::new(all_lines, line_length, rng);
    Self {
      ctx,
      stack: vec![Frame::Expand(root)],
      seen: HashSet::new(),
    }
  }

  fn expand(&mut self, state: GridState<'a>) -> Option<Grid> {
    if state.any_impossible() {
      return None;
    }
    if state.has_duplicate_definite_words() {
      return None;
    }

    let prior_blocked = state.definitely_blocked_cells();

    let mut state = state;
    let mut dir = Direction::Horizontal;
    for pass in 0..MAX_PREFILTER_PASSES {
      let (new_state, changed) = state.prefilter(self.ctx, dir);
      if !changed && pass > 1 {
        break;
      }
      state = new_state;
      dir = dir.flip();
    }

    if state.any_impossible() {
      return None;
    }

    let n = state.line_length() as u64;
    let blocked = state.definitely_blocked_cells();
    if blocked > n * n * MAX_BLOCKED_PERCENT / 100 {
      return None;
    }

    // Only re-check connectivity when propagation pinned down new blocks.
    if blocked > prior_blocked && state.is_divided() {
      return None;
    }

    let undecided_down = state.undecided_index(Direction::Vertical);
    let undecided_across = state.undecided_index(Direction::Horizontal);

    match (undecided_across, undecided_down) {
      (None, None) => self.emit(&state),
      (Some(a), None) => {
        self.push_branch(state, Direction::Horizontal, a);
        None
      }
      (None, Some(d)) => {
        self.push_branch(state, Direction::Vertical, d);
        None
      }
      (Some(a), Some(d)) => {
        if state.down[d].max_possibilities() <= state.across[a].max_possibilities() {
          self.push_branch(state, Direction::Vertical, d);
        } else {
          self.push_branch(state, Direction::Horizontal, a);
        }
        None
      }
    }
  }

  fn emit(&mut self, state: &GridState) -> Option<Grid> {
    let mut rows = Vec::with_capacity(state.line_length());
    for i in 0..state.line_length() {
      let a = state.across[i].first()?;
      let d = state.down[i].first()?;

      // A row identical to its same-index column is not a viable grid.
      if a.cells() == d.cells() {
        return None;
      }
      rows.push(a.cells().to_vec());
    }

    let grid = Grid::from_rows(rows).ok()?;
    self.seen.insert(grid.repr()).then_some(grid)
  }

  fn push_branch(&mut self, state: GridState<'a>, dir: Direction, index: usize) {
    // Trim states where some decided line already equals its crossing line.
    let option_axis = state.lines(dir);
    let opposite_axis = state.cross_lines(dir);
    for i in 0..option_axis.len() {
      if option_axis[i].max_possibilities() > 1 || opposite_axis[i].max_possibilities() > 1 {
        continue;
      }
      match (option_axis[i].first(), opposite_axis[i].first()) {
        (Some(opt), Some(opp)) if opt.cells() != opp.cells() => {}
        _ => return,
      }
    }

    let options = option_axis[index].clone();
    if options.max_possibilities() <= 1 {
      return;
    }

    if options.max_possibilities() >= BINARY_CHOICE_THRESHOLD {
      self.stack.push(Frame::Choices { state, dir, index, options });
    } else {
      let attempts = options.iterate().collect_vec().into_iter();
      self.stack.push(Frame::Attempts { state, dir, index, attempts });
    }
  }

  fn step_choices(
    &mut self,
    state: GridState<'a>,
    dir: Direction,
    index: usize,
    options: PossibleLines,
  ) {
    match options.max_possibilities() {
      0 => return,
      1 => {
        // Down to a single candidate: enumerate it concretely.
        let attempts = options.iterate().collect_vec().into_iter();
        self.stack.push(Frame::Attempts { state, dir, index, attempts });
        return;
      }
      _ => {}
    }

    let step = options.make_choice();

    let mut option_axis = state.lines(dir).to_vec();
    option_axis[index] = step.choice.clone();
    let opposite_axis = state.cross_lines(dir).to_vec();

    // A decided pair of crossing lines with the same cells invalidates every
    // state this enumeration could reach.
    for k in 0..opposite_axis.len() {
      let first = &opposite_axis[k];
      let second = &option_axis[k];
      if first.max_possibilities() > 1 || second.max_possibilities() > 1 {
        continue;
      }
      if let (Some(f), Some(s)) = (first.first(), second.first()) {
        if f.cells() == s.cells() {
          return;
        }
      }
    }

    let child = state.with_axes(dir, option_axis, opposite_axis);

    if definite_block_count(&step.choice) > definite_block_count(&options) && child.is_divided() {
      return;
    }

    self.stack.push(Frame::Choices {
      state,
      dir,
      index,
      options: step.remaining,
    });
    self.stack.push(Frame::Expand(child));
  }

  fn step_attempts(
    &mut self,
    state: GridState<'a>,
    dir: Direction,
    index: usize,
    mut attempts: vec::IntoIter<ConcreteLine>,
  ) {
    while let Some(attempt) = attempts.next() {
      if self.ctx.is_cancelled() {
        self.stack.clear();
        return;
      }

      // A line may not contain the same word twice.
      if attempt.words().iter().duplicates().next().is_some() {
        continue;
      }

      // Constrain the crossing lines: cell `index` of crossing line i must
      // equal the attempt's cell i, and no crossing line may reuse one of the
      // attempt's words.
      let mut attempt_opposite = state.cross_lines(dir).to_vec();
      let mut same_both_ways = false;
      for (i, &cell) in attempt.cells().iter().enumerate() {
        let filtered = attempt_opposite[i]
          .remove_word_options(attempt.words())
          .filter(cell, index);

        if filtered.max_possibilities() == 1 {
          match filtered.first() {
            Some(crossing) if crossing.cells() != attempt.cells() => {}
            _ => {
              same_both_ways = true;
              break;
            }
          }
        }
        attempt_opposite[i] = filtered;
      }
      if same_both_ways {
        return;
      }

      if attempt_opposite.iter().any(|line| line.max_possibilities() == 0) {
        continue;
      }

      let option_axis = state
        .lines(dir)
        .iter()
        .enumerate()
        .map(|(idx, line)| {
          if idx == index {
            PossibleLines::definite(attempt.clone())
          } else {
            line.remove_word_options(attempt.words())
          }
        })
        .collect_vec();

      let mut duplicate = false;
      for k in 0..attempt_opposite.len() {
        let first = &attempt_opposite[k];
        let second = &option_axis[k];
        if first.max_possibilities() > 1 || second.max_possibilities() > 1 {
          continue;
        }
        if let (Some(f), Some(s)) = (first.first(), second.first()) {
          if f.cells() == s.cells() {
            duplicate = true;
            break;
          }
        }
      }
      if duplicate {
        return;
      }

      let child = state.with_axes(dir, option_axis, attempt_opposite);
      self.stack.push(Frame::Attempts { state, dir, index, attempts });
      self.stack.push(Frame::Expand(child));
      return;
    }
  }
}

impl Iterator for Grids<'_> {
  type Item = Grid;

  fn next(&mut self) -> Option<Grid> {
    while let Some(frame) = self.stack.pop() {
      if self.ctx.is_cancelled() {
        self.stack.clear();
        return None;
      }

      match frame {
        Frame::Expand(state) => {
          if let Some(grid) = self.expand(state) {
            return Some(grid);
          }
        }
        Frame::Choices { state, dir, index, options } => {
          self.step_choices(state, dir, index, options)
        }
        Frame::Attempts { state, dir, index, attempts } => {
          self.step_attempts(state, dir, index, attempts)
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

  use std::cell::RefCell;

  use googletest::prelude::*;
  use rand::{rngs::StdRng, SeedableRng};

  use super::{Direction, GridState};
  use crate::{
    context::Unbounded,
    line::ConcreteLine,
    possible_lines::PossibleLines,
  };

  fn definite_text(text: &str) -> PossibleLines {
    // Build a definite line from a cell string: words are the letter runs.
    let segments: Vec<ConcreteLine> = text
      .split('`')
      .filter(|segment| !segment.is_empty())
      .map(ConcreteLine::from_word)
      .collect();

    let mut line = match segments.first() {
      Some(first) => {
        let mut acc = first.clone();
        for segment in &segments[1..] {
          acc = ConcreteLine::blocked_between(&acc, segment);
        }
        acc
      }
      None => ConcreteLine::from_word(""),
    };

    // Re-attach leading and trailing blocks lost by the split.
    let leading = text.chars().take_while(|&c| c == '`').count();
    let trailing = text.chars().rev().take_while(|&c| c == '`').count();
    for _ in 0..leading {
      line = ConcreteLine::blocked_before(&line);
    }
    for _ in 0..trailing {
      line = ConcreteLine::blocked_after(&line);
    }

    assert_eq!(line.text(), text);
    PossibleLines::definite(line)
  }

  fn words_of(words: &[&str]) -> PossibleLines {
    let num_letters = words.first().map_or(0, |w| w.len());
    PossibleLines::words(words.iter().map(|w| (*w).to_owned()).collect(), vec![], num_letters)
  }

  fn state_of<'a>(
    across: &[&str],
    down: &[&str],
    rng: &'a RefCell<StdRng>,
  ) -> GridState<'a> {
    GridState {
      across: across.iter().map(|t| definite_text(t)).collect(),
      down: down.iter().map(|t| definite_text(t)).collect(),
      rng,
    }
  }

  #[gtest]
  fn test_connected_board_is_not_divided() {
    let rng = RefCell::new(StdRng::seed_from_u64(1));
    let state = state_of(
      &["aa`", "aaa", "aaa"],
      &["aaa", "aaa", "`aa"],
      &rng,
    );
    expect_false!(state.is_divided());
  }

  #[gtest]
  fn test_cordoned_corner_is_divided() {
    let rng = RefCell::new(StdRng::seed_from_u64(1));
    let state = state_of(
      &["aa`", "aa`", "``a"],
      &["aa`", "aa`", "``a"],
      &rng,
    );
    expect_true!(state.is_divided());
  }

  #[gtest]
  fn test_blocked_cell_count() {
    let rng = RefCell::new(StdRng::seed_from_u64(1));
    let state = state_of(
      &["aa`", "aaa", "aaa"],
      &["aaa", "aaa", "`aa"],
      &rng,
    );
    expect_that!(state.definitely_blocked_cells(), eq(1));
  }

  #[gtest]
  fn test_undecided_index_prefers_most_constrained() {
    let rng = RefCell::new(StdRng::seed_from_u64(1));
    let state = GridState {
      across: vec![
        definite_text("ab"),
        words_of(&["ab", "cd", "ef"]),
      ],
      down: vec![words_of(&["ac", "bd"]), words_of(&["ax", "bx", "cx"])],
      rng: &rng,
    };

    // Across: only index 1 is undecided.
    expect_that!(state.undecided_index(Direction::Horizontal), some(eq(1)));
    // Down: index 0 has the fewest candidates.
    expect_that!(state.undecided_index(Direction::Vertical), some(eq(0)));

    let decided = GridState {
      across: vec![definite_text("ab"), definite_text("cd")],
      down: vec![definite_text("ac"), definite_text("bd")],
      rng: &rng,
    };
    expect_that!(decided.undecided_index(Direction::Horizontal), none());
  }

  #[gtest]
  fn test_prefilter_narrows_by_crossing_axis() {
    let rng = RefCell::new(StdRng::seed_from_u64(1));
    let state = GridState {
      across: vec![words_of(&["ab", "cb"]), words_of(&["cd", "ce"])],
      down: vec![definite_text("ac"), words_of(&["bd", "be", "bf"])],
      rng: &rng,
    };

    let (filtered, changed) = state.prefilter(&Unbounded, Direction::Horizontal);
    expect_true!(changed);
    expect_that!(filtered.across[0].first().unwrap().text(), eq("ab"));
    expect_that!(filtered.across[1].max_possibilities(), eq(2));

    // A second pass in the same direction has nothing left to remove.
    let (_, changed_again) = filtered.prefilter(&Unbounded, Direction::Horizontal);
    expect_false!(changed_again);
  }
}
