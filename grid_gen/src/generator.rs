use std::{
  cell::{OnceCell, RefCell},
  fmt::{Debug, Formatter},
};

use rand::rngs::StdRng;
use util::error::{GridGenError, GridGenResult};

use crate::{
  catalog::{CatalogParams, LineCatalog},
  context::Context,
  possible_lines::PossibleLines,
  solver::Grids,
};

/// Words shorter than this never fit a line, whatever the caller asks for.
const MIN_WORD_LENGTH_FLOOR: usize = 3;

#[derive(Clone, Copy, Debug, Default)]
pub struct GeneratorParams {
  /// Minimum dictionary word length; defaults to 3, which is also the floor.
  pub min_word_length: Option<usize>,
  /// Maximum dictionary word length; defaults to the side length.
  pub max_word_length: Option<usize>,
}

/// Produces square grids whose every row and column is a legal line over the
/// given vocabulary. Construction validates input; the actual search happens
/// lazily as the sequence from [`Generator::possible_grids`] is pulled.
pub struct Generator {
  line_length: usize,
  catalog: LineCatalog,
  rng: RefCell<StdRng>,

  // Built on the first possible_grids call, shared by the rest.
  all_lines: OnceCell<PossibleLines>,
}

pub fn create_generator(
  line_length: usize,
  preferred_words: Vec<String>,
  obscure_words: Vec<String>,
  excluded_words: Vec<String>,
  rng: StdRng,
  params: GeneratorParams,
) -> GridGenResult<Generator> {
  let min_word_length = params
    .min_word_length
    .unwrap_or(MIN_WORD_LENGTH_FLOOR)
    .max(MIN_WORD_LENGTH_FLOOR);
  let max_word_length = params.max_word_length.unwrap_or(line_length);

  if line_length < min_word_length {
    return Err(
      GridGenError::InvalidParam(format!(
        "side length {line_length} is shorter than the minimum word length {min_word_length}"
      ))
      .into(),
    );
  }
  if max_word_length < min_word_length {
    return Err(
      GridGenError::InvalidParam(format!(
        "maximum word length {max_word_length} is shorter than the minimum {min_word_length}"
      ))
      .into(),
    );
  }

  for word in preferred_words
    .iter()
    .chain(&obscure_words)
    .chain(&excluded_words)
  {
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_lowercase()) {
      return Err(GridGenError::InvalidWord(word.clone()).into());
    }
  }

  Ok(Generator {
    line_length,
    catalog: LineCatalog::new(CatalogParams {
      preferred_words,
      obscure_words,
      excluded_words,
      line_length,
      min_word_length,
      max_word_length,
    }),
    rng: RefCell::new(rng),
    all_lines: OnceCell::new(),
  })
}

impl Generator {
  fn all_possible_lines(&self, ctx: &dyn Context) -> PossibleLines {
    self
      .all_lines
      .get_or_init(|| {
        let mut rng = self.rng.borrow_mut();
        self.catalog.lines_of_length(ctx, self.line_length, &mut *rng)
      })
      .clone()
  }

  /// The lazy sequence of distinct solved grids. Nothing runs between pulls;
  /// the sequence ends when the search space is exhausted or `ctx` cancels.
  pub fn possible_grids<'a>(&'a self, ctx: &'a dyn Context) -> Grids<'a> {
    Grids::new(ctx, self.all_possible_lines(ctx), self.line_length, &self.rng)
  }
}

impl Debug for Generator {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Generator")
      .field("line_length", &self.line_length)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

  use std::cell::Cell;

  use googletest::prelude::*;
  use itertools::Itertools;
  use rand::{rngs::StdRng, SeedableRng};

  use super::{create_generator, Generator, GeneratorParams};
  use crate::{context::Unbounded, grid::Grid};

  fn generator_of(side_length: usize, words: &[&str], seed: u64) -> Generator {
    create_generator(
      side_length,
      words.iter().map(|w| (*w).to_owned()).collect(),
      vec![],
      vec![],
      StdRng::seed_from_u64(seed),
      GeneratorParams::default(),
    )
    .unwrap()
  }

  /// A 3x3 double word square and vocabulary: rows cab/ore/ten, columns
  /// cot/are/ben.
  const SQUARE_VOCAB: [&str; 6] = ["cab", "ore", "ten", "cot", "are", "ben"];
  /// A second, letter-disjoint square: rows pig/ace/men, columns pam/ice/gen.
  const SECOND_SQUARE_VOCAB: [&str; 6] = ["pig", "ace", "men", "pam", "ice", "gen"];

  /// Checks every published grid invariant: square shape, all line segments
  /// are vocabulary words of legal length, no word repeats anywhere, no row
  /// equals its same-index column, blocked cells stay under a quarter of the
  /// board, and the open cells are 4-connected.
  fn verify_grid(grid: &Grid, vocab: &[&str]) {
    let n = grid.width();
    assert_eq!(grid.height(), n, "not square:\n{}", grid.repr());

    let rows = (0..n)
      .map(|y| (0..n).map(|x| grid.get(x, y).unwrap()).collect::<String>())
      .collect_vec();
    let cols = (0..n)
      .map(|x| (0..n).map(|y| grid.get(x, y).unwrap()).collect::<String>())
      .collect_vec();

    let mut used_words = Vec::new();
    for line in rows.iter().chain(&cols) {
      for segment in line.split('`').filter(|s| !s.is_empty()) {
        assert!(segment.len() >= 3, "short segment {segment:?} in {line:?}");
        assert!(vocab.contains(&segment), "unknown word {segment:?} in {line:?}");
        used_words.push(segment.to_owned());
      }
    }
    assert_eq!(
      used_words.iter().unique().count(),
      used_words.len(),
      "repeated word in grid:\n{}",
      grid.repr()
    );

    for i in 0..n {
      assert_ne!(rows[i], cols[i], "row {i} equals its column:\n{}", grid.repr());
    }

    let blocked = rows.iter().flat_map(|row| row.chars()).filter(|&c| c == '`').count();
    assert!(blocked <= n * n * 25 / 100, "too dense:\n{}", grid.repr());

    let cells = rows.iter().map(|row| row.chars().collect_vec()).collect_vec();
    let mut visited = vec![vec![false; n]; n];
    let start = (0..n * n)
      .map(|i| (i % n, i / n))
      .find(|&(x, y)| cells[y][x] != '`');
    let mut queue: Vec<(usize, usize)> = start.into_iter().collect();
    while let Some((x, y)) = queue.pop() {
      if visited[y][x] || cells[y][x] == '`' {
        continue;
      }
      visited[y][x] = true;
      if x > 0 {
        queue.push((x - 1, y));
      }
      if x + 1 < n {
        queue.push((x + 1, y));
      }
      if y > 0 {
        queue.push((x, y - 1));
      }
      if y + 1 < n {
        queue.push((x, y + 1));
      }
    }
    for y in 0..n {
      for x in 0..n {
        assert!(
          cells[y][x] == '`' || visited[y][x],
          "disconnected cell ({x}, {y}):\n{}",
          grid.repr()
        );
      }
    }
  }

  #[gtest]
  fn test_too_small_vocabulary_yields_nothing() {
    // Four words cannot fill the six distinct lines of a 3x3 board, and with
    // a minimum word length of 3 no blocked layout helps either.
    let generator = generator_of(3, &["cat", "car", "arc", "tar"], 42);
    expect_that!(generator.possible_grids(&Unbounded).count(), eq(0));
  }

  #[gtest]
  fn test_empty_vocabulary_yields_nothing() {
    let generator = generator_of(3, &[], 42);
    expect_that!(generator.possible_grids(&Unbounded).count(), eq(0));
  }

  #[gtest]
  fn test_finds_all_letter_squares() {
    let generator = generator_of(3, &SQUARE_VOCAB, 42);

    let reprs = generator
      .possible_grids(&Unbounded)
      .map(|grid| {
        verify_grid(&grid, &SQUARE_VOCAB);
        grid.repr()
      })
      .sorted()
      .collect_vec();

    // The vocabulary admits exactly the square and its transpose, and at 3x3
    // no line has room for a blocked cell.
    expect_that!(
      reprs,
      container_eq(["cab\nore\nten".to_owned(), "cot\nare\nben".to_owned()])
    );
  }

  #[gtest]
  fn test_finds_grid_with_blocked_corner() {
    let vocab = ["abc", "gko", "defg", "hijk", "lmno", "adhl", "beim", "cfjn"];
    let generator = generator_of(4, &vocab, 42);

    let reprs = generator
      .possible_grids(&Unbounded)
      .map(|grid| {
        verify_grid(&grid, &vocab);
        grid.repr()
      })
      .collect_vec();

    expect_that!(reprs.len(), ge(1));
    // The corner layout: rows abc`/defg/hijk/lmno with column four `gko.
    expect_true!(reprs.contains(&"abc`\ndefg\nhijk\nlmno".to_owned()));
  }

  #[gtest]
  fn test_grids_are_distinct() {
    let vocab: Vec<&str> = SQUARE_VOCAB.iter().chain(&SECOND_SQUARE_VOCAB).copied().collect();
    let generator = generator_of(3, &vocab, 7);

    let reprs = generator.possible_grids(&Unbounded).map(|grid| grid.repr()).collect_vec();
    expect_that!(reprs.len(), ge(2));
    expect_that!(reprs.iter().unique().count(), eq(reprs.len()));
  }

  #[gtest]
  fn test_cancellation_stops_the_sequence() {
    let vocab: Vec<&str> = SQUARE_VOCAB.iter().chain(&SECOND_SQUARE_VOCAB).copied().collect();
    let cancelled = Cell::new(false);
    let generator = generator_of(3, &vocab, 7);

    let mut grids = generator.possible_grids(&cancelled);
    expect_that!(grids.next(), some(anything()));

    cancelled.set(true);
    expect_that!(grids.next(), none());
    expect_that!(grids.next(), none());
  }

  #[gtest]
  fn test_same_seed_same_sequence() {
    let vocab: Vec<&str> = SQUARE_VOCAB.iter().chain(&SECOND_SQUARE_VOCAB).copied().collect();

    let run = |seed: u64| {
      generator_of(3, &vocab, seed)
        .possible_grids(&Unbounded)
        .map(|grid| grid.repr())
        .collect_vec()
    };

    expect_that!(run(1234), container_eq(run(1234)));
  }

  #[gtest]
  fn test_excluded_words_never_appear() {
    let vocab: Vec<String> = SQUARE_VOCAB
      .iter()
      .chain(&SECOND_SQUARE_VOCAB)
      .map(|w| (*w).to_owned())
      .collect();
    let generator = create_generator(
      3,
      vocab,
      vec![],
      vec!["cab".to_owned()],
      StdRng::seed_from_u64(42),
      GeneratorParams::default(),
    )
    .unwrap();

    let reprs = generator.possible_grids(&Unbounded).map(|grid| grid.repr()).collect_vec();
    expect_that!(reprs.len(), ge(1));
    for repr in &reprs {
      for line in repr.split('\n') {
        expect_that!(line, not(eq("cab")));
      }
      // Excluding "cab" kills both orientations of the first square.
      expect_false!(repr.contains("ore"));
    }
  }

  #[gtest]
  fn test_sequence_restarts_with_memoised_catalog() {
    let generator = generator_of(3, &SQUARE_VOCAB, 42);

    let first: Vec<String> =
      generator.possible_grids(&Unbounded).map(|grid| grid.repr()).sorted().collect();
    let second: Vec<String> =
      generator.possible_grids(&Unbounded).map(|grid| grid.repr()).sorted().collect();

    expect_that!(first.len(), eq(2));
    expect_that!(first, container_eq(second));
  }

  #[gtest]
  fn test_invalid_words_fail_construction() {
    for bad in ["Cat", "ca t", "café", ""] {
      let result = create_generator(
        3,
        vec![bad.to_owned()],
        vec![],
        vec![],
        StdRng::seed_from_u64(1),
        GeneratorParams::default(),
      );
      expect_that!(result, err(anything()));
    }
  }

  #[gtest]
  fn test_invalid_params_fail_construction() {
    let result = create_generator(
      2,
      vec!["cat".to_owned()],
      vec![],
      vec![],
      StdRng::seed_from_u64(1),
      GeneratorParams::default(),
    );
    expect_that!(result, err(anything()));

    let result = create_generator(
      5,
      vec!["cat".to_owned()],
      vec![],
      vec![],
      StdRng::seed_from_u64(1),
      GeneratorParams { min_word_length: Some(4), max_word_length: Some(3) },
    );
    expect_that!(result, err(anything()));
  }

  #[gtest]
  fn test_min_word_length_floor_applies() {
    // Asking for shorter words than 3 silently clamps to the floor, so a
    // 3x3 board remains constructible.
    let generator = create_generator(
      3,
      SQUARE_VOCAB.iter().map(|w| (*w).to_owned()).collect(),
      vec![],
      vec![],
      StdRng::seed_from_u64(42),
      GeneratorParams { min_word_length: Some(1), max_word_length: None },
    )
    .unwrap();

    expect_that!(generator.possible_grids(&Unbounded).count(), eq(2));
  }
}
