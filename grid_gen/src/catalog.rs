use std::{cell::RefCell, collections::HashMap};

use rand::{rngs::StdRng, seq::SliceRandom};

use crate::{context::Context, possible_lines::PossibleLines};

pub(crate) struct CatalogParams {
  pub preferred_words: Vec<String>,
  pub obscure_words: Vec<String>,
  pub excluded_words: Vec<String>,
  pub line_length: usize,
  pub min_word_length: usize,
  pub max_word_length: usize,
}

/// Per-length index of "any legal line of this length": the words of that
/// exact length plus every placement of one blocked cell splitting the line
/// into shorter legal lines. Entries are built bottom-up on demand and
/// memoised.
pub(crate) struct LineCatalog {
  line_length: usize,
  min_word_length: usize,

  preferred_by_length: HashMap<usize, Vec<String>>,
  obscure_by_length: HashMap<usize, Vec<String>>,

  memo: RefCell<HashMap<usize, PossibleLines>>,
}

impl LineCatalog {
  pub fn new(params: CatalogParams) -> Self {
    let excluded: std::collections::HashSet<&str> =
      params.excluded_words.iter().map(String::as_str).collect();

    let mut preferred_by_length: HashMap<usize, Vec<String>> = HashMap::new();
    let mut obscure_by_length: HashMap<usize, Vec<String>> = HashMap::new();

    let in_range = |word: &String| {
      (params.min_word_length..=params.max_word_length).contains(&word.len())
        && !excluded.contains(word.as_str())
    };
    for word in params.preferred_words.iter().filter(|w| in_range(w)) {
      preferred_by_length.entry(word.len()).or_default().push(word.clone());
    }
    for word in params.obscure_words.iter().filter(|w| in_range(w)) {
      obscure_by_length.entry(word.len()).or_default().push(word.clone());
    }

    Self {
      line_length: params.line_length,
      min_word_length: params.min_word_length,
      preferred_by_length,
      obscure_by_length,
      memo: RefCell::new(HashMap::new()),
    }
  }

  /// The set of all legal lines of length `at_length`.
  ///
  /// The ordering of the between-block alternatives is shuffled through `rng`
  /// so the solver's enumeration order varies from seed to seed.
  pub fn lines_of_length(
    &self,
    ctx: &dyn Context,
    at_length: usize,
    rng: &mut StdRng,
  ) -> PossibleLines {
    if ctx.is_cancelled() {
      return PossibleLines::impossible(at_length);
    }

    if let Some(memoized) = self.memo.borrow().get(&at_length) {
      return memoized.clone();
    }

    assert!(
      at_length <= self.line_length,
      "catalog queried past the line length"
    );

    if at_length < self.min_word_length {
      return PossibleLines::impossible(at_length);
    }

    let words = PossibleLines::words(
      self.preferred_by_length.get(&at_length).cloned().unwrap_or_default(),
      self.obscure_by_length.get(&at_length).cloned().unwrap_or_default(),
      at_length,
    );

    // Recurse into every [anything] ` [anything] split. The block can sit
    // anywhere that leaves a legal word length on both sides.
    let mut between_possibilities = Vec::new();
    if at_length >= 2 * self.min_word_length + 1 {
      for i in self.min_word_length..=(at_length - 1 - self.min_word_length) {
        between_possibilities.push(PossibleLines::block_between(
          self.lines_of_length(ctx, i, rng),
          self.lines_of_length(ctx, at_length - i - 1, rng),
        ));
      }
      between_possibilities.shuffle(rng);
    }

    // Recurse into ` [anything] and [anything] `.
    let smaller = self.lines_of_length(ctx, at_length - 1, rng);
    let edge_blocks = if smaller.max_possibilities() > 0 {
      vec![
        PossibleLines::block_before(smaller.clone()),
        PossibleLines::block_after(smaller),
      ]
    } else {
      vec![]
    };

    let result = if edge_blocks.is_empty() && between_possibilities.is_empty() {
      words
    } else {
      let mut all_possibilities = vec![words];
      all_possibilities.extend(edge_blocks);
      all_possibilities.extend(between_possibilities);
      PossibleLines::compound(all_possibilities, at_length)
    };

    self.memo.borrow_mut().insert(at_length, result.clone());
    result
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

  use googletest::prelude::*;
  use itertools::Itertools;
  use rand::{rngs::StdRng, SeedableRng};

  use super::{CatalogParams, LineCatalog};
  use crate::context::Unbounded;

  fn catalog_of(words: &[&str], line_length: usize) -> LineCatalog {
    LineCatalog::new(CatalogParams {
      preferred_words: words.iter().map(|w| (*w).to_owned()).collect(),
      obscure_words: vec![],
      excluded_words: vec![],
      line_length,
      min_word_length: 3,
      max_word_length: line_length,
    })
  }

  #[gtest]
  fn test_below_min_length_is_impossible() {
    let catalog = catalog_of(&["cat", "dog"], 5);
    let mut rng = StdRng::seed_from_u64(7);

    for len in 0..3 {
      expect_that!(
        catalog.lines_of_length(&Unbounded, len, &mut rng).max_possibilities(),
        eq(0)
      );
    }
  }

  #[gtest]
  fn test_word_length_without_blocks() {
    let catalog = catalog_of(&["cat", "dog"], 3);
    let mut rng = StdRng::seed_from_u64(7);

    let lines = catalog.lines_of_length(&Unbounded, 3, &mut rng);
    expect_that!(lines.max_possibilities(), eq(2));
    expect_true!(lines.iterate().all(|line| line.words().len() == 1));
  }

  #[gtest]
  fn test_edge_blocks_appear_at_length_four() {
    let catalog = catalog_of(&["cat", "dog", "tree"], 4);
    let mut rng = StdRng::seed_from_u64(7);

    let lines = catalog.lines_of_length(&Unbounded, 4, &mut rng);
    // tree, `cat, `dog, cat`, dog`.
    expect_that!(lines.max_possibilities(), eq(5));

    let texts = lines.iterate().map(|line| line.text()).sorted().collect::<Vec<_>>();
    expect_that!(
      texts,
      container_eq([
        "`cat".to_owned(),
        "`dog".to_owned(),
        "cat`".to_owned(),
        "dog`".to_owned(),
        "tree".to_owned(),
      ])
    );
  }

  #[gtest]
  fn test_between_blocks_appear_at_twice_min_plus_one() {
    let catalog = catalog_of(&["cat", "dog", "unicorn"], 7);
    let mut rng = StdRng::seed_from_u64(7);

    let lines = catalog.lines_of_length(&Unbounded, 7, &mut rng);
    let texts = lines.iterate().map(|line| line.text()).collect::<Vec<_>>();

    // Splits of 7 into 3`3 contribute word pairs; both word orders appear.
    expect_true!(texts.contains(&"cat`dog".to_owned()));
    expect_true!(texts.contains(&"dog`cat".to_owned()));
    expect_true!(texts.contains(&"unicorn".to_owned()));
    // A word may not cross a block, so no split uses a 7-letter word.
    expect_true!(texts.iter().all(|t| t.len() == 7));
  }

  #[gtest]
  fn test_memoisation_returns_shared_value() {
    let catalog = catalog_of(&["cat", "dog"], 5);
    let mut rng = StdRng::seed_from_u64(7);

    let first = catalog.lines_of_length(&Unbounded, 4, &mut rng);
    let second = catalog.lines_of_length(&Unbounded, 4, &mut rng);
    expect_true!(first.same(&second));
  }

  #[gtest]
  fn test_length_filtering_and_exclusion() {
    let catalog = LineCatalog::new(CatalogParams {
      preferred_words: vec!["cat".to_owned(), "dog".to_owned(), "toolong".to_owned()],
      obscure_words: vec!["fox".to_owned()],
      excluded_words: vec!["dog".to_owned()],
      line_length: 3,
      min_word_length: 3,
      max_word_length: 3,
    });
    let mut rng = StdRng::seed_from_u64(7);

    let lines = catalog.lines_of_length(&Unbounded, 3, &mut rng);
    let texts = lines.iterate().map(|line| line.text()).sorted().collect::<Vec<_>>();
    expect_that!(texts, container_eq(["cat".to_owned(), "fox".to_owned()]));
  }
}
