use std::{
  cell::Cell,
  fmt::{Debug, Formatter},
  rc::Rc,
};

use crate::{
  charset::{index_char, CharSet, BLOCKED, NUM_CHARS},
  line::ConcreteLine,
  word_universe::{self, WordUniverse},
};

/// One step in deciding what a line should be: the set of candidates split
/// into two disjoint, non-empty halves that can be explored independently.
pub struct ChoiceStep {
  pub choice: PossibleLines,
  pub remaining: PossibleLines,
}

/// A set of candidate lines of a fixed length, represented symbolically.
///
/// A line is a full row or column of the puzzle: a sequence of cells over the
/// 26 letters plus the blocked marker. The set is never materialised; it is a
/// tree of word-set bitmasks and block-placement combinators that is filtered
/// in place.
///
/// Values are immutable and cheap to clone (the representation is shared).
/// Filtering operations return the receiver itself when nothing was
/// eliminated, which [`PossibleLines::same`] detects.
#[derive(Clone)]
pub struct PossibleLines {
  repr: Rc<Repr>,
}

enum Repr {
  /// The empty set. Still carries its line length.
  Impossible { num_letters: usize },
  /// A singleton set.
  Definite { line: ConcreteLine },
  /// A subset of one length's word universe: every line is exactly one word.
  Words(WordSet),
  /// Every line is a blocked cell followed by a line from `lines`.
  BlockBefore { lines: PossibleLines },
  /// Every line is a line from `lines` followed by a blocked cell.
  BlockAfter { lines: PossibleLines },
  /// Every line is a line from `first`, a blocked cell, then one from
  /// `second`.
  BlockBetween {
    first: PossibleLines,
    second: PossibleLines,
  },
  /// Disjoint (by construction) union of same-length sets. Children are never
  /// Impossible and never Compound themselves.
  Compound { possibilities: Vec<PossibleLines> },
}

struct WordSet {
  universe: Rc<WordUniverse>,
  /// Bitset over `universe`'s word list; 1 => the word is still possible.
  set: Vec<u64>,
  max: u64,
  /// Per-index cache of "which characters appear here", filled on first use.
  chars_cache: Vec<Cell<Option<CharSet>>>,
}

impl WordSet {
  fn new(universe: Rc<WordUniverse>, set: Vec<u64>, max: u64) -> Self {
    let chars_cache = (0..universe.num_letters()).map(|_| Cell::new(None)).collect();
    Self { universe, set, max, chars_cache }
  }

  /// Collapses an updated bitset to the canonical shape: empty sets become
  /// Impossible, singletons become Definite.
  fn rebuild(universe: &Rc<WordUniverse>, set: Vec<u64>, max: u64) -> PossibleLines {
    match max {
      0 => PossibleLines::impossible(universe.num_letters()),
      1 => match word_universe::first_set_bit(&set) {
        Some(idx) => PossibleLines::definite(ConcreteLine::from_word(universe.word(idx))),
        None => PossibleLines::impossible(universe.num_letters()),
      },
      _ => PossibleLines::wrap(Repr::Words(WordSet::new(Rc::clone(universe), set, max))),
    }
  }

  fn chars_at(&self, accumulate: &mut CharSet, index: usize) {
    // A word set contributes only letters, so a set already holding all 26
    // letters cannot grow.
    if accumulate.is_full()
      || (!accumulate.contains(BLOCKED) && accumulate.count() + 1 == CharSet::capacity())
    {
      return;
    }

    if let Some(cached) = self.chars_cache[index].get() {
      accumulate.add_all(&cached);
      return;
    }

    let masks = self.universe.masks();
    let blocks = self.universe.blocks();
    let mut cs = CharSet::new();
    for cidx in 0..NUM_CHARS {
      let base = self.universe.mask_base(index, cidx);
      if self
        .set
        .iter()
        .zip(&masks[base..base + blocks])
        .any(|(s, m)| s & m != 0)
      {
        cs.add(index_char(cidx));
      }
    }

    accumulate.add_all(&cs);
    self.chars_cache[index].set(Some(cs));
  }

  fn filter_by_allowed(
    &self,
    handle: &PossibleLines,
    index: usize,
    char_indices: impl Iterator<Item = usize> + Clone,
  ) -> PossibleLines {
    let masks = self.universe.masks();
    let mut new_set = vec![0u64; self.set.len()];
    let mut new_max = 0u64;
    let mut unchanged = true;
    for (li, &limb) in self.set.iter().enumerate() {
      let mut allowed = 0u64;
      for cidx in char_indices.clone() {
        allowed |= masks[self.universe.mask_base(index, cidx) + li];
      }

      let ns = limb & allowed;
      new_set[li] = ns;
      if ns != limb {
        unchanged = false;
      }
      new_max += u64::from(ns.count_ones());
    }

    if unchanged {
      return handle.clone();
    }
    WordSet::rebuild(&self.universe, new_set, new_max)
  }

  fn remove_words(&self, handle: &PossibleLines, words: &[String]) -> PossibleLines {
    if words.is_empty() {
      return handle.clone();
    }

    let index_by_word = self.universe.index_by_word();
    let mut candidates = words
      .iter()
      .filter(|word| word.len() == self.universe.num_letters())
      .filter_map(|word| index_by_word.get(word.as_str()).copied());

    if !candidates.clone().any(|idx| word_universe::has_bit(&self.set, idx)) {
      return handle.clone();
    }

    let mut new_set = self.set.clone();
    let mut new_max = self.max;
    for idx in &mut candidates {
      if word_universe::clear_bit(&mut new_set, idx) {
        new_max -= 1;
      }
    }

    if new_max == self.max {
      return handle.clone();
    }
    WordSet::rebuild(&self.universe, new_set, new_max)
  }

  fn make_choice(&self) -> ChoiceStep {
    let half = (self.max / 2).clamp(1, self.max - 1);

    let mut choice_set = vec![0u64; self.set.len()];
    let mut remaining_set = vec![0u64; self.set.len()];
    let mut to_pick = half;
    for (li, &limb) in self.set.iter().enumerate() {
      if to_pick == 0 {
        remaining_set[li] = limb;
        continue;
      }

      let mut picked = 0u64;
      let mut b = limb;
      while b != 0 && to_pick > 0 {
        picked |= b & b.wrapping_neg();
        b &= b - 1;
        to_pick -= 1;
      }
      choice_set[li] = picked;
      remaining_set[li] = limb & !picked;
    }

    ChoiceStep {
      choice: WordSet::rebuild(&self.universe, choice_set, half),
      remaining: WordSet::rebuild(&self.universe, remaining_set, self.max - half),
    }
  }
}

impl PossibleLines {
  fn wrap(repr: Repr) -> Self {
    Self { repr: Rc::new(repr) }
  }

  pub fn impossible(num_letters: usize) -> Self {
    Self::wrap(Repr::Impossible { num_letters })
  }

  pub fn definite(line: ConcreteLine) -> Self {
    Self::wrap(Repr::Definite { line })
  }

  /// The set of all single-word lines over `preferred` and `obscure`, which
  /// must share length `num_letters`. Preferred words order first.
  pub fn words(preferred: Vec<String>, obscure: Vec<String>, num_letters: usize) -> Self {
    let obscure_idx = preferred.len();
    let mut all = preferred;
    all.extend(obscure);

    match all.len() {
      0 => Self::impossible(num_letters),
      1 => Self::definite(ConcreteLine::from_word(&all[0])),
      n => {
        let universe = WordUniverse::new(all, obscure_idx);
        let set = universe.full_set();
        Self::wrap(Repr::Words(WordSet::new(universe, set, n as u64)))
      }
    }
  }

  pub fn block_before(inner: PossibleLines) -> Self {
    if inner.is_impossible() {
      return Self::impossible(inner.num_letters() + 1);
    }
    Self::wrap(Repr::BlockBefore { lines: inner })
  }

  pub fn block_after(inner: PossibleLines) -> Self {
    if inner.is_impossible() {
      return Self::impossible(inner.num_letters() + 1);
    }
    Self::wrap(Repr::BlockAfter { lines: inner })
  }

  pub fn block_between(first: PossibleLines, second: PossibleLines) -> Self {
    if first.is_impossible() || second.is_impossible() {
      return Self::impossible(first.num_letters() + 1 + second.num_letters());
    }
    Self::wrap(Repr::BlockBetween { first, second })
  }

  /// Disjoint union. Impossible children are dropped, nested Compounds are
  /// flattened, and zero/one-child unions collapse.
  pub fn compound(possibilities: Vec<PossibleLines>, num_letters: usize) -> Self {
    let mut flattened = Vec::with_capacity(possibilities.len());
    for p in possibilities {
      if p.is_impossible() {
        continue;
      }
      if let Repr::Compound { possibilities: children } = &*p.repr {
        flattened.extend(children.iter().cloned());
      } else {
        flattened.push(p);
      }
    }

    match flattened.len() {
      0 => Self::impossible(num_letters),
      1 => flattened.swap_remove(0),
      _ => Self::wrap(Repr::Compound { possibilities: flattened }),
    }
  }

  /// True iff `self` and `other` are the same underlying value (used to
  /// detect that a filter eliminated nothing).
  pub fn same(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.repr, &other.repr)
  }

  fn is_impossible(&self) -> bool {
    matches!(&*self.repr, Repr::Impossible { .. })
  }

  pub fn num_letters(&self) -> usize {
    match &*self.repr {
      Repr::Impossible { num_letters } => *num_letters,
      Repr::Definite { line } => line.num_letters(),
      Repr::Words(w) => w.universe.num_letters(),
      Repr::BlockBefore { lines } | Repr::BlockAfter { lines } => lines.num_letters() + 1,
      Repr::BlockBetween { first, second } => first.num_letters() + 1 + second.num_letters(),
      Repr::Compound { possibilities } => possibilities[0].num_letters(),
    }
  }

  /// Upper bound on the number of lines in the set. Exact in practice: the
  /// constructors only build disjoint unions.
  pub fn max_possibilities(&self) -> u64 {
    match &*self.repr {
      Repr::Impossible { .. } => 0,
      Repr::Definite { .. } => 1,
      Repr::Words(w) => w.max,
      Repr::BlockBefore { lines } | Repr::BlockAfter { lines } => lines.max_possibilities(),
      Repr::BlockBetween { first, second } => {
        first.max_possibilities() * second.max_possibilities()
      }
      Repr::Compound { possibilities } => possibilities.iter().map(Self::max_possibilities).sum(),
    }
  }

  /// Adds to `accumulate` every symbol that appears at `index` in some line
  /// of the set.
  pub fn chars_at(&self, accumulate: &mut CharSet, index: usize) {
    match &*self.repr {
      Repr::Impossible { .. } => {}
      Repr::Definite { line } => accumulate.add(line.cells()[index]),
      Repr::Words(w) => w.chars_at(accumulate, index),
      Repr::BlockBefore { lines } => {
        if accumulate.is_full() {
          return;
        }
        if index == 0 {
          accumulate.add(BLOCKED);
        } else {
          lines.chars_at(accumulate, index - 1);
        }
      }
      Repr::BlockAfter { lines } => {
        if accumulate.is_full() {
          return;
        }
        if index == lines.num_letters() {
          accumulate.add(BLOCKED);
        } else {
          lines.chars_at(accumulate, index);
        }
      }
      Repr::BlockBetween { first, second } => {
        if accumulate.is_full() {
          return;
        }
        let split = first.num_letters();
        if index == split {
          accumulate.add(BLOCKED);
        } else if index < split {
          first.chars_at(accumulate, index);
        } else {
          second.chars_at(accumulate, index - split - 1);
        }
      }
      Repr::Compound { possibilities } => {
        for p in possibilities {
          p.chars_at(accumulate, index);
          if accumulate.is_full() {
            return;
          }
        }
      }
    }
  }

  /// True iff every line in the set has the blocked marker at `index`.
  pub fn definitely_blocked_at(&self, index: usize) -> bool {
    match &*self.repr {
      Repr::Impossible { .. } => false,
      Repr::Definite { line } => line.cells()[index] == BLOCKED,
      Repr::Words(_) => false,
      Repr::BlockBefore { lines } => index == 0 || lines.definitely_blocked_at(index - 1),
      Repr::BlockAfter { lines } => {
        index == lines.num_letters() || lines.definitely_blocked_at(index)
      }
      Repr::BlockBetween { first, second } => {
        let split = first.num_letters();
        if index == split {
          true
        } else if index < split {
          first.definitely_blocked_at(index)
        } else {
          second.definitely_blocked_at(index - split - 1)
        }
      }
      Repr::Compound { possibilities } => {
        possibilities.iter().all(|p| p.definitely_blocked_at(index))
      }
    }
  }

  /// The words guaranteed to occur in every line of the set. Empty unless the
  /// set (or each sub-part of a block construct) is decided.
  pub fn definite_words(&self) -> Vec<String> {
    match &*self.repr {
      Repr::Impossible { .. } | Repr::Compound { .. } => vec![],
      Repr::Definite { line } => line.words().to_vec(),
      Repr::Words(w) => {
        if w.max != 1 {
          return vec![];
        }
        word_universe::first_set_bit(&w.set)
          .map(|idx| vec![w.universe.word(idx).to_owned()])
          .unwrap_or_default()
      }
      Repr::BlockBefore { lines } | Repr::BlockAfter { lines } => lines.definite_words(),
      Repr::BlockBetween { first, second } => {
        let mut words = first.definite_words();
        words.extend(second.definite_words());
        words
      }
    }
  }

  /// Keeps exactly the lines whose cell at `index` is in `constraint`.
  /// Returns the receiver when nothing was eliminated; Impossible when
  /// everything was.
  pub fn filter_any(&self, constraint: &CharSet, index: usize) -> PossibleLines {
    match &*self.repr {
      Repr::Impossible { .. } => self.clone(),
      Repr::Definite { line } => {
        if constraint.is_full() || constraint.contains(line.cells()[index]) {
          self.clone()
        } else {
          Self::impossible(self.num_letters())
        }
      }
      Repr::Words(w) => {
        if constraint.is_full()
          || (!constraint.contains(BLOCKED) && constraint.count() + 1 == CharSet::capacity())
        {
          return self.clone();
        }
        if constraint.is_empty() {
          return Self::impossible(self.num_letters());
        }
        w.filter_by_allowed(self, index, constraint.iter_indices())
      }
      Repr::BlockBefore { lines } => {
        if constraint.is_full() {
          return self.clone();
        }
        if index == 0 {
          return self.filtered_at_block(constraint.contains(BLOCKED));
        }
        self.rebuilt_before(lines, lines.filter_any(constraint, index - 1))
      }
      Repr::BlockAfter { lines } => {
        if constraint.is_full() {
          return self.clone();
        }
        if index == lines.num_letters() {
          return self.filtered_at_block(constraint.contains(BLOCKED));
        }
        self.rebuilt_after(lines, lines.filter_any(constraint, index))
      }
      Repr::BlockBetween { first, second } => {
        if constraint.is_full() {
          return self.clone();
        }
        let split = first.num_letters();
        if index == split {
          return self.filtered_at_block(constraint.contains(BLOCKED));
        }
        if index < split {
          self.rebuilt_between(first, second, first.filter_any(constraint, index), second.clone())
        } else {
          self.rebuilt_between(
            first,
            second,
            first.clone(),
            second.filter_any(constraint, index - split - 1),
          )
        }
      }
      Repr::Compound { possibilities } => {
        if constraint.is_full() {
          return self.clone();
        }
        self.map_children(possibilities, |p| p.filter_any(constraint, index))
      }
    }
  }

  /// Keeps exactly the lines whose cell at `index` equals `constraint`.
  pub fn filter(&self, constraint: char, index: usize) -> PossibleLines {
    match &*self.repr {
      Repr::Impossible { .. } => self.clone(),
      Repr::Definite { line } => {
        if line.cells()[index] == constraint {
          self.clone()
        } else {
          Self::impossible(self.num_letters())
        }
      }
      Repr::Words(w) => {
        if !constraint.is_ascii_lowercase() {
          return Self::impossible(self.num_letters());
        }
        w.filter_by_allowed(
          self,
          index,
          std::iter::once(crate::charset::char_index(constraint)),
        )
      }
      Repr::BlockBefore { lines } => {
        if index == 0 {
          return self.filtered_at_block(constraint == BLOCKED);
        }
        self.rebuilt_before(lines, lines.filter(constraint, index - 1))
      }
      Repr::BlockAfter { lines } => {
        if index == lines.num_letters() {
          return self.filtered_at_block(constraint == BLOCKED);
        }
        self.rebuilt_after(lines, lines.filter(constraint, index))
      }
      Repr::BlockBetween { first, second } => {
        let split = first.num_letters();
        if index == split {
          return self.filtered_at_block(constraint == BLOCKED);
        }
        if index < split {
          self.rebuilt_between(first, second, first.filter(constraint, index), second.clone())
        } else {
          self.rebuilt_between(
            first,
            second,
            first.clone(),
            second.filter(constraint, index - split - 1),
          )
        }
      }
      Repr::Compound { possibilities } => {
        self.map_children(possibilities, |p| p.filter(constraint, index))
      }
    }
  }

  /// Removes every line that uses any of the given dictionary words.
  pub fn remove_word_options(&self, words: &[String]) -> PossibleLines {
    match &*self.repr {
      Repr::Impossible { .. } => self.clone(),
      Repr::Definite { line } => {
        if line.words().iter().any(|w| words.contains(w)) {
          Self::impossible(self.num_letters())
        } else {
          self.clone()
        }
      }
      Repr::Words(w) => w.remove_words(self, words),
      Repr::BlockBefore { lines } => self.rebuilt_before(lines, lines.remove_word_options(words)),
      Repr::BlockAfter { lines } => self.rebuilt_after(lines, lines.remove_word_options(words)),
      Repr::BlockBetween { first, second } => self.rebuilt_between(
        first,
        second,
        first.remove_word_options(words),
        second.remove_word_options(words),
      ),
      Repr::Compound { possibilities } => {
        self.map_children(possibilities, |p| p.remove_word_options(words))
      }
    }
  }

  /// All concrete lines in the set, lazily.
  pub fn iterate(&self) -> Box<dyn Iterator<Item = ConcreteLine> + '_> {
    match &*self.repr {
      Repr::Impossible { .. } => Box::new(std::iter::empty()),
      Repr::Definite { line } => Box::new(std::iter::once(line.clone())),
      Repr::Words(w) => Box::new(
        word_universe::iter_set_bits(&w.set)
          .map(|idx| ConcreteLine::from_word(w.universe.word(idx))),
      ),
      Repr::BlockBefore { lines } => {
        Box::new(lines.iterate().map(|line| ConcreteLine::blocked_before(&line)))
      }
      Repr::BlockAfter { lines } => {
        Box::new(lines.iterate().map(|line| ConcreteLine::blocked_after(&line)))
      }
      Repr::BlockBetween { first, second } => Box::new(first.iterate().flat_map(move |f| {
        second
          .iterate()
          .map(move |s| ConcreteLine::blocked_between(&f, &s))
      })),
      Repr::Compound { possibilities } => {
        Box::new(possibilities.iter().flat_map(|p| p.iterate()))
      }
    }
  }

  /// Some concrete line from the set, or None for Impossible.
  pub fn first(&self) -> Option<ConcreteLine> {
    match &*self.repr {
      Repr::Impossible { .. } => None,
      Repr::Definite { line } => Some(line.clone()),
      Repr::Words(w) => word_universe::first_set_bit(&w.set)
        .map(|idx| ConcreteLine::from_word(w.universe.word(idx))),
      Repr::BlockBefore { lines } => lines.first().map(|l| ConcreteLine::blocked_before(&l)),
      Repr::BlockAfter { lines } => lines.first().map(|l| ConcreteLine::blocked_after(&l)),
      Repr::BlockBetween { first, second } => first
        .first()
        .zip(second.first())
        .map(|(f, s)| ConcreteLine::blocked_between(&f, &s)),
      Repr::Compound { possibilities } => possibilities.iter().find_map(Self::first),
    }
  }

  /// Splits the set into two disjoint non-empty halves, preferring a
  /// near-balanced split by count.
  ///
  /// Panics on sets of size <= 1: making a choice there is a solver bug.
  pub fn make_choice(&self) -> ChoiceStep {
    assert!(
      self.max_possibilities() > 1,
      "cannot make a choice on fewer than two possible lines"
    );

    match &*self.repr {
      Repr::Impossible { .. } | Repr::Definite { .. } => {
        unreachable!("size-guarded above")
      }
      Repr::Words(w) => w.make_choice(),
      Repr::BlockBefore { lines } => {
        let c = lines.make_choice();
        ChoiceStep {
          choice: Self::block_before(c.choice),
          remaining: Self::block_before(c.remaining),
        }
      }
      Repr::BlockAfter { lines } => {
        let c = lines.make_choice();
        ChoiceStep {
          choice: Self::block_after(c.choice),
          remaining: Self::block_after(c.remaining),
        }
      }
      Repr::BlockBetween { first, second } => {
        if first.max_possibilities() > second.max_possibilities() {
          let c = first.make_choice();
          ChoiceStep {
            choice: Self::block_between(c.choice, second.clone()),
            remaining: Self::block_between(c.remaining, second.clone()),
          }
        } else {
          let c = second.make_choice();
          ChoiceStep {
            choice: Self::block_between(first.clone(), c.choice),
            remaining: Self::block_between(first.clone(), c.remaining),
          }
        }
      }
      Repr::Compound { possibilities } => {
        // Weighted prefix split: balance the two sides by their counts.
        let total: u64 = possibilities.iter().map(Self::max_possibilities).sum();
        let half = total / 2;
        let mut acc = 0u64;
        let mut split_idx = 1;
        for (i, p) in possibilities.iter().enumerate() {
          acc += p.max_possibilities();
          if acc >= half && i + 1 < possibilities.len() {
            split_idx = i + 1;
            break;
          }
        }

        let num_letters = self.num_letters();
        ChoiceStep {
          choice: Self::compound(possibilities[..split_idx].to_vec(), num_letters),
          remaining: Self::compound(possibilities[split_idx..].to_vec(), num_letters),
        }
      }
    }
  }

  fn filtered_at_block(&self, blocked_allowed: bool) -> PossibleLines {
    if blocked_allowed {
      self.clone()
    } else {
      Self::impossible(self.num_letters())
    }
  }

  fn rebuilt_before(&self, original: &PossibleLines, inner: PossibleLines) -> PossibleLines {
    if inner.is_impossible() {
      return Self::impossible(self.num_letters());
    }
    if inner.same(original) {
      return self.clone();
    }
    Self::wrap(Repr::BlockBefore { lines: inner })
  }

  fn rebuilt_after(&self, original: &PossibleLines, inner: PossibleLines) -> PossibleLines {
    if inner.is_impossible() {
      return Self::impossible(self.num_letters());
    }
    if inner.same(original) {
      return self.clone();
    }
    Self::wrap(Repr::BlockAfter { lines: inner })
  }

  fn rebuilt_between(
    &self,
    original_first: &PossibleLines,
    original_second: &PossibleLines,
    first: PossibleLines,
    second: PossibleLines,
  ) -> PossibleLines {
    if first.is_impossible() || second.is_impossible() {
      return Self::impossible(self.num_letters());
    }
    if first.same(original_first) && second.same(original_second) {
      return self.clone();
    }
    Self::wrap(Repr::BlockBetween { first, second })
  }

  fn map_children(
    &self,
    possibilities: &[PossibleLines],
    f: impl Fn(&PossibleLines) -> PossibleLines,
  ) -> PossibleLines {
    let mut any_changed = false;
    let mut mapped = Vec::with_capacity(possibilities.len());
    for p in possibilities {
      let fp = f(p);
      if !fp.same(p) {
        any_changed = true;
      }
      mapped.push(fp);
    }

    if !any_changed {
      return self.clone();
    }
    Self::compound(mapped, self.num_letters())
  }
}

impl Debug for PossibleLines {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &*self.repr {
      Repr::Impossible { num_letters } => write!(f, "Impossible({num_letters})"),
      Repr::Definite { line } => write!(f, "Definite({})", line.text()),
      Repr::Words(w) => {
        let preview: Vec<_> = word_universe::iter_set_bits(&w.set)
          .take(3)
          .map(|idx| w.universe.word(idx))
          .collect();
        write!(f, "Words({} of {:?}...)", w.max, preview)
      }
      Repr::BlockBefore { lines } => write!(f, "BlockBefore({lines:?})"),
      Repr::BlockAfter { lines } => write!(f, "BlockAfter({lines:?})"),
      Repr::BlockBetween { first, second } => write!(f, "BlockBetween({first:?}, {second:?})"),
      Repr::Compound { possibilities } => write!(
        f,
        "Compound({:?} and {} others)",
        possibilities[0],
        possibilities.len() - 1
      ),
    }
  }
}
