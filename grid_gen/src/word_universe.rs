use std::{cell::OnceCell, collections::HashMap, rc::Rc};

use crate::charset::{char_index, NUM_CHARS};

/// Immutable index of every word of one length, shared by all word-set values
/// drawn from it.
///
/// The word order is preferred-first; `obscure_idx` is the boundary. The mask
/// tensor and the word→index map are built lazily, one-shot, on first use.
pub(crate) struct WordUniverse {
  words: Vec<String>,
  obscure_idx: usize,
  num_letters: usize,
  blocks: usize,

  /// Flattened 3D tensor of word-membership bitsets.
  ///
  /// Conceptually `masks[pos][char_idx]` is the bitset of words whose `pos`-th
  /// character is `char_idx`, each bitset stored as `blocks` u64 limbs so a
  /// word-set bitset can be intersected against it limb by limb:
  ///
  ///   base = (pos * NUM_CHARS + char_idx) * blocks
  ///   masks[base + limb]
  masks: OnceCell<Vec<u64>>,
  index_by_word: OnceCell<HashMap<String, usize>>,
}

impl WordUniverse {
  pub fn new(words: Vec<String>, obscure_idx: usize) -> Rc<Self> {
    debug_assert!(!words.is_empty());
    debug_assert!(obscure_idx <= words.len());
    let num_letters = words.first().map_or(0, |w| w.len());
    debug_assert!(words.iter().all(|w| w.len() == num_letters));

    let blocks = words.len().div_ceil(64);
    Rc::new(Self {
      words,
      obscure_idx,
      num_letters,
      blocks,
      masks: OnceCell::new(),
      index_by_word: OnceCell::new(),
    })
  }

  pub fn words(&self) -> &[String] {
    &self.words
  }

  pub fn word(&self, idx: usize) -> &str {
    &self.words[idx]
  }

  pub fn obscure_idx(&self) -> usize {
    self.obscure_idx
  }

  pub fn num_letters(&self) -> usize {
    self.num_letters
  }

  pub fn blocks(&self) -> usize {
    self.blocks
  }

  pub fn masks(&self) -> &[u64] {
    self.masks.get_or_init(|| {
      let mut masks = vec![0u64; self.num_letters * NUM_CHARS * self.blocks];
      for (wi, word) in self.words.iter().enumerate() {
        let limb = wi / 64;
        let bit = wi % 64;
        for (pos, c) in word.chars().enumerate() {
          let base = (pos * NUM_CHARS + char_index(c)) * self.blocks;
          masks[base + limb] |= 1 << bit;
        }
      }
      masks
    })
  }

  pub fn index_by_word(&self) -> &HashMap<String, usize> {
    self.index_by_word.get_or_init(|| {
      self
        .words
        .iter()
        .enumerate()
        .map(|(idx, word)| (word.clone(), idx))
        .collect()
    })
  }

  /// Base index into `masks()` for (pos, char_idx); valid limbs follow at
  /// `base..base + blocks`.
  pub fn mask_base(&self, pos: usize, char_idx: usize) -> usize {
    (pos * NUM_CHARS + char_idx) * self.blocks
  }

  /// A bitset with one bit set per word in this universe.
  pub fn full_set(&self) -> Vec<u64> {
    let mut set = vec![!0u64; self.blocks];
    let rem = self.words.len() % 64;
    if rem != 0 {
      if let Some(last) = set.last_mut() {
        *last = (1u64 << rem) - 1;
      }
    }
    set
  }
}

pub(crate) fn first_set_bit(set: &[u64]) -> Option<usize> {
  set
    .iter()
    .enumerate()
    .find(|(_, &limb)| limb != 0)
    .map(|(li, &limb)| li * 64 + limb.trailing_zeros() as usize)
}

pub(crate) fn iter_set_bits(set: &[u64]) -> impl Iterator<Item = usize> + '_ {
  set.iter().enumerate().flat_map(|(li, &limb)| {
    std::iter::successors(
      if limb == 0 { None } else { Some(limb) },
      |&b| {
        let next = b & (b - 1);
        (next != 0).then_some(next)
      },
    )
    .map(move |b| li * 64 + b.trailing_zeros() as usize)
  })
}

pub(crate) fn count_set_bits(set: &[u64]) -> u64 {
  set.iter().map(|limb| u64::from(limb.count_ones())).sum()
}

pub(crate) fn has_bit(set: &[u64], idx: usize) -> bool {
  (set[idx / 64] & (1u64 << (idx % 64))) != 0
}

/// Clears `idx` in `set`, returning whether it was previously set.
pub(crate) fn clear_bit(set: &mut [u64], idx: usize) -> bool {
  let mask = 1u64 << (idx % 64);
  let had = (set[idx / 64] & mask) != 0;
  set[idx / 64] &= !mask;
  had
}
