use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use util::error::GridGenResult;

/// Reads a word list: one word per line, lowercased, blank lines and '#'
/// comments skipped. Entries with characters outside a-z are dropped rather
/// than aborting the load.
pub fn load_word_file(path: &Path) -> GridGenResult<Vec<String>> {
  let reader = BufReader::new(File::open(path)?);

  let mut words = Vec::new();
  for line in reader.lines() {
    let word = line?.trim().to_ascii_lowercase();
    if word.is_empty() || word.starts_with('#') {
      continue;
    }
    if !word.chars().all(|c| c.is_ascii_lowercase()) {
      continue;
    }
    words.push(word);
  }

  Ok(words)
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

  use googletest::prelude::*;

  use super::load_word_file;

  #[gtest]
  fn test_load_skips_comments_and_junk() {
    let path = std::env::temp_dir().join(format!("xwgrid-words-{}.txt", std::process::id()));
    std::fs::write(&path, "# header\nCAT\n  dog  \n\nit's\ntree\n").unwrap();

    let words = load_word_file(&path);
    std::fs::remove_file(&path).ok();

    expect_that!(
      words.unwrap(),
      container_eq(["cat".to_owned(), "dog".to_owned(), "tree".to_owned()])
    );
  }

  #[gtest]
  fn test_load_missing_file_fails() {
    let result = load_word_file(std::path::Path::new("/definitely/not/here.txt"));
    expect_that!(result, err(anything()));
  }
}
