use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
  /// Side length of the square grid.
  #[arg(long, default_value_t = 5)]
  pub side_length: usize,

  /// File of preferred words, one per line; '#' starts a comment.
  #[arg(long)]
  pub words: PathBuf,

  /// File of obscure words, used to fill but not favored.
  #[arg(long)]
  pub obscure: Option<PathBuf>,

  /// File of words that must not appear in any grid.
  #[arg(long)]
  pub excluded: Option<PathBuf>,

  #[arg(long, default_value_t = 3)]
  pub min_word_length: usize,

  /// Defaults to the side length.
  #[arg(long)]
  pub max_word_length: Option<usize>,

  /// Print only the first grid and exit.
  #[arg(long)]
  pub first: bool,

  /// Print every grid without prompting.
  #[arg(long)]
  pub all: bool,

  /// Give up after this many seconds.
  #[arg(long, default_value_t = 60)]
  pub timeout_secs: u64,

  /// RNG seed; random when omitted.
  #[arg(long)]
  pub seed: Option<u64>,
}
