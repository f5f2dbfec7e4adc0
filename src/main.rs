#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod args;
mod words;

use std::{
  io::{self, BufRead, Write},
  time::Duration,
};

use args::Args;
use clap::Parser;
use grid_gen::{context::Deadline, create_generator, Context, GeneratorParams};
use rand::{rngs::StdRng, SeedableRng};
use util::{error::GridGenResult, time::time_fn};
use words::load_word_file;

fn main() -> GridGenResult {
  let args = Args::parse();

  let preferred = load_word_file(&args.words)?;
  let obscure = args
    .obscure
    .as_deref()
    .map(load_word_file)
    .transpose()?
    .unwrap_or_default();
  let excluded = args
    .excluded
    .as_deref()
    .map(load_word_file)
    .transpose()?
    .unwrap_or_default();

  println!("Preferred words: {}", preferred.len());
  println!("Obscure words: {}", obscure.len());
  println!("Excluded words: {}", excluded.len());

  let rng = match args.seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  };

  let generator = create_generator(
    args.side_length,
    preferred,
    obscure,
    excluded,
    rng,
    GeneratorParams {
      min_word_length: Some(args.min_word_length),
      max_word_length: args.max_word_length,
    },
  )?;

  let ctx = Deadline::after(Duration::from_secs(args.timeout_secs));
  let mut grids = generator.possible_grids(&ctx);
  let stdin = io::stdin();

  loop {
    let (elapsed, grid) = time_fn(|| grids.next());
    let Some(grid) = grid else { break };

    println!("--------------------------------");
    println!("{grid}");
    println!("(found in {elapsed:?})");

    if args.first {
      break;
    }
    if args.all {
      continue;
    }

    print!("Continue? [Y/n]: ");
    io::stdout().flush()?;
    let mut input = String::new();
    stdin.lock().read_line(&mut input)?;
    match input.trim() {
      "n" | "N" => break,
      "s" | "S" => println!("{}", grid.debug_string()),
      _ => {}
    }
  }

  println!("--------------------------------");
  if ctx.is_cancelled() {
    println!("Deadline exceeded");
  }
  println!("Done");

  Ok(())
}
