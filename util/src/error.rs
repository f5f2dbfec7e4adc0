use core::fmt;
use std::{
  error::Error,
  fmt::{Display, Formatter},
};

#[derive(Debug)]
pub enum GridGenError {
  Internal(String),
  Parse(String),
  InvalidWord(String),
  InvalidParam(String),
}

impl Display for GridGenError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      GridGenError::Internal(msg) => write!(f, "Internal error: {msg}"),
      GridGenError::Parse(msg) => write!(f, "Parse error: {msg}"),
      GridGenError::InvalidWord(word) => write!(f, "Invalid word: {word:?}"),
      GridGenError::InvalidParam(msg) => write!(f, "Invalid parameter: {msg}"),
    }
  }
}

impl Error for GridGenError {}

pub type GridGenResult<T = ()> = Result<T, Box<dyn Error>>;
