use std::fmt::{Display, Formatter};

use itertools::Itertools;
use util::{
  error::GridGenResult,
  grid::{Grid as CellGrid, Gridlike},
  pos::Pos,
};

/// A fully-decided board: every cell is a letter or the blocked marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
  cells: CellGrid<char>,
}

impl Grid {
  pub(crate) fn from_rows(rows: Vec<Vec<char>>) -> GridGenResult<Self> {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, Vec::len) as u32;
    let cells = CellGrid::from_vec(rows.concat(), width, height)?;
    Ok(Self { cells })
  }

  pub fn width(&self) -> usize {
    self.cells.width() as usize
  }

  pub fn height(&self) -> usize {
    self.cells.height() as usize
  }

  pub fn get(&self, x: usize, y: usize) -> Option<char> {
    self.cells.get(Pos { x: x as i32, y: y as i32 }).copied()
  }

  pub(crate) fn row(&self, y: usize) -> impl Iterator<Item = char> + '_ {
    self.cells.iter_row(y as u32).copied()
  }

  pub(crate) fn col(&self, x: usize) -> impl Iterator<Item = char> + '_ {
    self.cells.iter_col(x as u32).copied()
  }

  /// Newline-joined rows, lowercase letters plus the blocked marker.
  pub fn repr(&self) -> String {
    (0..self.height()).map(|y| self.row(y).collect::<String>()).join("\n")
  }

  pub fn debug_string(&self) -> String {
    format!(
      "Grid{{width: {}, height: {}, cells: {:?}}}",
      self.width(),
      self.height(),
      (0..self.height()).map(|y| self.row(y).collect::<String>()).collect_vec(),
    )
  }
}

impl Display for Grid {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.repr())
  }
}
