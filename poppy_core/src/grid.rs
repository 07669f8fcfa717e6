use std::fmt;

use serde::{Deserialize, Serialize};

pub const GRID_WIDTH: usize = 5;
pub const GRID_SIZE: usize = GRID_WIDTH * GRID_WIDTH;

/// Flat board of mine flags, laid out row-major (`index = row * width + col`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineGrid {
    pub cells: Vec<bool>,
    pub width: usize,
}

impl MineGrid {
    /// `width` is the row length; a zero width is treated as 1.
    pub fn empty(grid_size: usize, width: usize) -> Self {
        Self {
            cells: vec![false; grid_size],
            width: width.max(1),
        }
    }

    /// Out-of-range indices are ignored.
    pub fn from_cells(mines: &[usize], grid_size: usize, width: usize) -> Self {
        let mut grid = Self::empty(grid_size, width);
        for &i in mines {
            if let Some(cell) = grid.cells.get_mut(i) {
                *cell = true;
            }
        }
        grid
    }

    pub fn is_mine(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Mine indices in ascending order.
    pub fn mine_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, mine)| mine.then_some(i))
            .collect()
    }

    pub fn rows(&self) -> Vec<Vec<bool>> {
        self.cells.chunks(self.width.max(1)).map(<[bool]>::to_vec).collect()
    }
}

impl fmt::Display for MineGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: Vec<&str> = row.iter().map(|m| if *m { "X" } else { "." }).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let grid = MineGrid::from_cells(&[0, 6, 24], GRID_SIZE, GRID_WIDTH);
        let rows = grid.rows();
        assert_eq!(rows.len(), 5);
        assert!(rows[0][0]);
        assert!(rows[1][1]);
        assert!(rows[4][4]);
        assert_eq!(grid.mine_count(), 3);
        assert_eq!(grid.mine_indices(), vec![0, 6, 24]);
    }

    #[test]
    fn test_custom_width_rows() {
        let grid = MineGrid::from_cells(&[0, 7, 63], 64, 8);
        let rows = grid.rows();
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.len() == 8));
        assert!(rows[0][0]);
        assert!(rows[0][7]);
        assert!(rows[7][7]);
    }

    #[test]
    fn test_out_of_range_ignored() {
        let grid = MineGrid::from_cells(&[3, 25, 99], GRID_SIZE, GRID_WIDTH);
        assert_eq!(grid.mine_indices(), vec![3]);
        assert!(!grid.is_mine(25));
    }

    #[test]
    fn test_display() {
        let grid = MineGrid::from_cells(&[1, 24], GRID_SIZE, GRID_WIDTH);
        let text = grid.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ". X . . .");
        assert_eq!(lines[4], ". . . . X");
    }
}
