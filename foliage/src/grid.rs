//! Dense chunk-coordinate index into a layer's live chunk list.

use bevy::math::UVec2;

use crate::chunk::ChunkCoord;

/// Maps chunk coordinates to live-list indices. `None` marks an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Option<usize>>,
}

impl ChunkGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![None; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Whether the grid is at least `required` on both axes.
    pub fn fits(&self, required: UVec2) -> bool {
        self.cols >= required.x as usize && self.rows >= required.y as usize
    }

    fn index(&self, coord: ChunkCoord) -> Option<usize> {
        let x = usize::try_from(coord.x).ok()?;
        let y = usize::try_from(coord.y).ok()?;
        (x < self.cols && y < self.rows).then_some(x * self.rows + y)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.index(coord).is_some()
    }

    /// Live-list index stored at `coord`; `None` for empty or out-of-range cells.
    pub fn get(&self, coord: ChunkCoord) -> Option<usize> {
        self.index(coord).and_then(|i| self.cells[i])
    }

    /// Stores `chunk` at `coord`. Returns `false` if `coord` is outside the grid.
    pub fn set(&mut self, coord: ChunkCoord, chunk: usize) -> bool {
        match self.index(coord) {
            Some(i) => {
                self.cells[i] = Some(chunk);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, coord: ChunkCoord) {
        if let Some(i) = self.index(coord) {
            self.cells[i] = None;
        }
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_all_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}
