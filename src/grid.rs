use crate::error::{ParcError, Result};
use ndarray::Array2;

/// Spatial extent of one image or field snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub width: usize,  // Number of rows (first spatial axis)
    pub height: usize, // Number of columns (second spatial axis)
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Grid { width, height }
    }

    pub fn square(side: usize) -> Self {
        Grid::new(side, side)
    }

    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    pub fn covers(&self, size: usize) -> bool {
        self.width >= size && self.height >= size
    }

    /// Reshapes row-major values onto the grid.
    pub fn from_flat(&self, values: Vec<f64>) -> Result<Array2<f64>> {
        if values.len() != self.cells() {
            return Err(ParcError::shape(
                "field grid",
                (self.width, self.height),
                values.len(),
            ));
        }
        Array2::from_shape_vec((self.width, self.height), values)
            .map_err(|e| ParcError::shape("field grid", (self.width, self.height), e.to_string()))
    }

    /// Grid after non-overlapping pooling with the given window.
    pub fn pooled(&self, window: usize) -> Self {
        Grid::new(self.width / window, self.height / window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshapes_row_major() {
        let grid = Grid::new(2, 3);
        let arr = grid.from_flat(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(arr[[0, 2]], 2.0);
        assert_eq!(arr[[1, 0]], 3.0);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Grid::square(3).from_flat(vec![0.0; 8]).unwrap_err();
        assert!(matches!(err, ParcError::ShapeMismatch { .. }));
    }

    #[test]
    fn coverage_and_pooling() {
        let grid = Grid::new(485, 485);
        assert!(grid.covers(480));
        assert!(!Grid::new(479, 500).covers(480));
        assert_eq!(Grid::square(480).pooled(2), Grid::square(240));
        assert_eq!(grid.cells(), 485 * 485);
    }
}
