use nalgebra::{DMatrix, Scalar};
use std::fmt;

/// Identifies one of the five parallel per-molecule series of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Series {
    Structures,
    Charges,
    Names,
    Topologies,
    Dipoles,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::Structures,
        Series::Charges,
        Series::Names,
        Series::Topologies,
        Series::Dipoles,
    ];
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Structures => "structures",
                Self::Charges => "charges",
                Self::Names => "names",
                Self::Topologies => "topologies",
                Self::Dipoles => "dipoles",
            }
        )
    }
}

/// A series of equally shaped per-molecule blocks stored in one row-major buffer.
///
/// Every block is `rows x cols`; the buffer always holds exactly `len * rows * cols`
/// scalars. Only [`PaddedSeries::reshape`] reallocates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PaddedSeries<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
    len: usize,
}

impl<T: Scalar + Copy + Default> PaddedSeries<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Vec::new(),
            rows,
            cols,
            len: 0,
        }
    }

    /// Wraps an existing row-major buffer. Returns `None` if the buffer size is not a
    /// whole number of blocks.
    pub fn from_raw(data: Vec<T>, rows: usize, cols: usize) -> Option<Self> {
        let block = rows * cols;
        if block == 0 {
            return data.is_empty().then(|| Self::new(rows, cols));
        }
        if data.len() % block != 0 {
            return None;
        }
        let len = data.len() / block;
        Some(Self {
            data,
            rows,
            cols,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn block_len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn raw(&self) -> &[T] {
        &self.data
    }

    /// Checks the internal length bookkeeping.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.len * self.block_len()
    }

    pub fn block(&self, index: usize) -> &[T] {
        let n = self.block_len();
        &self.data[index * n..(index + 1) * n]
    }

    pub fn block_mut(&mut self, index: usize) -> &mut [T] {
        let n = self.block_len();
        &mut self.data[index * n..(index + 1) * n]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &[T]> {
        (0..self.len).map(move |i| self.block(i))
    }

    pub fn matrix(&self, index: usize) -> DMatrix<T> {
        DMatrix::from_row_slice(self.rows, self.cols, self.block(index))
    }

    pub fn matrices(&self) -> Vec<DMatrix<T>> {
        (0..self.len).map(|i| self.matrix(i)).collect()
    }

    pub fn push_matrix(&mut self, block: &DMatrix<T>) {
        debug_assert_eq!(block.shape(), (self.rows, self.cols));
        for r in 0..self.rows {
            for c in 0..self.cols {
                self.data.push(block[(r, c)]);
            }
        }
        self.len += 1;
    }

    pub fn push_slice(&mut self, block: &[T]) {
        debug_assert_eq!(block.len(), self.block_len());
        self.data.extend_from_slice(block);
        self.len += 1;
    }

    pub fn push_zeros(&mut self) {
        let n = self.block_len();
        self.data.resize(self.data.len() + n, T::default());
        self.len += 1;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
    }

    /// Re-pads or truncates every block to `rows x cols`, keeping the overlapping
    /// top-left region of each block.
    pub fn reshape(&mut self, rows: usize, cols: usize) {
        if (rows, cols) == (self.rows, self.cols) {
            return;
        }
        let mut data = Vec::with_capacity(self.len * rows * cols);
        for i in 0..self.len {
            let block = self.block(i);
            for r in 0..rows {
                for c in 0..cols {
                    let value = if r < self.rows && c < self.cols {
                        block[r * self.cols + c]
                    } else {
                        T::default()
                    };
                    data.push(value);
                }
            }
        }
        self.data = data;
        self.rows = rows;
        self.cols = cols;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PaddedSeries<f64> {
        let mut s = PaddedSeries::new(2, 3);
        s.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        s.push_zeros();
        s
    }

    #[test]
    fn push_and_access_blocks() {
        let s = sample();
        assert_eq!(s.len(), 2);
        assert_eq!(s.block(0), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(s.block(1).iter().all(|&v| v == 0.0));
        assert!(s.is_consistent());
    }

    #[test]
    fn matrix_view_is_row_major() {
        let s = sample();
        let m = s.matrix(0);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 0)], 4.0);
    }

    #[test]
    fn push_matrix_preserves_layout() {
        let mut s = PaddedSeries::new(2, 2);
        s.push_matrix(&DMatrix::from_row_slice(2, 2, &[1u8, 2, 3, 4]));
        assert_eq!(s.block(0), &[1, 2, 3, 4]);
        assert_eq!(s.matrix(0), DMatrix::from_row_slice(2, 2, &[1u8, 2, 3, 4]));
    }

    #[test]
    fn reshape_pads_and_truncates() {
        let mut s = sample();
        s.reshape(3, 3);
        assert_eq!(s.shape(), (3, 3));
        assert_eq!(&s.block(0)[..6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(&s.block(0)[6..], &[0.0, 0.0, 0.0]);

        s.reshape(1, 2);
        assert_eq!(s.block(0), &[1.0, 2.0]);
        assert!(s.is_consistent());
    }

    #[test]
    fn from_raw_rejects_partial_blocks() {
        assert!(PaddedSeries::<f64>::from_raw(vec![0.0; 5], 2, 2).is_none());
        let s = PaddedSeries::<f64>::from_raw(vec![0.0; 8], 2, 2).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn clear_empties_the_series_but_keeps_shape() {
        let mut s = sample();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.shape(), (2, 3));
        assert!(s.is_consistent());
    }
}
