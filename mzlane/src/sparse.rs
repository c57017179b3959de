//! Compressed sparse storage for lane x scan matrices.
//!
//! A [`CompressedRows`] matrix stores each lane as a run of `(scan, value)` entries,
//! and a [`CompressedColumns`] matrix is its transpose, used to pull out all lanes
//! observed in a single scan without walking every row.
use std::ops::Range;

use num_traits::Zero;

/// The values a sparse matrix can hold. An entry equal to zero is never stored.
pub trait SparseValue: Copy + PartialOrd + Zero {}

impl<T: Copy + PartialOrd + Zero> SparseValue for T {}

/// A borrowed view of the stored entries of a single row or column, sorted by
/// their position along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseSlice<'a, T> {
    pub indices: &'a [usize],
    pub values: &'a [T],
}

impl<'a, T: SparseValue> SparseSlice<'a, T> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, T)> + 'a {
        self.indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// The sub-slice whose positions fall in `span`
    pub fn restrict(&self, span: Range<usize>) -> SparseSlice<'a, T> {
        let i = self.indices.partition_point(|j| *j < span.start);
        let k = self.indices.partition_point(|j| *j < span.end);
        SparseSlice {
            indices: &self.indices[i..k],
            values: &self.values[i..k],
        }
    }

    /// Look up the value stored at `position`, or zero
    pub fn get(&self, position: usize) -> T {
        match self.indices.binary_search(&position) {
            Ok(i) => self.values[i],
            Err(_) => T::zero(),
        }
    }

    /// Expand the entries in `span` into a dense buffer of length `span.len()`
    pub fn densify(&self, span: Range<usize>) -> Vec<T> {
        let mut buffer = vec![T::zero(); span.len()];
        for (j, v) in self.restrict(span.clone()).iter() {
            buffer[j - span.start] = v;
        }
        buffer
    }

    /// The first position holding the largest stored value
    pub fn argmax(&self) -> Option<(usize, T)> {
        let mut best: Option<(usize, T)> = None;
        for (j, v) in self.iter() {
            match best {
                Some((_, b)) if !(v > b) => {}
                _ => best = Some((j, v)),
            }
        }
        best
    }
}

/// A compressed sparse row matrix
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressedRows<T> {
    n_cols: usize,
    offsets: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<T>,
}

impl<T: SparseValue> CompressedRows<T> {
    /// Create a matrix with `n_cols` columns and no rows
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            offsets: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a row from `(column, value)` entries in ascending column order.
    /// Zero values are skipped.
    pub fn push_row<I: IntoIterator<Item = (usize, T)>>(&mut self, entries: I) {
        for (j, v) in entries {
            debug_assert!(j < self.n_cols);
            if !v.is_zero() {
                self.indices.push(j);
                self.values.push(v);
            }
        }
        self.offsets.push(self.indices.len());
    }

    pub fn n_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols)
    }

    /// The number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, i: usize) -> SparseSlice<'_, T> {
        let span = self.offsets[i]..self.offsets[i + 1];
        SparseSlice {
            indices: &self.indices[span.clone()],
            values: &self.values[span],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseSlice<'_, T>> + '_ {
        (0..self.n_rows()).map(|i| self.row(i))
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self.row(i).get(j)
    }

    /// Densify row `i` over the column span `cols`
    pub fn row_dense(&self, i: usize, cols: Range<usize>) -> Vec<T> {
        self.row(i).densify(cols)
    }

    /// The first column holding the largest value in row `i`
    pub fn row_argmax(&self, i: usize) -> Option<(usize, T)> {
        self.row(i).argmax()
    }

    /// The column-wise maximum over the rows listed in `rows`
    pub fn column_max(&self, rows: &[usize]) -> Vec<T> {
        let mut acc = vec![T::zero(); self.n_cols];
        for i in rows.iter().copied() {
            for (j, v) in self.row(i).iter() {
                if v > acc[j] {
                    acc[j] = v;
                }
            }
        }
        acc
    }

    /// The column-wise sum over the rows listed in `rows`
    pub fn column_sum(&self, rows: &[usize]) -> Vec<T> {
        let mut acc = vec![T::zero(); self.n_cols];
        for i in rows.iter().copied() {
            for (j, v) in self.row(i).iter() {
                acc[j] = acc[j] + v;
            }
        }
        acc
    }

    /// For each column, the row among `rows` holding the largest stored value, keeping
    /// the earliest listed row on ties. Columns with no stored value in `rows` are `None`.
    pub fn column_argmax(&self, rows: &[usize]) -> Vec<Option<usize>> {
        let mut best: Vec<Option<(usize, T)>> = vec![None; self.n_cols];
        for i in rows.iter().copied() {
            for (j, v) in self.row(i).iter() {
                match best[j] {
                    Some((_, b)) if !(v > b) => {}
                    _ => best[j] = Some((i, v)),
                }
            }
        }
        best.into_iter().map(|b| b.map(|(i, _)| i)).collect()
    }

    /// Whether `other` stores entries in exactly the same cells
    pub fn same_pattern<U>(&self, other: &CompressedRows<U>) -> bool {
        self.n_cols == other.n_cols
            && self.offsets == other.offsets
            && self.indices == other.indices
    }

    /// Build the column-major transpose of this matrix
    pub fn to_columns(&self) -> CompressedColumns<T> {
        let mut counts = vec![0usize; self.n_cols + 1];
        for j in self.indices.iter() {
            counts[j + 1] += 1;
        }
        for j in 0..self.n_cols {
            counts[j + 1] += counts[j];
        }
        let offsets = counts.clone();
        let mut cursor = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut values = vec![T::zero(); self.nnz()];
        for (i, row) in self.rows().enumerate() {
            for (j, v) in row.iter() {
                let k = cursor[j];
                indices[k] = i;
                values[k] = v;
                cursor[j] += 1;
            }
        }
        CompressedColumns {
            n_rows: self.n_rows(),
            offsets,
            indices,
            values,
        }
    }
}

/// A compressed sparse column matrix, the transpose of a [`CompressedRows`] matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedColumns<T> {
    n_rows: usize,
    offsets: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<T>,
}

impl<T: SparseValue> CompressedColumns<T> {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn column(&self, j: usize) -> SparseSlice<'_, T> {
        let span = self.offsets[j]..self.offsets[j + 1];
        SparseSlice {
            indices: &self.indices[span.clone()],
            values: &self.values[span],
        }
    }

    pub fn column_dense(&self, j: usize) -> Vec<T> {
        self.column(j).densify(0..self.n_rows)
    }

    /// The row-wise maximum over the columns listed in `cols`
    pub fn row_max(&self, cols: &[usize]) -> Vec<T> {
        let mut acc = vec![T::zero(); self.n_rows];
        for j in cols.iter().copied() {
            for (i, v) in self.column(j).iter() {
                if v > acc[i] {
                    acc[i] = v;
                }
            }
        }
        acc
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn from_dense<T: SparseValue>(rows: &[Vec<T>], n_cols: usize) -> CompressedRows<T> {
        let mut m = CompressedRows::new(n_cols);
        for row in rows {
            m.push_row(row.iter().copied().enumerate());
        }
        m
    }

    fn example() -> CompressedRows<f32> {
        let rows: Vec<Vec<f32>> = vec![
            vec![0.0, 1.0, 0.0, 3.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![5.0, 0.0, 2.0, 3.0],
        ];
        from_dense(&rows, 4)
    }

    #[test]
    fn test_structure() {
        let m = example();
        assert_eq!(m.shape(), (3, 4));
        assert_eq!(m.nnz(), 5);
        assert_eq!(m.get(0, 3), 3.0);
        assert_eq!(m.get(1, 2), 0.0);
        assert!(m.row(1).is_empty());
        assert_eq!(m.row_dense(2, 1..4), vec![0.0, 2.0, 3.0]);
        assert_eq!(m.row_argmax(0), Some((3, 3.0)));
        assert_eq!(m.row_argmax(1), None);
    }

    #[test]
    fn test_column_reductions() {
        let m = example();
        assert_eq!(m.column_max(&[0, 1, 2]), vec![5.0, 1.0, 2.0, 3.0]);
        assert_eq!(m.column_sum(&[0, 2]), vec![5.0, 1.0, 2.0, 6.0]);
        assert_eq!(m.column_sum(&[]), vec![0.0; 4]);
        assert_eq!(
            m.column_argmax(&[0, 1, 2]),
            vec![Some(2), Some(0), Some(2), Some(0)]
        );
    }

    #[test]
    fn test_transpose() {
        let m = example();
        let t = m.to_columns();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.n_cols(), 4);
        assert_eq!(t.column_dense(3), vec![3.0, 0.0, 3.0]);
        assert_eq!(t.column(0).indices, &[2]);
        assert_eq!(t.row_max(&[1, 2]), vec![1.0, 0.0, 2.0]);
        for j in 0..4 {
            for i in 0..3 {
                assert_eq!(t.column(j).get(i), m.get(i, j));
            }
        }
    }

    #[test]
    fn test_same_pattern() {
        let m = example();
        let rows: Vec<Vec<f64>> = vec![
            vec![0.0, 101.0, 0.0, 101.1],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![99.0, 0.0, 99.1, 99.2],
        ];
        let masses = from_dense(&rows, 4);
        assert!(m.same_pattern(&masses));

        let mut shifted = CompressedRows::<f64>::new(4);
        shifted.push_row([(0, 1.0)]);
        assert!(!m.same_pattern(&shifted));
    }
}
