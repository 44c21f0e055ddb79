use nalgebra::{ClosedAddAssign, Scalar};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_traits::Zero;

/// Extracts the block of `shape` whose top-left corner sits at `start_pos` (row, col).
pub fn slice_csc_matrix_block<T: Scalar + ClosedAddAssign + Zero>(
    mat: &CscMatrix<T>,
    start_pos: (usize, usize),
    shape: (usize, usize),
) -> CscMatrix<T> {
    let (start_row, start_col) = start_pos;
    let (end_row, end_col) = (start_row + shape.0, start_col + shape.1);

    let mut coo = CooMatrix::new(shape.0, shape.1);
    for (r, c, v) in mat.triplet_iter() {
        if (start_row..end_row).contains(&r) && (start_col..end_col).contains(&c) {
            coo.push(r - start_row, c - start_col, v.clone());
        }
    }
    CscMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_extraction() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 1.0);
        coo.push(1, 1, 2.0);
        coo.push(2, 1, 4.0);
        coo.push(2, 2, 3.0);
        let a = CscMatrix::from(&coo);

        let block = slice_csc_matrix_block(&a, (1, 1), (2, 2));
        let dense = nalgebra::DMatrix::from(&block);
        assert_eq!(dense, nalgebra::dmatrix![2.0, 0.0; 4.0, 3.0]);

        let empty = slice_csc_matrix_block(&a, (0, 1), (1, 2));
        assert_eq!(empty.nnz(), 0);
    }
}
