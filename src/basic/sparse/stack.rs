use nalgebra_sparse::{CscMatrix, pattern::SparsityPattern};

/// Concatenates CSC matrices side by side. All inputs must have the same number of rows.
pub fn csc_hstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let nrows = matrices[0].nrows();
    let mut ncols = 0;
    let mut nnz = 0;
    for mat in matrices {
        assert_eq!(
            mat.nrows(),
            nrows,
            "All matrices must have the same number of rows"
        );
        ncols += mat.ncols();
        nnz += mat.nnz();
    }

    let mut values: Vec<T> = Vec::with_capacity(nnz);
    let mut row_indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut col_offsets: Vec<usize> = Vec::with_capacity(ncols + 1);
    for mat in matrices {
        let offset = values.len();
        col_offsets.extend(mat.col_offsets()[..mat.ncols()].iter().map(|x| x + offset));
        row_indices.extend_from_slice(mat.row_indices());
        values.extend_from_slice(mat.values());
    }
    col_offsets.push(nnz);

    // each block keeps its sorted, in-bounds row indices
    unsafe {
        let pattern =
            SparsityPattern::from_offset_and_indices_unchecked(ncols, nrows, col_offsets, row_indices);
        CscMatrix::try_from_pattern_and_values(pattern, values).unwrap_unchecked()
    }
}

/// Concatenates CSC matrices on top of each other. All inputs must have the same number of columns.
pub fn csc_vstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let ncols = matrices[0].ncols();
    let mut nrows = 0;
    let mut nnz = 0;
    for mat in matrices {
        assert_eq!(
            mat.ncols(),
            ncols,
            "All matrices must have the same number of columns"
        );
        nrows += mat.nrows();
        nnz += mat.nnz();
    }

    let mut values: Vec<T> = Vec::with_capacity(nnz);
    let mut row_indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut col_offsets: Vec<usize> = vec![0; ncols + 1];
    for col in 0..ncols {
        let mut row_offset = 0;
        for mat in matrices {
            let (start, end) = (mat.col_offsets()[col], mat.col_offsets()[col + 1]);
            values.extend_from_slice(&mat.values()[start..end]);
            row_indices.extend(mat.row_indices()[start..end].iter().map(|r| r + row_offset));
            row_offset += mat.nrows();
        }
        col_offsets[col + 1] = values.len();
    }

    unsafe {
        let pattern =
            SparsityPattern::from_offset_and_indices_unchecked(ncols, nrows, col_offsets, row_indices);
        CscMatrix::try_from_pattern_and_values(pattern, values).unwrap_unchecked()
    }
}
