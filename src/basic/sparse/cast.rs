use nalgebra_sparse::CscMatrix;
use num_complex::Complex;

/// Lifts a real sparse matrix into the complex field, keeping its pattern.
pub(crate) trait Cast<T> {
    type Mat;

    fn cast(&self) -> Self::Mat;
}

impl Cast<Complex<f64>> for CscMatrix<f64> {
    type Mat = CscMatrix<Complex<f64>>;

    fn cast(&self) -> Self::Mat {
        let values = self.values().iter().map(|x| Complex::new(*x, 0.0)).collect();
        // SAFETY: one value per stored pattern index.
        unsafe {
            CscMatrix::try_from_pattern_and_values(self.pattern().clone(), values)
                .unwrap_unchecked()
        }
    }
}
