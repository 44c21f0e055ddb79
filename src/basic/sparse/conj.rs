use nalgebra_sparse::CscMatrix;
use num_complex::Complex;
use num_traits::Num;
use std::ops::Neg;

/// Trait for computing the conjugate of a matrix.
pub(crate) trait Conjugate {
    type Mat;

    /// Returns the conjugate of the matrix.
    fn conjugate(&self) -> Self::Mat;

    /// Computes the conjugate of the matrix in-place.
    fn conjugate_mut(&mut self);
}

impl<T: Clone + Num + Neg<Output = T>> Conjugate for CscMatrix<Complex<T>> {
    type Mat = CscMatrix<Complex<T>>;

    fn conjugate(&self) -> Self::Mat {
        let mut out = self.clone();
        out.conjugate_mut();
        out
    }

    fn conjugate_mut(&mut self) {
        self.values_mut().iter_mut().for_each(|v| *v = v.conj());
    }
}

/// Trait for splitting a complex matrix into real and imaginary parts with the same pattern.
pub(crate) trait RealImage {
    type Mat;

    /// Returns the real and imaginary parts of the matrix.
    fn real_imag(&self) -> (Self::Mat, Self::Mat);
}

impl<T: Clone> RealImage for CscMatrix<Complex<T>> {
    type Mat = CscMatrix<T>;

    fn real_imag(&self) -> (Self::Mat, Self::Mat) {
        let re = self.values().iter().map(|v| v.re.clone()).collect();
        let im = self.values().iter().map(|v| v.im.clone()).collect();
        // SAFETY: both value vectors have exactly one entry per stored pattern index.
        unsafe {
            (
                CscMatrix::try_from_pattern_and_values(self.pattern().clone(), re)
                    .unwrap_unchecked(),
                CscMatrix::try_from_pattern_and_values(self.pattern().clone(), im)
                    .unwrap_unchecked(),
            )
        }
    }
}
