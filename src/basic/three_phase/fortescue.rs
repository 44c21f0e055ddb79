//! Symmetrical-component (Fortescue) transform between phase `abc` and sequence `012` phasors.
//!
//! `V_abc = A · V_012` with
//!
//! ```text
//!     [ 1  1   1  ]
//! A = [ 1  a²  a  ]      a = e^{j2π/3}
//!     [ 1  a   a² ]
//! ```
//!
//! and `V_012 = A⁻¹ · V_abc`, `A⁻¹ = (1/3)·[[1,1,1],[1,a,a²],[1,a²,a]]`.
//! Currents use the same transform.

use nalgebra::{DVector, Matrix3, Vector3};
use num_complex::Complex64;

/// A phasor triplet, either `[a, b, c]` or `[0, 1, 2]` depending on context.
pub type Triplet = Vector3<Complex64>;

/// Rotation operator `a = e^{j2π/3}`.
pub const A: Complex64 = Complex64::new(-0.5, 0.866_025_403_784_438_6);
/// `a² = e^{-j2π/3}`.
pub const A2: Complex64 = Complex64::new(-0.5, -0.866_025_403_784_438_6);

const ONE: Complex64 = Complex64::new(1.0, 0.0);
const THIRD: Complex64 = Complex64::new(1.0 / 3.0, 0.0);

/// The sequence-to-phase matrix `A`.
pub fn transform_matrix() -> Matrix3<Complex64> {
    Matrix3::new(ONE, ONE, ONE, ONE, A2, A, ONE, A, A2)
}

/// The phase-to-sequence matrix `A⁻¹`.
pub fn inverse_transform_matrix() -> Matrix3<Complex64> {
    Matrix3::new(ONE, ONE, ONE, ONE, A, A2, ONE, A2, A) * THIRD
}

/// `[V0, V1, V2] -> [Va, Vb, Vc]`
#[inline]
pub fn sequence_to_phase(v012: &Triplet) -> Triplet {
    Triplet::new(
        v012[0] + v012[1] + v012[2],
        v012[0] + A2 * v012[1] + A * v012[2],
        v012[0] + A * v012[1] + A2 * v012[2],
    )
}

/// `[Va, Vb, Vc] -> [V0, V1, V2]`
#[inline]
pub fn phase_to_sequence(vabc: &Triplet) -> Triplet {
    Triplet::new(
        (vabc[0] + vabc[1] + vabc[2]) * THIRD,
        (vabc[0] + A * vabc[1] + A2 * vabc[2]) * THIRD,
        (vabc[0] + A2 * vabc[1] + A * vabc[2]) * THIRD,
    )
}

/// Phase values of every bus from the three per-sequence vectors.
pub fn sequence_to_phase_buses(v012: &[DVector<Complex64>; 3]) -> Vec<Triplet> {
    (0..v012[0].len())
        .map(|k| sequence_to_phase(&Triplet::new(v012[0][k], v012[1][k], v012[2][k])))
        .collect()
}

/// Per-sequence vectors from the phase values of every bus.
pub fn phase_to_sequence_buses(abc: &[Triplet]) -> [DVector<Complex64>; 3] {
    let seq: Vec<Triplet> = abc.iter().map(phase_to_sequence).collect();
    std::array::from_fn(|s| DVector::from_iterator(seq.len(), seq.iter().map(|t| t[s])))
}

/// Phase-domain primitive admittance `A · diag(y0, y1, y2) · A⁻¹` of a sequence-decoupled element.
pub fn phase_admittance(y012: &Triplet) -> Matrix3<Complex64> {
    transform_matrix() * Matrix3::from_diagonal(y012) * inverse_transform_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Triplet, b: &Triplet, tol: f64) -> bool {
        (a - b).iter().all(|d| d.norm() < tol)
    }

    #[test]
    fn test_operator_identities() {
        assert!((A * A - A2).norm() < 1e-15);
        assert!((A * A2 - ONE).norm() < 1e-15);
        assert!((ONE + A + A2).norm() < 1e-15);
        let expected = Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI / 3.0);
        assert!((A - expected).norm() < 1e-15);
    }

    #[test]
    fn test_matrix_inverse() {
        let id = transform_matrix() * inverse_transform_matrix();
        assert!((id - Matrix3::identity()).norm() < 1e-14, "A·A⁻¹ = {id}");
    }

    #[test]
    fn test_positive_sequence_is_abc_rotation() {
        let v = sequence_to_phase(&Triplet::new(Complex64::new(0.0, 0.0), ONE, Complex64::new(0.0, 0.0)));
        assert!(close(&v, &Triplet::new(ONE, A2, A), 1e-15));
        for p in v.iter() {
            assert!((p.norm() - 1.0).abs() < 1e-15);
        }
        // phase b lags phase a by 120 degrees
        assert!((v[1].arg().to_degrees() + 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sequence_is_common_mode() {
        let v0 = Complex64::new(0.2, -0.1);
        let v = sequence_to_phase(&Triplet::new(v0, Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)));
        assert!(close(&v, &Triplet::new(v0, v0, v0), 1e-15));
    }

    #[test]
    fn test_single_phase_current_splits_equally() {
        let i = Complex64::new(3.0, -1.5);
        let seq = phase_to_sequence(&Triplet::new(i, Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)));
        assert!(close(&seq, &Triplet::new(i / 3.0, i / 3.0, i / 3.0), 1e-15));
    }

    #[test]
    fn test_matrix_and_inline_forms_agree() {
        let v = Triplet::new(
            Complex64::new(0.9, 0.1),
            Complex64::new(-0.4, -0.8),
            Complex64::new(-0.5, 0.9),
        );
        assert!(close(&sequence_to_phase(&v), &(transform_matrix() * v), 1e-14));
        assert!(close(&phase_to_sequence(&v), &(inverse_transform_matrix() * v), 1e-14));
    }

    #[test]
    fn test_phase_admittance_of_balanced_element_is_diagonal() {
        let y = Complex64::new(2.0, -5.0);
        let yabc = phase_admittance(&Triplet::new(y, y, y));
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { y } else { Complex64::new(0.0, 0.0) };
                assert!((yabc[(r, c)] - expected).norm() < 1e-13);
            }
        }
    }

    #[test]
    fn test_phase_admittance_maps_sequence_currents() {
        let y012 = Triplet::new(
            Complex64::new(1.0, -3.0),
            Complex64::new(4.0, -12.0),
            Complex64::new(4.0, -12.0),
        );
        let v012 = Triplet::new(
            Complex64::new(0.05, 0.01),
            Complex64::new(0.98, -0.1),
            Complex64::new(-0.02, 0.03),
        );
        let i_phase = phase_admittance(&y012) * sequence_to_phase(&v012);
        let i_seq = y012.component_mul(&v012);
        assert!(close(&phase_to_sequence(&i_phase), &i_seq, 1e-12));
    }

    #[test]
    fn test_bus_vectors() {
        let v012 = [
            DVector::from_vec(vec![Complex64::new(0.01, 0.0), Complex64::new(0.0, 0.0)]),
            DVector::from_vec(vec![ONE, Complex64::new(0.95, -0.05)]),
            DVector::from_vec(vec![Complex64::new(0.0, 0.02), Complex64::new(0.0, 0.0)]),
        ];
        let abc = sequence_to_phase_buses(&v012);
        assert_eq!(abc.len(), 2);
        assert!(close(
            &abc[1],
            &sequence_to_phase(&Triplet::new(v012[0][1], v012[1][1], v012[2][1])),
            1e-15
        ));
        let back = phase_to_sequence_buses(&abc);
        for s in 0..3 {
            assert!((&back[s] - &v012[s]).iter().all(|d| d.norm() < 1e-14));
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn triplet() -> impl Strategy<Value = Triplet> {
            prop::array::uniform6(-1e3f64..1e3).prop_map(|x| {
                Triplet::new(
                    Complex64::new(x[0], x[1]),
                    Complex64::new(x[2], x[3]),
                    Complex64::new(x[4], x[5]),
                )
            })
        }

        proptest! {
            #[test]
            fn round_trip_from_sequence(v in triplet()) {
                let back = phase_to_sequence(&sequence_to_phase(&v));
                let scale = 1.0 + v.iter().map(|x| x.norm()).fold(0.0, f64::max);
                prop_assert!(close(&back, &v, 1e-12 * scale));
            }

            #[test]
            fn round_trip_from_phase(v in triplet()) {
                let back = sequence_to_phase(&phase_to_sequence(&v));
                let scale = 1.0 + v.iter().map(|x| x.norm()).fold(0.0, f64::max);
                prop_assert!(close(&back, &v, 1e-12 * scale));
            }

            #[test]
            fn unit_phasors_round_trip_within_1e9(angles in prop::array::uniform3(-180.0f64..180.0)) {
                let v = Triplet::new(
                    Complex64::from_polar(1.0, angles[0].to_radians()),
                    Complex64::from_polar(1.0, angles[1].to_radians()),
                    Complex64::from_polar(1.0, angles[2].to_radians()),
                );
                prop_assert!(close(&phase_to_sequence(&sequence_to_phase(&v)), &v, 1e-9));
            }
        }
    }
}
