use std::f64::consts::PI;

use super::KernelFunction;
use crate::dimension::Float;
use crate::dimension::MVec;

/// Spline kernel, Monaghan & Lattanzio 1985. The smoothing length is
/// the full support radius: the classical B-spline of support 2h is
/// rescaled internally by 1/2.
pub struct CubicSpline {
    dim: usize,
    sigma: Float,
}

impl CubicSpline {
    pub fn new(dim: usize) -> Self {
        let sigma = match dim {
            1 => 4.0 / 3.0,
            2 => 40.0 / (7.0 * PI),
            3 => 8.0 / PI,
            _ => unreachable!(),
        };
        Self { dim, sigma }
    }

    fn f(q: Float) -> Float {
        if q < 0.5 {
            1.0 - 6.0 * q.powi(2) + 6.0 * q.powi(3)
        } else if q < 1.0 {
            2.0 * (1.0 - q).powi(3)
        } else {
            0.0
        }
    }

    fn df(q: Float) -> Float {
        if q < 0.5 {
            -12.0 * q + 18.0 * q.powi(2)
        } else if q < 1.0 {
            -6.0 * (1.0 - q).powi(2)
        } else {
            0.0
        }
    }

    /// Radial derivative dW/dr, used by the anisotropic product
    /// kernel for its planar factor.
    #[cfg(not(any(feature = "1d", feature = "2d")))]
    pub(crate) fn dw_radial(&self, r: Float, h: Float) -> Float {
        self.sigma / h.powi(self.dim as i32 + 1) * Self::df(r / h)
    }
}

impl KernelFunction for CubicSpline {
    fn w(&self, r: Float, h: Float) -> Float {
        self.sigma / h.powi(self.dim as i32) * Self::f(r / h)
    }

    fn dw(&self, r_ij: MVec, r: Float, h: Float) -> MVec {
        if r <= 0.0 {
            return MVec::ZERO;
        }
        r_ij / r * (self.sigma / h.powi(self.dim as i32 + 1) * Self::df(r / h))
    }

    fn dhw(&self, r: Float, h: Float) -> Float {
        let q = r / h;
        -self.sigma / h.powi(self.dim as i32 + 1) * (self.dim as Float * Self::f(q) + q * Self::df(q))
    }

    fn effective_dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "cubic_spline"
    }
}

#[cfg(test)]
mod tests {
    use super::CubicSpline;
    use crate::config::NUM_DIMENSIONS;
    use crate::kernel::tests::check_dhw_matches_finite_difference;
    use crate::kernel::tests::check_gradient_is_antisymmetric;
    use crate::kernel::tests::check_gradient_matches_finite_difference;
    use crate::kernel::tests::radial_integral;
    use crate::kernel::KernelFunction;

    #[test]
    fn normalized_to_unity() {
        for dim in 1..=3 {
            let kernel = CubicSpline::new(dim);
            assert!((radial_integral(&kernel, 0.7) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn compact_support() {
        let kernel = CubicSpline::new(NUM_DIMENSIONS);
        assert_eq!(kernel.w(1.0, 1.0), 0.0);
        assert_eq!(kernel.w(1.5, 1.0), 0.0);
        assert!(kernel.w(0.99, 1.0) > 0.0);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        check_gradient_matches_finite_difference(&CubicSpline::new(NUM_DIMENSIONS));
    }

    #[test]
    fn dhw_matches_finite_difference() {
        check_dhw_matches_finite_difference(&CubicSpline::new(NUM_DIMENSIONS));
    }

    #[test]
    fn gradient_is_antisymmetric() {
        check_gradient_is_antisymmetric(&CubicSpline::new(NUM_DIMENSIONS));
    }
}
