use std::f64::consts::PI;

use super::KernelFunction;
use crate::dimension::Float;
use crate::dimension::MVec;

/// Wendland C4 kernel with the normalizations of Dehnen & Aly 2012.
/// Less prone to the pairing instability than the cubic spline at
/// large neighbor numbers.
pub struct WendlandC4 {
    dim: usize,
    sigma: Float,
}

impl WendlandC4 {
    pub fn new(dim: usize) -> Self {
        let sigma = match dim {
            1 => 3.0 / 2.0,
            2 => 9.0 / PI,
            3 => 495.0 / (32.0 * PI),
            _ => unreachable!(),
        };
        Self { dim, sigma }
    }

    fn f(&self, q: Float) -> Float {
        if q >= 1.0 {
            return 0.0;
        }
        if self.dim == 1 {
            (1.0 - q).powi(5) * (1.0 + 5.0 * q + 8.0 * q.powi(2))
        } else {
            (1.0 - q).powi(6) * (1.0 + 6.0 * q + 35.0 / 3.0 * q.powi(2))
        }
    }

    fn df(&self, q: Float) -> Float {
        if q >= 1.0 {
            return 0.0;
        }
        if self.dim == 1 {
            -14.0 * q * (1.0 - q).powi(4) * (1.0 + 4.0 * q)
        } else {
            -56.0 / 3.0 * q * (1.0 - q).powi(5) * (1.0 + 5.0 * q)
        }
    }
}

impl KernelFunction for WendlandC4 {
    fn w(&self, r: Float, h: Float) -> Float {
        self.sigma / h.powi(self.dim as i32) * self.f(r / h)
    }

    fn dw(&self, r_ij: MVec, r: Float, h: Float) -> MVec {
        if r <= 0.0 {
            return MVec::ZERO;
        }
        r_ij / r * (self.sigma / h.powi(self.dim as i32 + 1) * self.df(r / h))
    }

    fn dhw(&self, r: Float, h: Float) -> Float {
        let q = r / h;
        -self.sigma / h.powi(self.dim as i32 + 1)
            * (self.dim as Float * self.f(q) + q * self.df(q))
    }

    fn effective_dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "wendland_c4"
    }
}

#[cfg(test)]
mod tests {
    use super::WendlandC4;
    use crate::config::NUM_DIMENSIONS;
    use crate::kernel::tests::check_dhw_matches_finite_difference;
    use crate::kernel::tests::check_gradient_is_antisymmetric;
    use crate::kernel::tests::check_gradient_matches_finite_difference;
    use crate::kernel::tests::radial_integral;
    use crate::kernel::KernelFunction;

    #[test]
    fn normalized_to_unity() {
        for dim in 1..=3 {
            let kernel = WendlandC4::new(dim);
            assert!((radial_integral(&kernel, 1.4) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn gradient_matches_finite_difference() {
        check_gradient_matches_finite_difference(&WendlandC4::new(NUM_DIMENSIONS));
    }

    #[test]
    fn dhw_matches_finite_difference() {
        check_dhw_matches_finite_difference(&WendlandC4::new(NUM_DIMENSIONS));
    }

    #[test]
    fn gradient_is_antisymmetric() {
        check_gradient_is_antisymmetric(&WendlandC4::new(NUM_DIMENSIONS));
    }
}
