mod cubic_spline;
mod wendland;

#[cfg(not(any(feature = "1d", feature = "2d")))]
mod anisotropic;

#[cfg(not(any(feature = "1d", feature = "2d")))]
pub use anisotropic::Anisotropic;
pub use cubic_spline::CubicSpline;
pub use wendland::WendlandC4;

use crate::dimension::Float;
use crate::dimension::MVec;

/// The kernel capability used by all interaction loops. `w`, `dw` and
/// `dhw` are the isotropic entry points; the anisotropic product
/// kernel rejects them and is reached through the `*_aniso` methods
/// instead (its effective dimension is 2 even in a 3D build).
pub trait KernelFunction: Send + Sync {
    /// Kernel value W(r, h); zero for r >= h.
    fn w(&self, r: Float, h: Float) -> Float;
    /// Kernel gradient with respect to the first particle position;
    /// antisymmetric in r_ij.
    fn dw(&self, r_ij: MVec, r: Float, h: Float) -> MVec;
    /// Analytic derivative of W with respect to the smoothing length.
    fn dhw(&self, r: Float, h: Float) -> Float;
    /// The dimension entering kernel normalization and the
    /// neighbor-count formula.
    fn effective_dimension(&self) -> usize;

    fn is_anisotropic(&self) -> bool {
        false
    }

    fn w_aniso(&self, _r_xy: Float, _z: Float, _h: Float) -> Float {
        unsupported(self, "w_aniso")
    }

    fn dw_aniso(&self, _r_ij: MVec, _h: Float) -> MVec {
        unsupported(self, "dw_aniso")
    }

    fn dhw_aniso(&self, _r_xy: Float, _z: Float, _h: Float) -> Float {
        unsupported(self, "dhw_aniso")
    }

    fn name(&self) -> &'static str;
}

fn unsupported<T>(kernel: &(impl KernelFunction + ?Sized), entry: &str) -> T {
    panic!("{} does not support the {} entry point", kernel.name(), entry)
}

/// Routes a kernel evaluation to the isotropic or anisotropic entry
/// points depending on the kernel kind. The interaction loops only
/// use these helpers.
pub fn kernel_value(kernel: &dyn KernelFunction, r_ij: MVec, r: Float, h: Float) -> Float {
    if kernel.is_anisotropic() {
        let (r_xy, z) = split_planar(r_ij);
        kernel.w_aniso(r_xy, z, h)
    } else {
        kernel.w(r, h)
    }
}

pub fn kernel_grad(kernel: &dyn KernelFunction, r_ij: MVec, r: Float, h: Float) -> MVec {
    if kernel.is_anisotropic() {
        kernel.dw_aniso(r_ij, h)
    } else {
        kernel.dw(r_ij, r, h)
    }
}

pub fn kernel_dh(kernel: &dyn KernelFunction, r_ij: MVec, r: Float, h: Float) -> Float {
    if kernel.is_anisotropic() {
        let (r_xy, z) = split_planar(r_ij);
        kernel.dhw_aniso(r_xy, z, h)
    } else {
        kernel.dhw(r, h)
    }
}

#[cfg(not(any(feature = "1d", feature = "2d")))]
fn split_planar(r_ij: MVec) -> (Float, Float) {
    ((r_ij.x * r_ij.x + r_ij.y * r_ij.y).sqrt(), r_ij.z)
}

#[cfg(any(feature = "1d", feature = "2d"))]
fn split_planar(r_ij: MVec) -> (Float, Float) {
    (r_ij.length(), 0.0)
}

/// Geometric factor A of the neighbor-count relation
/// N = (A / m) rho h^D: the volume of the unit sphere in D
/// dimensions.
pub fn support_volume_factor(dim: usize) -> Float {
    use std::f64::consts::PI;
    match dim {
        1 => 2.0,
        2 => PI,
        3 => 4.0 * PI / 3.0,
        _ => unreachable!(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::KernelFunction;
    use crate::dimension::Float;
    use crate::dimension::MVec;

    /// Radial quadrature of the kernel over its support; must give 1
    /// for a properly normalized kernel of the given dimension.
    pub fn radial_integral(kernel: &dyn KernelFunction, h: Float) -> Float {
        use std::f64::consts::PI;
        let shell = |r: Float| match kernel.effective_dimension() {
            1 => 2.0,
            2 => 2.0 * PI * r,
            3 => 4.0 * PI * r * r,
            _ => unreachable!(),
        };
        let n = 10_000;
        let dr = h / n as Float;
        (0..n)
            .map(|i| {
                let r = (i as Float + 0.5) * dr;
                shell(r) * kernel.w(r, h) * dr
            })
            .sum()
    }

    pub fn check_gradient_matches_finite_difference(kernel: &dyn KernelFunction) {
        let h = 1.3;
        let dr = 1e-6;
        for k in 1..20 {
            let r = h * k as Float / 20.0;
            let numerical = (kernel.w(r + dr, h) - kernel.w(r - dr, h)) / (2.0 * dr);
            let mut r_ij = MVec::ZERO;
            r_ij[0] = r;
            let analytic = kernel.dw(r_ij, r, h)[0];
            assert!(
                (numerical - analytic).abs() <= 1e-5 * (1.0 + analytic.abs()),
                "r = {}: {} vs {}",
                r,
                numerical,
                analytic
            );
        }
    }

    pub fn check_dhw_matches_finite_difference(kernel: &dyn KernelFunction) {
        let h = 0.9;
        let dh = 1e-6;
        for k in 1..20 {
            let r = h * k as Float / 21.0;
            let numerical = (kernel.w(r, h + dh) - kernel.w(r, h - dh)) / (2.0 * dh);
            let analytic = kernel.dhw(r, h);
            assert!(
                (numerical - analytic).abs() <= 1e-5 * (1.0 + analytic.abs()),
                "r = {}: {} vs {}",
                r,
                numerical,
                analytic
            );
        }
    }

    pub fn check_gradient_is_antisymmetric(kernel: &dyn KernelFunction) {
        let h = 1.0;
        let mut r_ij = MVec::ZERO;
        r_ij[0] = 0.4;
        let r = r_ij.length();
        let forward = kernel.dw(r_ij, r, h);
        let backward = kernel.dw(-r_ij, r, h);
        assert!((forward + backward).length() < 1e-14);
    }
}
