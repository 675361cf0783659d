use std::f64::consts::PI;

use super::CubicSpline;
use super::KernelFunction;
use crate::dimension::Float;
use crate::dimension::MVec;

/// Product kernel for disk geometries: the 2D cubic spline in the
/// xy plane times a Gaussian of independent scale h_z along z. Only
/// the planar smoothing length adapts; h_z stays fixed. The effective
/// dimension is 2, and the isotropic entry points are rejected.
pub struct Anisotropic {
    planar: CubicSpline,
    h_z: Float,
}

impl Anisotropic {
    pub fn new(h_z: Float) -> Self {
        Self {
            planar: CubicSpline::new(2),
            h_z,
        }
    }

    fn gaussian(&self, z: Float) -> Float {
        let scale = 1.0 / ((2.0 * PI).sqrt() * self.h_z);
        scale * (-z * z / (2.0 * self.h_z * self.h_z)).exp()
    }
}

impl KernelFunction for Anisotropic {
    fn w(&self, _r: Float, _h: Float) -> Float {
        panic!("anisotropic kernel does not support the isotropic w entry point")
    }

    fn dw(&self, _r_ij: MVec, _r: Float, _h: Float) -> MVec {
        panic!("anisotropic kernel does not support the isotropic dw entry point")
    }

    fn dhw(&self, _r: Float, _h: Float) -> Float {
        panic!("anisotropic kernel does not support the isotropic dhw entry point")
    }

    fn effective_dimension(&self) -> usize {
        2
    }

    fn is_anisotropic(&self) -> bool {
        true
    }

    fn w_aniso(&self, r_xy: Float, z: Float, h: Float) -> Float {
        self.planar.w(r_xy, h) * self.gaussian(z)
    }

    fn dw_aniso(&self, r_ij: MVec, h: Float) -> MVec {
        let r_xy = (r_ij.x * r_ij.x + r_ij.y * r_ij.y).sqrt();
        let radial = if r_xy > 0.0 {
            self.planar.dw_radial(r_xy, h) / r_xy
        } else {
            0.0
        };
        let gauss = self.gaussian(r_ij.z);
        MVec::new(
            r_ij.x * radial * gauss,
            r_ij.y * radial * gauss,
            self.planar.w(r_xy, h) * gauss * (-r_ij.z / (self.h_z * self.h_z)),
        )
    }

    fn dhw_aniso(&self, r_xy: Float, z: Float, h: Float) -> Float {
        self.planar.dhw(r_xy, h) * self.gaussian(z)
    }

    fn name(&self) -> &'static str {
        "anisotropic"
    }
}

#[cfg(test)]
mod tests {
    use super::Anisotropic;
    use crate::dimension::MVec;
    use crate::kernel::KernelFunction;

    #[test]
    #[should_panic]
    fn isotropic_entry_point_is_rejected() {
        Anisotropic::new(0.1).w(0.5, 1.0);
    }

    #[test]
    fn effective_dimension_is_two() {
        assert_eq!(Anisotropic::new(0.1).effective_dimension(), 2);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let kernel = Anisotropic::new(0.3);
        let h = 1.1;
        let dr = 1e-6;
        let pos = MVec::new(0.3, 0.2, 0.1);
        let analytic = kernel.dw_aniso(pos, h);
        for axis in 0..3 {
            let mut fwd = pos;
            let mut bwd = pos;
            fwd[axis] += dr;
            bwd[axis] -= dr;
            let split = |p: MVec| ((p.x * p.x + p.y * p.y).sqrt(), p.z);
            let (r1, z1) = split(fwd);
            let (r0, z0) = split(bwd);
            let numerical = (kernel.w_aniso(r1, z1, h) - kernel.w_aniso(r0, z0, h)) / (2.0 * dr);
            assert!(
                (numerical - analytic[axis]).abs() < 1e-5 * (1.0 + analytic[axis].abs()),
                "axis {}: {} vs {}",
                axis,
                numerical,
                analytic[axis]
            );
        }
    }

    #[test]
    fn planar_value_drops_with_height() {
        let kernel = Anisotropic::new(0.2);
        let near = kernel.w_aniso(0.3, 0.0, 1.0);
        let far = kernel.w_aniso(0.3, 0.5, 1.0);
        assert!(near > far);
        assert!(far > 0.0);
    }
}
