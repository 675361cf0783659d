mod disph;
mod gsph;
mod pre_interaction;
mod riemann;
mod ssph;
mod viscosity;

pub use disph::DisphForce;
pub use gsph::GsphForce;
pub use pre_interaction::PreInteraction;
pub use riemann::solve_hll;
pub use riemann::RiemannState;
pub use ssph::SsphForce;

use crate::dimension::Float;
use crate::dimension::MVec;
use crate::particle::Particle;
use crate::simulation_box::SimulationBox;

/// Geometry and kinematics of an interacting pair, under the
/// periodic minimum image. `r_ij` points from j to i.
pub(crate) struct Pair {
    pub r_ij: MVec,
    pub r: Float,
    /// Unit vector along r_ij; zero for coincident particles.
    pub e: MVec,
    pub v_ij: MVec,
    /// Radial velocity v_ij . e; negative for approaching pairs.
    pub vr: Float,
}

impl Pair {
    pub fn new(box_: &SimulationBox, pi: &Particle, pj: &Particle) -> Self {
        let r_ij = box_.periodic_distance_vec(&pi.pos, &pj.pos);
        let r = r_ij.length();
        let e = if r > 0.0 { r_ij / r } else { MVec::ZERO };
        let v_ij = pi.vel - pj.vel;
        Self {
            r_ij,
            r,
            e,
            v_ij,
            vr: v_ij.dot(e),
        }
    }

    /// Pairs at zero separation or beyond both supports do not
    /// interact.
    pub fn is_skipped(&self, h_i: Float, h_j: Float) -> bool {
        self.r <= 0.0 || self.r >= h_i.max(h_j)
    }
}

/// Maximum pair signal velocity, also used by the viscous timestep
/// bound.
pub(crate) fn signal_velocity(sound_i: Float, sound_j: Float, vr: Float) -> Float {
    sound_i + sound_j - 3.0 * vr.min(0.0)
}
