use super::signal_velocity;
use super::Pair;
use crate::dimension::Float;
use crate::parameters::AvParameters;
use crate::particle::Particle;

/// Monaghan artificial viscosity for an approaching pair, optionally
/// limited by the Balsara shear switch. Returns the Pi_ij factor that
/// multiplies the symmetrized kernel gradient.
pub(crate) fn monaghan_viscosity(
    av: &AvParameters,
    pi: &Particle,
    pj: &Particle,
    pair: &Pair,
) -> Float {
    let v_dot_r = pair.v_ij.dot(pair.r_ij);
    if v_dot_r >= 0.0 {
        return 0.0;
    }
    let h_mean = 0.5 * (pi.sml + pj.sml);
    let mu = h_mean * v_dot_r / (pair.r_ij.length_squared() + 0.01 * h_mean * h_mean);
    let sound_mean = 0.5 * (pi.sound + pj.sound);
    let dens_mean = 0.5 * (pi.dens + pj.dens);
    let mut alpha = 0.5 * (pi.alpha + pj.alpha);
    if av.use_balsara_switch {
        alpha *= 0.5 * (pi.balsara + pj.balsara);
    }
    let beta = 2.0 * alpha;
    (-alpha * sound_mean * mu + beta * mu * mu) / dens_mean
}

/// Signal-velocity viscosity used by the Godunov force in shock-quiet
/// regions.
pub(crate) fn signal_velocity_viscosity(
    av: &AvParameters,
    pi: &Particle,
    pj: &Particle,
    pair: &Pair,
) -> Float {
    if pair.vr >= 0.0 {
        return 0.0;
    }
    let dens_mean = 0.5 * (pi.dens + pj.dens);
    let mut alpha = 0.5 * (pi.alpha + pj.alpha);
    if av.use_balsara_switch {
        alpha *= 0.5 * (pi.balsara + pj.balsara);
    }
    -0.5 * alpha * signal_velocity(pi.sound, pj.sound, pair.vr) * pair.vr / dens_mean
}

/// Artificial conductivity contribution to du_i/dt for one neighbor,
/// reducing spurious temperature jumps at contact discontinuities.
pub(crate) fn conductivity(
    av: &AvParameters,
    pi: &Particle,
    pj: &Particle,
    pair: &Pair,
    e_dot_grad_mean: Float,
) -> Float {
    let dens_mean = 0.5 * (pi.dens + pj.dens);
    let v_sig = signal_velocity(pi.sound, pj.sound, pair.vr);
    pj.mass * av.conductivity_alpha * v_sig * (pi.ene - pj.ene) / dens_mean * e_dot_grad_mean
}

#[cfg(test)]
mod tests {
    use super::monaghan_viscosity;
    use super::Pair;
    use crate::dimension::MVec;
    use crate::parameters::AvParameters;
    use crate::particle::Particle;
    use crate::simulation_box::SimulationBox;

    fn particle_at(x: f64, vx: f64) -> Particle {
        let mut pos = MVec::ZERO;
        pos[0] = x;
        let mut vel = MVec::ZERO;
        vel[0] = vx;
        let mut particle = Particle::gas(0, pos, vel, 1.0, 1.0);
        particle.dens = 1.0;
        particle.sound = 1.0;
        particle.sml = 1.0;
        particle.alpha = 1.0;
        particle.balsara = 1.0;
        particle
    }

    #[test]
    fn vanishes_for_receding_pairs() {
        let box_ = SimulationBox::cube_from_side_length(100.0);
        let pi = particle_at(1.0, 1.0);
        let pj = particle_at(0.5, -1.0);
        let pair = Pair::new(&box_, &pi, &pj);
        assert_eq!(monaghan_viscosity(&AvParameters::default(), &pi, &pj, &pair), 0.0);
    }

    #[test]
    fn positive_for_approaching_pairs() {
        let box_ = SimulationBox::cube_from_side_length(100.0);
        let pi = particle_at(1.0, -1.0);
        let pj = particle_at(0.5, 1.0);
        let pair = Pair::new(&box_, &pi, &pj);
        assert!(monaghan_viscosity(&AvParameters::default(), &pi, &pj, &pair) > 0.0);
    }

    #[test]
    fn balsara_switch_reduces_the_viscosity() {
        let box_ = SimulationBox::cube_from_side_length(100.0);
        let pi = particle_at(1.0, -1.0);
        let mut pj = particle_at(0.5, 1.0);
        let pair = Pair::new(&box_, &pi, &pj);
        let full = monaghan_viscosity(&AvParameters::default(), &pi, &pj, &pair);
        pj.balsara = 0.0;
        let limited = monaghan_viscosity(&AvParameters::default(), &pi, &pj, &pair);
        assert!(limited < full);
    }
}
