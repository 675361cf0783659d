use crate::dimension::Float;
use crate::simulation::Simulation;

/// Specific internal energy floor applied after the corrector kick.
pub const ENERGY_FLOOR: Float = 1e-10;

/// Half-kick of the kick-drift-kick leap-frog: velocities and
/// internal energies advance by dt/2 with the current derivatives.
pub fn half_kick(simulation: &mut Simulation) {
    let half_dt = 0.5 * simulation.dt;
    for particle in simulation.particles.iter_mut() {
        if particle.is_wall {
            continue;
        }
        particle.vel += particle.acc * half_dt;
        if particle.is_hydro() {
            particle.ene += particle.dene * half_dt;
        }
    }
}

/// Drift: positions advance by a full dt and are wrapped back into
/// the periodic box.
pub fn drift(simulation: &mut Simulation) {
    let dt = simulation.dt;
    for particle in simulation.particles.iter_mut() {
        if particle.is_wall {
            continue;
        }
        particle.pos += particle.vel * dt;
    }
    simulation.wrap_positions();
}

/// Clamps internal energies to the floor and recomputes pressure and
/// sound speed consistently with the clamped value. The
/// density-independent variants refresh their kernel-summed pressure
/// in the next pre-interaction pass instead.
pub fn enforce_floors(simulation: &mut Simulation) {
    let gamma = simulation.gamma();
    let density_independent = simulation.parameters.sph_type.is_density_independent();
    for particle in simulation.particles.iter_mut() {
        if !particle.is_hydro() {
            continue;
        }
        particle.ene = particle.ene.max(ENERGY_FLOOR);
        if !density_independent && particle.dens > 0.0 {
            particle.pres = (gamma - 1.0) * particle.dens * particle.ene;
            particle.sound = (gamma * particle.pres / particle.dens).sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::drift;
    use super::enforce_floors;
    use super::half_kick;
    use super::ENERGY_FLOOR;
    use crate::test_utils::build_lattice_simulation;

    #[test]
    fn half_kick_advances_velocity_and_energy() {
        let mut simulation = build_lattice_simulation(3);
        simulation.dt = 0.1;
        for particle in simulation.particles.iter_mut() {
            particle.acc[0] = 2.0;
            particle.dene = -4.0;
        }
        half_kick(&mut simulation);
        for particle in simulation.particles.iter() {
            assert_eq!(particle.vel[0], 0.1);
            assert_eq!(particle.ene, 1.0 - 0.2);
        }
    }

    #[test]
    fn drift_wraps_into_the_periodic_box() {
        let mut simulation = build_lattice_simulation(3);
        simulation.dt = 1.0;
        for particle in simulation.particles.iter_mut() {
            particle.vel[0] = 0.9;
        }
        drift(&mut simulation);
        for particle in simulation.particles.iter() {
            assert!(particle.pos[0] >= 0.0 && particle.pos[0] < 1.0);
        }
    }

    #[test]
    fn floors_clamp_negative_energies() {
        let mut simulation = build_lattice_simulation(3);
        simulation.particles[0].ene = -1.0;
        simulation.particles[0].dens = 1.0;
        enforce_floors(&mut simulation);
        assert_eq!(simulation.particles[0].ene, ENERGY_FLOOR);
        assert!(simulation.particles[0].pres > 0.0);
    }

    #[test]
    fn wall_particles_are_pinned() {
        let mut simulation = build_lattice_simulation(3);
        simulation.dt = 1.0;
        simulation.particles[0].is_wall = true;
        simulation.particles[0].vel[0] = 1.0;
        simulation.particles[0].acc[0] = 1.0;
        let pos_before = simulation.particles[0].pos;
        half_kick(&mut simulation);
        drift(&mut simulation);
        assert_eq!(simulation.particles[0].pos, pos_before);
        assert_eq!(simulation.particles[0].vel[0], 1.0);
    }
}
