use super::ssph::apply_forces;
use super::ssph::compute_forces;
use super::ssph::ForceOut;
use super::viscosity::monaghan_viscosity;
use super::Pair;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Result;
use crate::kernel::kernel_grad;
use crate::module::Module;
use crate::parameters::AvParameters;
use crate::parameters::Parameters;
use crate::quadtree::NeighborList;
use crate::simulation::Simulation;

/// Density-independent (pressure-energy) formulation. The pair terms
/// are built from energy-weighted volume elements, so contact
/// discontinuities (density jumps at constant pressure) exert no
/// spurious force.
pub struct DisphForce {
    gamma: Float,
    av: AvParameters,
    neighbor_capacity: usize,
}

impl DisphForce {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        Box::new(Self {
            gamma: parameters.physics.gamma,
            av: parameters.av.clone(),
            neighbor_capacity: parameters.physics.neighbor_number * 16,
        })
    }

    fn particle_force(
        &self,
        simulation: &Simulation,
        index: usize,
        neighbors: &NeighborList,
    ) -> ForceOut {
        let kernel = simulation.kernel.as_ref();
        let particles = &simulation.particles;
        let target = &particles[index];
        let mut acc = MVec::ZERO;
        let mut dene = 0.0;
        // Internal energy density q = p / (gamma - 1).
        let q_i = target.pres / (self.gamma - 1.0);
        if q_i <= 0.0 {
            return ForceOut { acc, dene };
        }
        for j in neighbors.iter() {
            if j == index {
                continue;
            }
            let neighbor = &particles[j];
            let pair = Pair::new(&simulation.box_, target, neighbor);
            if pair.is_skipped(target.sml, neighbor.sml) {
                continue;
            }
            let q_j = neighbor.pres / (self.gamma - 1.0);
            if q_j <= 0.0 {
                continue;
            }
            let grad_i = kernel_grad(kernel, pair.r_ij, pair.r, target.sml);
            let grad_j = kernel_grad(kernel, pair.r_ij, pair.r, neighbor.sml);
            let grad_mean = (grad_i + grad_j) * 0.5;
            let energy_weight_j = neighbor.mass * neighbor.ene;
            let visc = monaghan_viscosity(&self.av, target, neighbor, &pair);
            acc -= (grad_i * (target.gradh / q_i) + grad_j * (neighbor.gradh / q_j))
                * ((self.gamma - 1.0) * target.ene * energy_weight_j)
                + grad_mean * (visc * neighbor.mass);
            dene += (self.gamma - 1.0) * target.ene * energy_weight_j * target.gradh
                / q_i
                * pair.v_ij.dot(grad_i)
                + 0.5 * neighbor.mass * visc * pair.v_ij.dot(grad_mean);
        }
        ForceOut { acc, dene }
    }
}

impl Module for DisphForce {
    fn name(&self) -> &'static str {
        "fluid_force_disph"
    }

    fn exec(&self, simulation: &mut Simulation) -> Result<()> {
        let outputs = {
            let simulation = &*simulation;
            compute_forces(simulation, self.neighbor_capacity, |index, neighbors| {
                self.particle_force(simulation, index, neighbors)
            })?
        };
        apply_forces(simulation, outputs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DisphForce;
    use crate::dimension::MVec;
    use crate::hydrodynamics::PreInteraction;
    use crate::module::Module;
    use crate::parameters::SphType;
    use crate::test_utils::build_lattice_simulation;

    fn run_disph(simulation: &mut crate::simulation::Simulation) {
        simulation.parameters.sph_type = SphType::Disph;
        PreInteraction::construct(&simulation.parameters)
            .exec(simulation)
            .unwrap();
        DisphForce::construct(&simulation.parameters)
            .exec(simulation)
            .unwrap();
    }

    #[test]
    fn contact_discontinuity_exerts_no_spurious_force() {
        // Enough particles along x that the smoothing length
        // transition at the jump spans only a few spacings.
        let n = if crate::config::NUM_DIMENSIONS == 1 { 64 } else { 8 };
        let mut simulation = build_lattice_simulation(n);
        // A density jump at constant pressure: double the mass, halve
        // the specific energy in one half of the box.
        for particle in simulation.particles.iter_mut() {
            if particle.pos[0] < 0.5 {
                particle.mass *= 2.0;
                particle.ene *= 0.5;
            }
        }
        run_disph(&mut simulation);
        let pres = simulation.particles[0].pres;
        for particle in simulation.particles.iter() {
            // Pressure stays uniform across the contact and the
            // accelerations remain at the round-off level.
            assert!(
                (particle.pres - pres).abs() < 0.05 * pres,
                "pressure {} deviates from {}",
                particle.pres,
                pres
            );
            // Residual forces from the smoothing length transition
            // stay far below the p / (rho h) force scale.
            let force_scale = particle.pres / (particle.dens * particle.sml);
            assert!(
                particle.acc.length() < 0.05 * force_scale,
                "spurious contact force {:?}",
                particle.acc
            );
        }
    }

    #[test]
    fn momentum_is_conserved_pairwise() {
        let mut simulation = build_lattice_simulation(6);
        simulation.particles[10].ene *= 3.0;
        run_disph(&mut simulation);
        let total: MVec = simulation
            .particles
            .iter()
            .map(|particle| particle.acc * particle.mass)
            .fold(MVec::ZERO, |acc, f| acc + f);
        assert!(total.length() < 1e-10, "net force {:?}", total);
    }

    #[test]
    fn reduces_to_ssph_when_energies_are_equal() {
        let mut disph_sim = build_lattice_simulation(6);
        run_disph(&mut disph_sim);
        let mut ssph_sim = build_lattice_simulation(6);
        ssph_sim.parameters.sph_type = SphType::Ssph;
        PreInteraction::construct(&ssph_sim.parameters)
            .exec(&mut ssph_sim)
            .unwrap();
        crate::hydrodynamics::SsphForce::construct(&ssph_sim.parameters)
            .exec(&mut ssph_sim)
            .unwrap();
        for (disph, ssph) in disph_sim.particles.iter().zip(ssph_sim.particles.iter()) {
            assert!(
                (disph.acc - ssph.acc).length() < 1e-8,
                "{:?} vs {:?}",
                disph.acc,
                ssph.acc
            );
        }
    }
}
