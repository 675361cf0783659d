use rayon::prelude::*;

use super::viscosity::conductivity;
use super::viscosity::monaghan_viscosity;
use super::Pair;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::kernel::kernel_grad;
use crate::module::Module;
use crate::parameters::AvParameters;
use crate::parameters::Parameters;
use crate::quadtree::NeighborList;
use crate::simulation::Simulation;

pub(crate) struct ForceOut {
    pub acc: MVec,
    pub dene: Float,
}

/// Standard pressure-gradient SPH momentum and energy equations with
/// the grad-h correction and Monaghan viscosity.
pub struct SsphForce {
    av: AvParameters,
    neighbor_capacity: usize,
}

impl SsphForce {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        Box::new(Self {
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
        let pressure_term_i = target.gradh * target.pres / (target.dens * target.dens);
        for j in neighbors.iter() {
            if j == index {
                continue;
            }
            let neighbor = &particles[j];
            let pair = Pair::new(&simulation.box_, target, neighbor);
            if pair.is_skipped(target.sml, neighbor.sml) {
                continue;
            }
            let grad_i = kernel_grad(kernel, pair.r_ij, pair.r, target.sml);
            let grad_j = kernel_grad(kernel, pair.r_ij, pair.r, neighbor.sml);
            let grad_mean = (grad_i + grad_j) * 0.5;
            let pressure_term_j =
                neighbor.gradh * neighbor.pres / (neighbor.dens * neighbor.dens);
            let visc = monaghan_viscosity(&self.av, target, neighbor, &pair);
            acc -= (grad_i * pressure_term_i + grad_j * pressure_term_j + grad_mean * visc)
                * neighbor.mass;
            dene += neighbor.mass * pressure_term_i * pair.v_ij.dot(grad_i)
                + 0.5 * neighbor.mass * visc * pair.v_ij.dot(grad_mean);
            if self.av.use_conductivity {
                dene += conductivity(&self.av, target, neighbor, &pair, pair.e.dot(grad_mean));
            }
        }
        ForceOut { acc, dene }
    }
}

impl Module for SsphForce {
    fn name(&self) -> &'static str {
        "fluid_force_ssph"
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

/// Shared fan-out of a force pass: symmetric neighbor gathers over
/// all hydro particles, one output slot per particle.
pub(crate) fn compute_forces<F>(
    simulation: &Simulation,
    neighbor_capacity: usize,
    force: F,
) -> Result<Vec<Option<ForceOut>>>
where
    F: Fn(usize, &NeighborList) -> ForceOut + Send + Sync,
{
    (0..simulation.particles.len())
        .into_par_iter()
        .map_init(
            || NeighborList::new(neighbor_capacity),
            |neighbors, index| {
                let target = &simulation.particles[index];
                if !target.is_hydro() {
                    return Ok(None);
                }
                simulation
                    .tree
                    .fill_neighbors_symmetric(
                        &simulation.box_,
                        target.pos,
                        target.sml,
                        neighbors,
                    )
                    .map_err(|overflow| Error::NeighborOverflow {
                        particle: target.id,
                        found: neighbors.len(),
                        capacity: overflow.capacity,
                        step: simulation.step,
                    })?;
                Ok(Some(force(index, neighbors)))
            },
        )
        .collect()
}

/// Writes the accumulated derivatives back; wall particles have their
/// forces zeroed afterwards, pinning them in place.
pub(crate) fn apply_forces(simulation: &mut Simulation, outputs: Vec<Option<ForceOut>>) {
    for (particle, output) in simulation.particles.iter_mut().zip(outputs) {
        match output {
            Some(output) => {
                particle.acc = output.acc;
                particle.dene = output.dene;
            }
            None => {
                particle.acc = MVec::ZERO;
                particle.dene = 0.0;
            }
        }
        if particle.is_wall {
            particle.acc = MVec::ZERO;
            particle.dene = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SsphForce;
    use crate::dimension::MVec;
    use crate::hydrodynamics::PreInteraction;
    use crate::module::Module;
    use crate::test_utils::build_lattice_simulation;

    #[test]
    fn uniform_lattice_feels_no_net_force() {
        let mut simulation = build_lattice_simulation(8);
        PreInteraction::construct(&simulation.parameters)
            .exec(&mut simulation)
            .unwrap();
        SsphForce::construct(&simulation.parameters)
            .exec(&mut simulation)
            .unwrap();
        let scale = simulation.particles[0].pres;
        for particle in simulation.particles.iter() {
            assert!(
                particle.acc.length() < 1e-8 * scale.max(1.0),
                "residual acceleration {:?}",
                particle.acc
            );
            assert!(particle.dene.abs() < 1e-8);
        }
    }

    #[test]
    fn momentum_is_conserved_pairwise() {
        let mut simulation = build_lattice_simulation(6);
        // Perturb one particle to create a pressure imbalance.
        simulation.particles[0].ene *= 2.0;
        PreInteraction::construct(&simulation.parameters)
            .exec(&mut simulation)
            .unwrap();
        SsphForce::construct(&simulation.parameters)
            .exec(&mut simulation)
            .unwrap();
        let total: MVec = simulation
            .particles
            .iter()
            .map(|particle| particle.acc * particle.mass)
            .fold(MVec::ZERO, |acc, f| acc + f);
        assert!(total.length() < 1e-10, "net force {:?}", total);
    }
}
