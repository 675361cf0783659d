use rayon::prelude::*;

use super::riemann::solve_hll;
use super::riemann::RiemannState;
use super::ssph::apply_forces;
use super::ssph::ForceOut;
use super::viscosity::signal_velocity_viscosity;
use super::Pair;
use crate::dimension::mat_zero;
use crate::dimension::outer;
use crate::dimension::renormalize;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::kernel::kernel_grad;
use crate::module::Module;
use crate::named_arrays::DIV_VELOCITY;
use crate::named_arrays::GRAD_DENSITY;
use crate::named_arrays::GRAD_PRESSURE;
use crate::named_arrays::GRAD_VELOCITY;
use crate::parameters::AvParameters;
use crate::parameters::Parameters;
use crate::parameters::SphType;
use crate::quadtree::NeighborList;
use crate::simulation::Simulation;

/// Pairs where h |div v| stays below this fraction of the sound speed
/// on both sides are treated as shock-quiet and use the conventional
/// pair force instead of the Riemann solve.
const SHOCK_QUIET_THRESHOLD: Float = 0.05;

/// Godunov SPH: each pair interaction is closed by an HLL Riemann
/// solve along the pair axis, with optional van-Leer-limited linear
/// reconstruction of the interface states. The GDISPH flavor uses the
/// pressure-energy volume elements instead of the mass density.
pub struct GsphForce {
    gamma: Float,
    density_independent: bool,
    second_order: bool,
    force_correction: bool,
    av: AvParameters,
    neighbor_capacity: usize,
}

impl GsphForce {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        Box::new(Self {
            gamma: parameters.physics.gamma,
            density_independent: parameters.sph_type == SphType::Gdisph,
            second_order: parameters.gsph.is_2nd_order,
            force_correction: parameters.gsph.force_correction,
            av: parameters.av.clone(),
            neighbor_capacity: parameters.physics.neighbor_number * 16,
        })
    }

    /// The density entering the p* / rho^2 pair terms: the mass
    /// density for GSPH, the pressure-energy analogue p / ((gamma-1) u)
    /// for GDISPH.
    fn effective_density(&self, pres: Float, dens: Float, ene: Float) -> Float {
        if self.density_independent && ene > 0.0 {
            pres / ((self.gamma - 1.0) * ene)
        } else {
            dens
        }
    }

    fn grad_h(&self, gradh: Float) -> Float {
        if self.force_correction {
            gradh
        } else {
            1.0
        }
    }

    /// Kernel-weighted linear-exact gradients of density, pressure
    /// and velocity, stored in the named auxiliary arrays for the
    /// reconstruction step.
    fn gradient_pass(&self, simulation: &mut Simulation) -> Result<()> {
        struct Gradients {
            dens: MVec,
            pres: MVec,
            vel: [MVec; crate::config::NUM_DIMENSIONS],
        }
        let outputs: Result<Vec<Gradients>> = {
            let simulation = &*simulation;
            (0..simulation.particles.len())
                .into_par_iter()
                .map_init(
                    || NeighborList::new(self.neighbor_capacity),
                    |neighbors, index| {
                        let target = &simulation.particles[index];
                        let zero = Gradients {
                            dens: MVec::ZERO,
                            pres: MVec::ZERO,
                            vel: [MVec::ZERO; crate::config::NUM_DIMENSIONS],
                        };
                        if !target.is_hydro() {
                            return Ok(zero);
                        }
                        simulation
                            .tree
                            .fill_neighbors(
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
                        let mut raw = zero;
                        let mut renorm = mat_zero();
                        for j in neighbors.iter() {
                            if j == index {
                                continue;
                            }
                            let neighbor = &simulation.particles[j];
                            let pair = Pair::new(&simulation.box_, target, neighbor);
                            if pair.r <= 0.0 || pair.r >= target.sml {
                                continue;
                            }
                            let grad = kernel_grad(
                                simulation.kernel.as_ref(),
                                pair.r_ij,
                                pair.r,
                                target.sml,
                            );
                            let volume = neighbor.mass / neighbor.dens;
                            // Displacement from i to j under the
                            // minimum image.
                            let d_ji = -pair.r_ij;
                            renorm = renorm + outer(d_ji, grad) * volume;
                            raw.dens += grad * (volume * (neighbor.dens - target.dens));
                            raw.pres += grad * (volume * (neighbor.pres - target.pres));
                            for axis in 0..crate::config::NUM_DIMENSIONS {
                                raw.vel[axis] +=
                                    grad * (volume * (neighbor.vel[axis] - target.vel[axis]));
                            }
                        }
                        let corrected = |v: MVec| renormalize(&renorm, v).unwrap_or(v);
                        Ok(Gradients {
                            dens: corrected(raw.dens),
                            pres: corrected(raw.pres),
                            vel: raw.vel.map(corrected),
                        })
                    },
                )
                .collect()
        };
        let outputs = outputs?;
        let count = outputs.len();
        let mut dens = Vec::with_capacity(count);
        let mut pres = Vec::with_capacity(count);
        let mut vel: [Vec<MVec>; crate::config::NUM_DIMENSIONS] =
            std::array::from_fn(|_| Vec::with_capacity(count));
        for gradients in outputs {
            dens.push(gradients.dens);
            pres.push(gradients.pres);
            for axis in 0..crate::config::NUM_DIMENSIONS {
                vel[axis].push(gradients.vel[axis]);
            }
        }
        simulation.arrays.insert_vector(GRAD_DENSITY, dens);
        simulation.arrays.insert_vector(GRAD_PRESSURE, pres);
        for (axis, values) in vel.into_iter().enumerate() {
            simulation.arrays.insert_vector(GRAD_VELOCITY[axis], values);
        }
        Ok(())
    }

    fn reconstruct(
        &self,
        simulation: &Simulation,
        pair: &Pair,
        index_i: usize,
        index_j: usize,
    ) -> (RiemannState, RiemannState) {
        let particles = &simulation.particles;
        let target = &particles[index_i];
        let neighbor = &particles[index_j];
        // The axis points from j to i; j supplies the left state.
        let mut left_dens = neighbor.dens;
        let mut right_dens = target.dens;
        let mut left_pres = neighbor.pres;
        let mut right_pres = target.pres;
        let mut left_vel = neighbor.vel.dot(pair.e);
        let mut right_vel = target.vel.dot(pair.e);
        if self.second_order {
            let arrays = &simulation.arrays;
            let grad_dens = arrays.vector(GRAD_DENSITY).unwrap();
            let grad_pres = arrays.vector(GRAD_PRESSURE).unwrap();
            let project = |gradients: &[MVec], index: usize| gradients[index].dot(pair.r_ij);
            let vel_slope = |index: usize| {
                let mut slope = MVec::ZERO;
                for axis in 0..crate::config::NUM_DIMENSIONS {
                    slope[axis] = project(arrays.vector(GRAD_VELOCITY[axis]).unwrap(), index);
                }
                slope.dot(pair.e)
            };
            let dens_jump = right_dens - left_dens;
            let pres_jump = right_pres - left_pres;
            let vel_jump = right_vel - left_vel;
            left_dens += 0.5 * van_leer(project(grad_dens, index_j), dens_jump);
            right_dens -= 0.5 * van_leer(project(grad_dens, index_i), dens_jump);
            left_pres += 0.5 * van_leer(project(grad_pres, index_j), pres_jump);
            right_pres -= 0.5 * van_leer(project(grad_pres, index_i), pres_jump);
            left_vel += 0.5 * van_leer(vel_slope(index_j), vel_jump);
            right_vel -= 0.5 * van_leer(vel_slope(index_i), vel_jump);
            // A limited reconstruction can still undershoot into
            // unphysical states; fall back to first order there.
            if left_dens <= 0.0 || left_pres < 0.0 {
                left_dens = neighbor.dens;
                left_pres = neighbor.pres;
                left_vel = neighbor.vel.dot(pair.e);
            }
            if right_dens <= 0.0 || right_pres < 0.0 {
                right_dens = target.dens;
                right_pres = target.pres;
                right_vel = target.vel.dot(pair.e);
            }
        }
        let sound = |pres: Float, dens: Float| (self.gamma * pres.max(0.0) / dens).sqrt();
        (
            RiemannState {
                dens: left_dens,
                vel: left_vel,
                pres: left_pres,
                sound: sound(left_pres, left_dens),
            },
            RiemannState {
                dens: right_dens,
                vel: right_vel,
                pres: right_pres,
                sound: sound(right_pres, right_dens),
            },
        )
    }

    fn particle_force(
        &self,
        simulation: &Simulation,
        index: usize,
        neighbors: &NeighborList,
    ) -> Result<ForceOut> {
        let kernel = simulation.kernel.as_ref();
        let particles = &simulation.particles;
        let div_v = simulation.arrays.scalar(DIV_VELOCITY).unwrap();
        let target = &particles[index];
        let mut acc = MVec::ZERO;
        let mut dene = 0.0;
        let dens_eff_i = self.effective_density(target.pres, target.dens, target.ene);
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
            let dens_eff_j = self.effective_density(neighbor.pres, neighbor.dens, neighbor.ene);
            let quiet = (div_v[index].abs() * target.sml)
                .max(div_v[j].abs() * neighbor.sml)
                < SHOCK_QUIET_THRESHOLD * 0.5 * (target.sound + neighbor.sound);
            if quiet {
                // Smooth flow: conventional pair force with a
                // signal-velocity viscosity.
                let grad_mean = (grad_i + grad_j) * 0.5;
                let term_i = self.grad_h(target.gradh) * target.pres / (dens_eff_i * dens_eff_i);
                let term_j =
                    self.grad_h(neighbor.gradh) * neighbor.pres / (dens_eff_j * dens_eff_j);
                let visc = signal_velocity_viscosity(&self.av, target, neighbor, &pair);
                acc -= (grad_i * term_i + grad_j * term_j + grad_mean * visc) * neighbor.mass;
                dene += neighbor.mass * term_i * pair.v_ij.dot(grad_i)
                    + 0.5 * neighbor.mass * visc * pair.v_ij.dot(grad_mean);
                continue;
            }
            let (left, right) = self.reconstruct(simulation, &pair, index, j);
            let star = solve_hll(left, right).map_err(|pres| Error::NegativeStarPressure {
                pres,
                left: neighbor.id,
                right: target.id,
                step: simulation.step,
            })?;
            let term_i = self.grad_h(target.gradh) / (dens_eff_i * dens_eff_i);
            let term_j = self.grad_h(neighbor.gradh) / (dens_eff_j * dens_eff_j);
            let weighted = grad_i * term_i + grad_j * term_j;
            acc -= weighted * (neighbor.mass * star.pres);
            // The energy equation advances with the interface
            // velocity, which keeps total energy conserved pairwise.
            let vel_star = pair.e * star.vel;
            dene -= neighbor.mass * star.pres * (vel_star - target.vel).dot(weighted);
        }
        Ok(ForceOut { acc, dene })
    }
}

/// Van Leer limited half-jump: the harmonic mean of the one-sided
/// slope and the pair jump, zero when they disagree in sign.
fn van_leer(slope: Float, jump: Float) -> Float {
    let product = slope * jump;
    if product > 0.0 {
        2.0 * product / (slope + jump)
    } else {
        0.0
    }
}

impl Module for GsphForce {
    fn name(&self) -> &'static str {
        if self.density_independent {
            "fluid_force_gdisph"
        } else {
            "fluid_force_gsph"
        }
    }

    fn exec(&self, simulation: &mut Simulation) -> Result<()> {
        if self.second_order {
            self.gradient_pass(simulation)?;
        }
        let outputs: Result<Vec<Option<ForceOut>>> = {
            let simulation = &*simulation;
            (0..simulation.particles.len())
                .into_par_iter()
                .map_init(
                    || NeighborList::new(self.neighbor_capacity),
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
                        self.particle_force(simulation, index, neighbors).map(Some)
                    },
                )
                .collect()
        };
        apply_forces(simulation, outputs?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::van_leer;
    use super::GsphForce;
    use crate::dimension::MVec;
    use crate::hydrodynamics::PreInteraction;
    use crate::module::Module;
    use crate::parameters::SphType;
    use crate::test_utils::assert_float_is_close;
    use crate::test_utils::build_lattice_simulation;

    #[test]
    fn van_leer_vanishes_on_extrema() {
        assert_eq!(van_leer(1.0, -1.0), 0.0);
        assert_eq!(van_leer(-0.5, 0.5), 0.0);
        assert_eq!(van_leer(0.0, 1.0), 0.0);
    }

    #[test]
    fn van_leer_is_symmetric_and_limited() {
        assert_float_is_close(van_leer(1.0, 1.0), 1.0);
        assert_float_is_close(van_leer(2.0, 1.0), van_leer(1.0, 2.0));
        assert!(van_leer(10.0, 1.0) <= 2.0);
    }

    fn run_gsph(simulation: &mut crate::simulation::Simulation, variant: SphType) {
        simulation.parameters.sph_type = variant;
        simulation.parameters.gsph.is_2nd_order = true;
        PreInteraction::construct(&simulation.parameters)
            .exec(simulation)
            .unwrap();
        GsphForce::construct(&simulation.parameters)
            .exec(simulation)
            .unwrap();
    }

    #[test]
    fn uniform_lattice_feels_no_net_force() {
        let mut simulation = build_lattice_simulation(6);
        run_gsph(&mut simulation, SphType::Gsph);
        for particle in simulation.particles.iter() {
            assert!(
                particle.acc.length() < 1e-8,
                "residual acceleration {:?}",
                particle.acc
            );
        }
    }

    #[test]
    fn momentum_is_conserved_with_a_shock() {
        let mut simulation = build_lattice_simulation(6);
        // Two colliding streams trigger the Riemann branch.
        for particle in simulation.particles.iter_mut() {
            particle.vel[0] = if particle.pos[0] < 0.5 { 0.5 } else { -0.5 };
        }
        run_gsph(&mut simulation, SphType::Gsph);
        let total: MVec = simulation
            .particles
            .iter()
            .map(|particle| particle.acc * particle.mass)
            .fold(MVec::ZERO, |acc, f| acc + f);
        assert!(total.length() < 1e-9, "net force {:?}", total);
    }

    #[test]
    fn total_energy_rate_vanishes_pairwise() {
        let mut simulation = build_lattice_simulation(6);
        for particle in simulation.particles.iter_mut() {
            particle.vel[0] = if particle.pos[0] < 0.5 { 0.5 } else { -0.5 };
        }
        run_gsph(&mut simulation, SphType::Gsph);
        let total_dene: f64 = simulation
            .particles
            .iter()
            .map(|particle| {
                particle.mass * (particle.dene + particle.vel.dot(particle.acc))
            })
            .sum();
        // Total energy (internal + kinetic) change vanishes.
        assert!(total_dene.abs() < 1e-9, "energy drift {}", total_dene);
    }

    #[test]
    fn gdisph_matches_gsph_for_uniform_energies() {
        let mut gdisph_sim = build_lattice_simulation(5);
        for particle in gdisph_sim.particles.iter_mut() {
            particle.vel[0] = if particle.pos[0] < 0.5 { 0.3 } else { -0.3 };
        }
        let mut gsph_sim = build_lattice_simulation(5);
        for particle in gsph_sim.particles.iter_mut() {
            particle.vel[0] = if particle.pos[0] < 0.5 { 0.3 } else { -0.3 };
        }
        run_gsph(&mut gdisph_sim, SphType::Gdisph);
        run_gsph(&mut gsph_sim, SphType::Gsph);
        for (gdisph, gsph) in gdisph_sim.particles.iter().zip(gsph_sim.particles.iter()) {
            assert!(
                (gdisph.acc - gsph.acc).length() < 1e-6 * (1.0 + gsph.acc.length()),
                "{:?} vs {:?}",
                gdisph.acc,
                gsph.acc
            );
        }
    }
}
