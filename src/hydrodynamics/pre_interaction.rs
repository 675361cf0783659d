use log::warn;
use rayon::prelude::*;

use super::signal_velocity;
use super::Pair;
use crate::dimension::cross;
use crate::dimension::cross_norm;
use crate::dimension::Float;
use crate::dimension::MCross;
use crate::error::Error;
use crate::error::Result;
use crate::kernel::kernel_dh;
use crate::kernel::kernel_value;
use crate::kernel::support_volume_factor;
use crate::kernel::KernelFunction;
use crate::module::Module;
use crate::parameters::AvParameters;
use crate::parameters::Parameters;
use crate::parameters::SphType;
use crate::particle::Particle;
use crate::quadtree::NeighborList;
use crate::quadtree::QuadTree;
use crate::simulation::Simulation;
use crate::simulation_box::SimulationBox;

const SMOOTHING_TOLERANCE: Float = 1e-6;
const MAX_NEWTON_ITERATIONS: usize = 20;
const MAX_BISECTIONS: usize = 60;
/// Neighbor buffers hold this many times the target count.
const NEIGHBOR_CAPACITY_FACTOR: usize = 16;

/// Fixes the smoothing length of every hydro particle to match the
/// target neighbor count, then assembles the thermodynamic state the
/// force pass reads: density, pressure, sound speed, volume element,
/// grad-h factor, Balsara limiter, viscosity coefficient and signal
/// velocity.
pub struct PreInteraction {
    variant: SphType,
    gamma: Float,
    neighbor_number: usize,
    effective_dimension: usize,
    av: AvParameters,
}

struct PreOut {
    sml: Float,
    dens: Float,
    pres: Float,
    sound: Float,
    volume: Float,
    gradh: Float,
    neighbor: usize,
    balsara: Float,
    alpha: Float,
    v_sig: Float,
    div_v: Float,
    converged: bool,
}

impl PreInteraction {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        Box::new(Self {
            variant: parameters.sph_type,
            gamma: parameters.physics.gamma,
            neighbor_number: parameters.physics.neighbor_number,
            effective_dimension: parameters.effective_dimension(),
            av: parameters.av.clone(),
        })
    }

    fn neighbor_capacity(&self) -> usize {
        self.neighbor_number * NEIGHBOR_CAPACITY_FACTOR
    }

    /// Inverts the neighbor-count relation N = (A / m) rho h^D for h,
    /// used to bootstrap particles without a smoothing length and as
    /// the Newton target.
    fn smoothing_from_density(&self, mass: Float, dens: Float) -> Float {
        let volume_factor = support_volume_factor(self.effective_dimension);
        (self.neighbor_number as Float * mass / (volume_factor * dens))
            .powf(1.0 / self.effective_dimension as Float)
    }

    fn target_density(&self, mass: Float, h: Float) -> Float {
        let volume_factor = support_volume_factor(self.effective_dimension);
        self.neighbor_number as Float * mass
            / (volume_factor * h.powi(self.effective_dimension as i32))
    }

    /// SPH density and its analytic derivative with respect to h,
    /// restricted to the current support radius.
    fn density_sums(
        &self,
        kernel: &dyn KernelFunction,
        box_: &SimulationBox,
        particles: &[Particle],
        target: &Particle,
        neighbors: &NeighborList,
        h: Float,
    ) -> (Float, Float) {
        let mut dens = 0.0;
        let mut ddens_dh = 0.0;
        for j in neighbors.iter() {
            let neighbor = &particles[j];
            let r_ij = box_.periodic_distance_vec(&target.pos, &neighbor.pos);
            let r = r_ij.length();
            if r >= h {
                continue;
            }
            dens += neighbor.mass * kernel_value(kernel, r_ij, r, h);
            ddens_dh += neighbor.mass * kernel_dh(kernel, r_ij, r, h);
        }
        (dens, ddens_dh)
    }

    /// Newton-Raphson in h on rho(h) - rho_target(h), recollecting
    /// the neighbor list only when h grows beyond the radius it was
    /// collected with. Falls back to bisection in a widened window;
    /// a particle that still fails keeps its previous h.
    fn solve_smoothing_length(
        &self,
        kernel: &dyn KernelFunction,
        box_: &SimulationBox,
        tree: &QuadTree,
        particles: &[Particle],
        target: &Particle,
        neighbors: &mut NeighborList,
        initial: Float,
    ) -> Result<(Float, bool), crate::quadtree::Overflow> {
        let mut h = initial;
        let mut search_radius = initial;
        tree.fill_neighbors(box_, target.pos, search_radius, neighbors)?;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (dens, ddens_dh) = self.density_sums(kernel, box_, particles, target, neighbors, h);
            let target_dens = self.target_density(target.mass, h);
            let residual = dens - target_dens;
            let slope = ddens_dh + self.effective_dimension as Float * target_dens / h;
            if slope == 0.0 {
                break;
            }
            let new_h = h - residual / slope;
            if !new_h.is_finite() || new_h <= 0.25 * initial || new_h >= 4.0 * initial {
                break;
            }
            let converged = (new_h - h).abs() / h < SMOOTHING_TOLERANCE;
            h = new_h;
            if h > search_radius {
                search_radius = h * 1.1;
                tree.fill_neighbors(box_, target.pos, search_radius, neighbors)?;
            }
            if converged {
                return Ok((h, true));
            }
        }
        self.bisect_smoothing_length(kernel, box_, tree, particles, target, neighbors, initial)
    }

    fn bisect_smoothing_length(
        &self,
        kernel: &dyn KernelFunction,
        box_: &SimulationBox,
        tree: &QuadTree,
        particles: &[Particle],
        target: &Particle,
        neighbors: &mut NeighborList,
        initial: Float,
    ) -> Result<(Float, bool), crate::quadtree::Overflow> {
        let residual = |list: &NeighborList, h: Float| {
            let (dens, _) = self.density_sums(kernel, box_, particles, target, list, h);
            dens - self.target_density(target.mass, h)
        };
        let mut lo = initial / 8.0;
        let mut hi = initial;
        tree.fill_neighbors(box_, target.pos, hi, neighbors)?;
        // rho - rho_target is increasing in h; widen the window until
        // it brackets the root.
        let mut widenings = 0;
        while residual(neighbors, hi) < 0.0 {
            hi *= 2.0;
            widenings += 1;
            if widenings > 8 {
                return Ok((initial, false));
            }
            tree.fill_neighbors(box_, target.pos, hi, neighbors)?;
        }
        while residual(neighbors, lo) > 0.0 {
            lo *= 0.5;
            widenings += 1;
            if widenings > 16 {
                return Ok((initial, false));
            }
        }
        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if (hi - lo) / mid < SMOOTHING_TOLERANCE {
                return Ok((mid, true));
            }
            if residual(neighbors, mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok((0.5 * (lo + hi), true))
    }

    fn assemble_state(
        &self,
        simulation: &Simulation,
        target: &Particle,
        neighbors: &NeighborList,
        h: Float,
        converged: bool,
    ) -> Result<PreOut> {
        let kernel = simulation.kernel.as_ref();
        let box_ = &simulation.box_;
        let particles = &simulation.particles;
        let dim = self.effective_dimension as Float;

        let mut dens = 0.0;
        let mut sum_dhw = 0.0;
        let mut energy_weighted = 0.0;
        let mut energy_weighted_dhw = 0.0;
        let mut neighbor_count = 0;
        let mut div_v = 0.0;
        let mut curl_v: MCross = Default::default();
        let mut v_sig: Float = target.sound;
        for j in neighbors.iter() {
            let neighbor = &particles[j];
            let pair = Pair::new(box_, target, neighbor);
            if pair.r >= h {
                continue;
            }
            let w = kernel_value(kernel, pair.r_ij, pair.r, h);
            let dhw = kernel_dh(kernel, pair.r_ij, pair.r, h);
            dens += neighbor.mass * w;
            sum_dhw += neighbor.mass * dhw;
            energy_weighted += neighbor.mass * neighbor.ene * w;
            energy_weighted_dhw += neighbor.mass * neighbor.ene * dhw;
            if pair.r > 0.0 {
                neighbor_count += 1;
                let grad = crate::kernel::kernel_grad(kernel, pair.r_ij, pair.r, h);
                div_v -= neighbor.mass * pair.v_ij.dot(grad);
                curl_v = curl_v + cross(pair.v_ij, grad) * neighbor.mass;
                v_sig = v_sig.max(signal_velocity(target.sound, neighbor.sound, pair.vr));
            }
        }

        let pres = if self.variant.is_density_independent() {
            (self.gamma - 1.0) * energy_weighted
        } else {
            (self.gamma - 1.0) * dens * target.ene
        };
        if pres < 0.0 {
            return Err(Error::NegativePressure {
                pres,
                particle: target.id,
                step: simulation.step,
            });
        }
        let sound = (self.gamma * pres / dens).sqrt();
        // Pair signal velocities use the sound speeds of the previous
        // pass; the fresh own sound speed is the floor, which also
        // covers the very first pass of a run.
        let v_sig = v_sig.max(sound);
        div_v /= dens;
        let curl_norm = cross_norm(curl_v) / dens;

        let gradh = if self.variant.is_density_independent() {
            grad_h_factor(h, dim, energy_weighted, energy_weighted_dhw)
        } else {
            grad_h_factor(h, dim, dens, sum_dhw)
        };

        let balsara = if crate::config::NUM_DIMENSIONS >= 2 && self.av.use_balsara_switch {
            let decay = 1e-4 * sound / h;
            div_v.abs() / (div_v.abs() + curl_norm + decay)
        } else {
            1.0
        };

        let alpha = if self.av.use_time_dependent_av {
            let timescale = h / (self.av.epsilon * sound.max(1e-30));
            let source = (-div_v).max(0.0) * (self.av.alpha_max - target.alpha);
            let dalpha = -(target.alpha - self.av.alpha_min) / timescale + source;
            (target.alpha + dalpha * simulation.dt).clamp(self.av.alpha_min, self.av.alpha_max)
        } else {
            self.av.alpha
        };

        Ok(PreOut {
            sml: h,
            dens,
            pres,
            sound,
            volume: target.mass / dens,
            gradh,
            neighbor: neighbor_count,
            balsara,
            alpha,
            v_sig,
            div_v,
            converged,
        })
    }

    fn process_particle(
        &self,
        simulation: &Simulation,
        index: usize,
        neighbors: &mut NeighborList,
    ) -> Result<PreOut> {
        let target = &simulation.particles[index];
        let initial = if target.sml > 0.0 {
            target.sml
        } else {
            let dens = if target.dens > 0.0 {
                target.dens
            } else {
                ambient_density(simulation)
            };
            self.smoothing_from_density(target.mass, dens)
        };
        let overflow = |overflow: crate::quadtree::Overflow, found: usize| Error::NeighborOverflow {
            particle: target.id,
            found,
            capacity: overflow.capacity,
            step: simulation.step,
        };
        let (h, converged) = self
            .solve_smoothing_length(
                simulation.kernel.as_ref(),
                &simulation.box_,
                &simulation.tree,
                &simulation.particles,
                target,
                neighbors,
                initial,
            )
            .map_err(|e| {
                let found = neighbors.len();
                overflow(e, found)
            })?;
        if !converged {
            warn!(
                "smoothing length for particle {} did not converge, keeping h = {:.6e}",
                target.id, h
            );
        }
        simulation
            .tree
            .fill_neighbors(&simulation.box_, target.pos, h, neighbors)
            .map_err(|e| {
                let found = neighbors.len();
                overflow(e, found)
            })?;
        self.assemble_state(simulation, target, neighbors, h, converged)
    }
}

/// The grad-h correction stored as the reciprocal, so the force terms
/// multiply by it directly. The same ratio serves the standard
/// (mass-weighted) and the density-independent (energy-weighted)
/// estimate.
fn grad_h_factor(h: Float, dim: Float, weight_sum: Float, weight_dhw_sum: Float) -> Float {
    let omega = 1.0 + h / (dim * weight_sum) * weight_dhw_sum;
    if omega.is_finite() && omega.abs() > 1e-4 {
        1.0 / omega
    } else {
        1.0
    }
}

/// Mean density over the domain, the bootstrap estimate for particles
/// that carry neither a smoothing length nor a density.
fn ambient_density(simulation: &Simulation) -> Float {
    let side_lengths = simulation.box_.side_lengths();
    let mut volume = 1.0;
    for axis in 0..crate::config::NUM_DIMENSIONS {
        volume *= side_lengths[axis];
    }
    simulation.total_mass() / volume
}

impl Module for PreInteraction {
    fn name(&self) -> &'static str {
        "pre_interaction"
    }

    fn exec(&self, simulation: &mut Simulation) -> Result<()> {
        let outputs: Result<Vec<Option<PreOut>>> = {
            let simulation = &*simulation;
            (0..simulation.particles.len())
                .into_par_iter()
                .map_init(
                    || NeighborList::new(self.neighbor_capacity()),
                    |neighbors, index| {
                        if !simulation.particles[index].is_hydro() {
                            return Ok(None);
                        }
                        self.process_particle(simulation, index, neighbors)
                            .map(Some)
                    },
                )
                .collect()
        };
        let outputs = outputs?;
        let mut h_per_v_sig: Float = Float::MAX;
        let mut div_velocity = vec![0.0; simulation.particles.len()];
        for ((index, particle), output) in simulation
            .particles
            .iter_mut()
            .enumerate()
            .zip(outputs)
        {
            let output = match output {
                Some(output) => output,
                None => continue,
            };
            div_velocity[index] = output.div_v;
            if !output.converged {
                simulation.smoothing_length_failures += 1;
            }
            particle.sml = output.sml;
            particle.dens = output.dens;
            particle.pres = output.pres;
            particle.sound = output.sound;
            particle.volume = output.volume;
            particle.gradh = output.gradh;
            particle.neighbor = output.neighbor;
            particle.balsara = output.balsara;
            particle.alpha = output.alpha;
            particle.v_sig = output.v_sig;
            if output.v_sig > 0.0 {
                h_per_v_sig = h_per_v_sig.min(output.sml / output.v_sig);
            }
        }
        simulation.h_per_v_sig = h_per_v_sig;
        simulation
            .arrays
            .insert_scalar(crate::named_arrays::DIV_VELOCITY, div_velocity);
        Ok(())
    }
}
