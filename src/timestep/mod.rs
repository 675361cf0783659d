use ordered_float::NotNan;
use rayon::prelude::*;

use crate::dimension::Float;
use crate::error::Result;
use crate::module::Module;
use crate::parameters::CflParameters;
use crate::parameters::Parameters;
use crate::particle::Particle;
use crate::simulation::Simulation;

/// Growth of the timestep between consecutive steps is limited to
/// this factor.
const MAX_GROWTH: Float = 1.4;

/// Chooses the global timestep as the minimum over the per-particle
/// CFL, force and energy criteria. The reduction runs over per-thread
/// minima; no atomics are involved.
pub struct TimestepController {
    cfl: CflParameters,
}

impl TimestepController {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        Box::new(Self {
            cfl: parameters.cfl.clone(),
        })
    }

    fn particle_timestep(&self, particle: &Particle) -> Float {
        let mut dt = Float::INFINITY;
        if particle.is_hydro() && particle.v_sig > 0.0 {
            dt = dt.min(self.cfl.sound * particle.sml / particle.v_sig);
        }
        let acc = particle.acc.length();
        if acc > 0.0 && particle.sml > 0.0 {
            dt = dt.min(self.cfl.force * (particle.sml / acc).sqrt());
        }
        if particle.is_hydro() && particle.dene < 0.0 && particle.ene > 0.0 {
            dt = dt.min(self.cfl.energy * particle.ene / particle.dene.abs());
        }
        dt
    }
}

impl Module for TimestepController {
    fn name(&self) -> &'static str {
        "timestep"
    }

    fn exec(&self, simulation: &mut Simulation) -> Result<()> {
        let smallest = simulation
            .particles
            .par_iter()
            .map(|particle| {
                NotNan::new(self.particle_timestep(particle))
                    .expect("timestep candidates are never NaN after the finiteness check")
            })
            .min()
            .map(NotNan::into_inner)
            .unwrap_or(Float::INFINITY);
        let mut dt = smallest;
        // The viscous signal-velocity bound collected by the
        // pre-interaction pass.
        if simulation.h_per_v_sig < Float::MAX {
            dt = dt.min(self.cfl.sound * simulation.h_per_v_sig);
        }
        if simulation.dt > 0.0 {
            dt = dt.min(simulation.dt * MAX_GROWTH);
        }
        simulation.dt = dt;
        Ok(())
    }
}
