use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::error;
use log::info;
use log::warn;

use crate::dimension::Float;
use crate::error::Result;
use crate::integrator;
use crate::io::checkpoint::CheckpointWriter;
use crate::io::output::OutputWriter;
use crate::module::build_pipeline;
use crate::module::Module;
use crate::simulation::Simulation;

/// Owns the simulation state and the module pipeline and advances
/// the global kick-drift-kick loop until the end time, writing
/// snapshots and checkpoints at step boundaries.
pub struct Solver {
    pub simulation: Simulation,
    passes: Vec<Box<dyn Module>>,
    timestep: Box<dyn Module>,
    output: OutputWriter,
    checkpoints: CheckpointWriter,
    next_output_time: Float,
    interrupted: Arc<AtomicBool>,
    /// A resumed run keeps the restored derivatives and timestep;
    /// re-priming them would break bit-identical continuation.
    resumed: bool,
}

impl Solver {
    pub fn new(simulation: Simulation, interrupted: Arc<AtomicBool>) -> Result<Self> {
        let mut passes = build_pipeline(&simulation.parameters)?;
        let timestep = passes.pop().expect("the pipeline always ends in a timestep");
        let output = OutputWriter::new(
            simulation.parameters.output_directory.clone(),
            simulation.parameters.binary_output,
        );
        let checkpoints = CheckpointWriter::new(&simulation.parameters, simulation.t);
        let resumed = simulation.step > 0 || simulation.t > 0.0;
        let next_output_time = if resumed {
            // The next point of the cadence grid strictly after the
            // restored time, matching where the interrupted run was.
            let cadence = simulation.parameters.time.output;
            let mut next = (simulation.t / cadence).floor() * cadence;
            while next <= simulation.t {
                next += cadence;
            }
            next
        } else {
            simulation.t
        };
        Ok(Self {
            simulation,
            passes,
            timestep,
            output,
            checkpoints,
            next_output_time,
            interrupted,
            resumed,
        })
    }

    pub fn output_mut(&mut self) -> &mut OutputWriter {
        &mut self.output
    }

    /// One pass sequence: pre-interaction, fluid force and the
    /// optional force sources, then the finiteness check that guards
    /// the corrector kick.
    fn run_passes(&mut self) -> Result<()> {
        for pass in self.passes.iter() {
            pass.exec(&mut self.simulation)?;
        }
        self.simulation.check_finite()
    }

    /// Computes the initial derivatives and timestep; the leap-frog
    /// needs them before the first predictor kick.
    fn prime(&mut self) -> Result<()> {
        self.run_passes()?;
        self.timestep.exec(&mut self.simulation)?;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        integrator::half_kick(&mut self.simulation);
        integrator::drift(&mut self.simulation);
        self.simulation.rebuild_tree();
        self.run_passes()?;
        integrator::half_kick(&mut self.simulation);
        integrator::enforce_floors(&mut self.simulation);
        self.simulation.t += self.simulation.dt;
        self.simulation.step += 1;
        self.timestep.exec(&mut self.simulation)?;
        Ok(())
    }

    /// Clip the upcoming step so snapshot times and the end time are
    /// hit exactly.
    fn clip_timestep(&mut self) {
        let end = self.simulation.parameters.time.end;
        let mut dt = self.simulation.dt;
        dt = dt.min(end - self.simulation.t);
        if self.next_output_time > self.simulation.t {
            dt = dt.min(self.next_output_time - self.simulation.t);
        }
        self.simulation.dt = dt.max(0.0);
    }

    fn write_due_output(&mut self) -> Result<()> {
        if self.simulation.t >= self.next_output_time {
            self.output.write_snapshot(&self.simulation)?;
            let cadence = self.simulation.parameters.time.output;
            while self.next_output_time <= self.simulation.t {
                self.next_output_time += cadence;
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        let end = self.simulation.parameters.time.end;
        if !self.resumed {
            self.prime()?;
            self.write_due_output()?;
        }
        // The relative margin absorbs round-off when a clipped step
        // lands an ulp short of the end time.
        while self.simulation.t < end * (1.0 - 1e-12) {
            self.clip_timestep();
            if self.simulation.dt <= 0.0 {
                warn!(
                    "timestep vanished at t = {:.6e}, stopping",
                    self.simulation.t
                );
                break;
            }
            if let Err(failure) = self.step() {
                error!(
                    "step {} failed: {}; attempting an emergency checkpoint",
                    self.simulation.step, failure
                );
                if self.checkpoints.is_enabled() {
                    self.checkpoints
                        .write_now(&self.simulation, self.output.snapshot_index());
                }
                return Err(failure);
            }
            self.write_due_output()?;
            self.checkpoints
                .maybe_write(&self.simulation, self.output.snapshot_index());
            if self.interrupted.load(Ordering::SeqCst) {
                info!(
                    "interrupt received, stopping after step {} at t = {:.6e}",
                    self.simulation.step, self.simulation.t
                );
                if self.checkpoints.is_enabled()
                    && self.simulation.parameters.checkpoint_on_interrupt
                {
                    self.checkpoints
                        .write_now(&self.simulation, self.output.snapshot_index());
                }
                break;
            }
        }
        self.log_summary();
        Ok(())
    }

    fn log_summary(&self) {
        info!(
            "finished at t = {:.6e} after {} steps",
            self.simulation.t, self.simulation.step
        );
        if self.simulation.smoothing_length_failures > 0 {
            warn!(
                "{} smoothing length iterations did not converge over the run",
                self.simulation.smoothing_length_failures
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::Solver;
    use crate::dimension::MVec;
    use crate::simulation::Simulation;
    use crate::test_utils::test_parameters;
    use crate::test_utils::unit_lattice_particles;

    fn short_run_solver(steps_worth_of_time: f64) -> Solver {
        let directory = tempfile::tempdir().unwrap();
        let mut parameters = test_parameters();
        parameters.time.end = steps_worth_of_time;
        parameters.time.output = steps_worth_of_time;
        parameters.output_directory = directory.into_path();
        let simulation = Simulation::new(parameters, unit_lattice_particles(5)).unwrap();
        Solver::new(simulation, Arc::new(AtomicBool::new(false))).unwrap()
    }

    #[test]
    fn a_short_run_completes_and_conserves_mass_and_momentum() {
        let mut solver = short_run_solver(0.02);
        let mass_before = solver.simulation.total_mass();
        let momentum_before: MVec = solver
            .simulation
            .particles
            .iter()
            .map(|particle| particle.vel * particle.mass)
            .fold(MVec::ZERO, |acc, p| acc + p);
        solver.run().unwrap();
        assert!(solver.simulation.step > 0);
        assert!(solver.simulation.t >= 0.02 - 1e-12);
        let mass_after = solver.simulation.total_mass();
        assert_eq!(mass_before, mass_after);
        let momentum_after: MVec = solver
            .simulation
            .particles
            .iter()
            .map(|particle| particle.vel * particle.mass)
            .fold(MVec::ZERO, |acc, p| acc + p);
        assert!(
            (momentum_after - momentum_before).length() < 1e-10,
            "momentum drifted: {:?}",
            momentum_after
        );
    }

    #[test]
    fn snapshots_appear_at_the_configured_cadence() {
        let mut solver = short_run_solver(0.01);
        solver.run().unwrap();
        let directory = solver.simulation.parameters.output_directory.clone();
        // Initial snapshot plus the one at the end time.
        assert!(directory.join("snapshot_0000.csv").exists());
        assert!(directory.join("snapshot_0001.csv").exists());
        assert!(directory.join("metadata.json").exists());
    }

    #[test]
    fn an_interrupt_stops_the_run_at_a_step_boundary() {
        let mut solver = short_run_solver(1000.0);
        solver.interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
        solver.run().unwrap();
        assert_eq!(solver.simulation.step, 1);
    }
}
