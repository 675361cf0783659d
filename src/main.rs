use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use log::warn;
use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::Config;
use simplelog::TermLogger;
use simplelog::TerminalMode;

use spindrift::command_line_options::CommandLineOptions;
use spindrift::config::NUM_DIMENSIONS;
use spindrift::ics;
use spindrift::io::checkpoint;
use spindrift::io::checkpoint::CheckpointWriter;
use spindrift::io::input;
use spindrift::parameters::Parameters;
use spindrift::particle::Particle;
use spindrift::simulation::Simulation;
use spindrift::solver::Solver;

fn setup_logging(verbosity: usize) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("logging initialized once");
}

/// Particle array plus the restored (t, step, snapshot index) when
/// resuming from a checkpoint.
struct LoadedState {
    particles: Vec<Particle>,
    t: f64,
    dt: f64,
    step: u64,
    snapshot_index: usize,
}

fn load_particles(parameters: &Parameters) -> anyhow::Result<LoadedState> {
    if parameters.resume_from_checkpoint {
        let path = if parameters.resume_checkpoint_file.is_empty() {
            CheckpointWriter::latest(&parameters.checkpoint_directory).context(
                "resumeFromCheckpoint is set but the checkpoint directory has no checkpoints",
            )?
        } else {
            parameters.resume_checkpoint_file.clone().into()
        };
        info!("resuming from {}", path.display());
        let restored = checkpoint::read_checkpoint(&path)?;
        match serde_json::from_str::<Parameters>(&restored.parameters_json) {
            Ok(stored) if stored.sph_type != parameters.sph_type => warn!(
                "checkpoint was written by a {} run, continuing as {}",
                stored.sph_type.as_str(),
                parameters.sph_type.as_str()
            ),
            Err(_) => warn!("could not parse the parameter block stored in the checkpoint"),
            _ => {}
        }
        return Ok(LoadedState {
            particles: restored.particles,
            t: restored.t,
            dt: restored.dt,
            step: restored.step,
            snapshot_index: restored.snapshot_index,
        });
    }
    let particles = if parameters.initial_conditions_file.is_empty() {
        ics::create_sample_particles(parameters)?
    } else {
        input::load_initial_conditions(parameters.initial_conditions_file.as_ref())?
    };
    Ok(LoadedState {
        particles,
        t: 0.0,
        dt: 0.0,
        step: 0,
        snapshot_index: 0,
    })
}

fn main() -> anyhow::Result<()> {
    let options = CommandLineOptions::parse();
    setup_logging(options.verbosity);
    if let Some(num_worker_threads) = options.num_worker_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_worker_threads)
            .build_global()
            .context("worker thread pool")?;
    }

    let parameters = Parameters::from_file(&options.parameter_file_path).with_context(|| {
        format!(
            "loading parameters from {}",
            options.parameter_file_path.display()
        )
    })?;
    info!(
        "running a {}d {} simulation until t = {:.6e}",
        NUM_DIMENSIONS,
        parameters.sph_type.as_str(),
        parameters.time.end
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing the interrupt handler")?;

    let loaded = load_particles(&parameters)?;
    let mut simulation = Simulation::new(parameters, loaded.particles)?;
    simulation.t = loaded.t;
    simulation.dt = loaded.dt;
    simulation.step = loaded.step;
    let mut solver = Solver::new(simulation, interrupted)?;
    solver.output_mut().set_snapshot_index(loaded.snapshot_index);
    solver.run()?;
    Ok(())
}
