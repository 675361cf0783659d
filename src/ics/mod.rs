use std::collections::HashMap;
use std::f64::consts::PI;

use log::info;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::parameters::Parameters;
use crate::particle::Particle;

type SampleFn = fn(&SamplingData, &mut StdRng) -> Vec<Particle>;

/// Registered sample setups; populated once at startup, looked up by
/// the configured sample name when no initial conditions file is
/// given.
static SAMPLES: Lazy<HashMap<&'static str, SampleFn>> = Lazy::new(|| {
    let mut samples: HashMap<&'static str, SampleFn> = HashMap::new();
    samples.insert("uniform", uniform);
    samples.insert("sod_shock_tube", sod_shock_tube);
    samples.insert("pressure_blob", pressure_blob);
    samples.insert("sedov", sedov);
    samples.insert("kelvin_helmholtz", kelvin_helmholtz);
    samples
});

/// Everything a sample function needs: the domain and the lattice
/// resolution, plus the adiabatic index to convert pressures into
/// internal energies.
pub struct SamplingData {
    pub min: MVec,
    pub max: MVec,
    pub resolution: usize,
    pub jitter: Float,
    pub gamma: Float,
}

impl SamplingData {
    fn side_lengths(&self) -> MVec {
        self.max - self.min
    }

    fn spacing(&self) -> Float {
        self.side_lengths()[0] / self.resolution as Float
    }

    fn cell_volume(&self) -> Float {
        let mut volume = 1.0;
        let side_lengths = self.side_lengths();
        for axis in 0..NUM_DIMENSIONS {
            volume *= side_lengths[axis] / self.cells_along(axis) as Float;
        }
        volume
    }

    fn cells_along(&self, axis: usize) -> usize {
        // Equal spacing on every axis; non-cubic domains get
        // proportionally more cells along their longer axes.
        let side_lengths = self.side_lengths();
        let cells = (side_lengths[axis] / self.spacing()).round() as usize;
        cells.max(1)
    }

    /// Lattice positions at the cell centers, jittered when
    /// configured.
    fn lattice(&self, rng: &mut StdRng) -> Vec<MVec> {
        let cells: Vec<usize> = (0..NUM_DIMENSIONS).map(|axis| self.cells_along(axis)).collect();
        let total: usize = cells.iter().product();
        let side_lengths = self.side_lengths();
        (0..total)
            .map(|index| {
                let mut rem = index;
                let mut pos = MVec::ZERO;
                for axis in 0..NUM_DIMENSIONS {
                    let cell = rem % cells[axis];
                    rem /= cells[axis];
                    let spacing = side_lengths[axis] / cells[axis] as Float;
                    pos[axis] = self.min[axis] + (cell as Float + 0.5) * spacing;
                    if self.jitter > 0.0 {
                        pos[axis] += rng.gen_range(-0.5..0.5) * self.jitter * spacing;
                    }
                }
                pos
            })
            .collect()
    }

    /// Specific internal energy of gas with the given pressure and
    /// density.
    fn energy(&self, pres: Float, dens: Float) -> Float {
        pres / ((self.gamma - 1.0) * dens)
    }
}

fn gas_from_profile(
    data: &SamplingData,
    rng: &mut StdRng,
    profile: impl Fn(&MVec) -> (Float, Float, MVec),
) -> Vec<Particle> {
    let cell_volume = data.cell_volume();
    data.lattice(rng)
        .into_iter()
        .enumerate()
        .map(|(index, pos)| {
            let (dens, pres, vel) = profile(&pos);
            let mut particle =
                Particle::gas(index as u64, pos, vel, dens * cell_volume, data.energy(pres, dens));
            particle.dens = dens;
            particle
        })
        .collect()
}

/// Uniform gas at rest with unit density and pressure.
fn uniform(data: &SamplingData, rng: &mut StdRng) -> Vec<Particle> {
    gas_from_profile(data, rng, |_| (1.0, 1.0, MVec::ZERO))
}

/// The classic left/right state shock tube along the first axis; the
/// discontinuity sits at the domain center.
fn sod_shock_tube(data: &SamplingData, rng: &mut StdRng) -> Vec<Particle> {
    let interface = 0.5 * (data.min[0] + data.max[0]);
    gas_from_profile(data, rng, |pos| {
        if pos[0] < interface {
            (1.0, 1.0, MVec::ZERO)
        } else {
            (0.125, 0.1, MVec::ZERO)
        }
    })
}

/// A dense blob in pressure equilibrium with its surroundings; a
/// contact-discontinuity test that should stay static.
fn pressure_blob(data: &SamplingData, rng: &mut StdRng) -> Vec<Particle> {
    let center = (data.min + data.max) * 0.5;
    let radius = 0.1 * data.side_lengths()[0];
    gas_from_profile(data, rng, |pos| {
        let dens = if (*pos - center).length() < radius {
            4.0
        } else {
            1.0
        };
        (dens, 2.5, MVec::ZERO)
    })
}

/// Point explosion: unit-density gas with the blast energy deposited
/// over the particles within 2.5 lattice spacings of the center.
fn sedov(data: &SamplingData, rng: &mut StdRng) -> Vec<Particle> {
    let center = (data.min + data.max) * 0.5;
    let deposit_radius = 2.5 * data.spacing();
    let cold_pressure = 1e-5;
    let mut particles = gas_from_profile(data, rng, |_| (1.0, cold_pressure, MVec::ZERO));
    let heated: Vec<usize> = particles
        .iter()
        .enumerate()
        .filter(|(_, particle)| (particle.pos - center).length() < deposit_radius)
        .map(|(index, _)| index)
        .collect();
    if !heated.is_empty() {
        let blast_energy = 1.0;
        for index in heated.iter() {
            let particle = &mut particles[*index];
            particle.ene = blast_energy / (heated.len() as Float * particle.mass);
        }
    }
    particles
}

/// Two counter-streaming layers of different density with a
/// sinusoidal transverse velocity perturbation.
fn kelvin_helmholtz(data: &SamplingData, rng: &mut StdRng) -> Vec<Particle> {
    let side_lengths = data.side_lengths();
    let perturbation_axis = if NUM_DIMENSIONS > 1 { 1 } else { 0 };
    gas_from_profile(data, rng, |pos| {
        let fraction = (pos[perturbation_axis] - data.min[perturbation_axis])
            / side_lengths[perturbation_axis];
        let in_band = (0.25..0.75).contains(&fraction);
        let (dens, stream) = if in_band { (2.0, 0.5) } else { (1.0, -0.5) };
        let mut vel = MVec::ZERO;
        vel[0] = stream;
        if NUM_DIMENSIONS > 1 {
            let phase = 4.0 * PI * (pos[0] - data.min[0]) / side_lengths[0];
            vel[perturbation_axis] = 0.1 * phase.sin();
        }
        (dens, 2.5, vel)
    })
}

/// Builds the particle array from the configured sample, appending
/// any configured point masses. The seed is recorded in checkpoints;
/// samples only ever run at step 0.
pub fn create_sample_particles(parameters: &Parameters) -> Result<Vec<Particle>> {
    let sample = parameters
        .sample
        .as_ref()
        .ok_or_else(|| {
            Error::Config(
                "no initial conditions file and no sample configured".into(),
            )
        })?;
    let sample_fn = SAMPLES.get(sample.name.as_str()).ok_or_else(|| {
        Error::Config(format!(
            "unknown sample \"{}\" (registered: {})",
            sample.name,
            registered_names().join(", ")
        ))
    })?;
    let box_ = parameters.simulation_box()?;
    let data = SamplingData {
        min: box_.extent.min,
        max: box_.extent.max,
        resolution: sample.resolution,
        jitter: sample.jitter,
        gamma: parameters.physics.gamma,
    };
    let mut rng = StdRng::seed_from_u64(sample.seed);
    let mut particles = (sample_fn)(&data, &mut rng);
    for point_mass in sample.point_masses.iter() {
        let pos = point_mass.position()?;
        particles.push(Particle::point_mass(
            particles.len() as u64,
            pos,
            MVec::ZERO,
            point_mass.mass,
        ));
    }
    info!(
        "sampled {} particles from \"{}\"",
        particles.len(),
        sample.name
    );
    Ok(particles)
}

pub fn registered_names() -> Vec<&'static str> {
    let mut names: Vec<_> = SAMPLES.keys().copied().collect();
    names.sort();
    names
}
