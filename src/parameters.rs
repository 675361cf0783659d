use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::extent::Extent;
use crate::kernel::CubicSpline;
use crate::kernel::KernelFunction;
use crate::kernel::WendlandC4;
use crate::simulation_box::SimulationBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SphType {
    #[serde(rename = "SSPH")]
    Ssph,
    #[serde(rename = "DISPH")]
    Disph,
    #[serde(rename = "GSPH")]
    Gsph,
    #[serde(rename = "GDISPH")]
    Gdisph,
}

impl SphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SphType::Ssph => "SSPH",
            SphType::Disph => "DISPH",
            SphType::Gsph => "GSPH",
            SphType::Gdisph => "GDISPH",
        }
    }

    /// GDISPH composes the DISPH density estimate with the Godunov
    /// force; both Godunov variants share the Riemann machinery.
    pub fn is_godunov(&self) -> bool {
        matches!(self, SphType::Gsph | SphType::Gdisph)
    }

    pub fn is_density_independent(&self) -> bool {
        matches!(self, SphType::Disph | SphType::Gdisph)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeParameters {
    /// Simulation end time.
    pub end: Float,
    /// Snapshot cadence, in simulation time units.
    pub output: Float,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CflParameters {
    /// Sound (CFL) timestep coefficient.
    #[serde(default = "default_cfl_sound")]
    pub sound: Float,
    /// Force timestep coefficient.
    #[serde(default = "default_cfl_force")]
    pub force: Float,
    /// Energy timestep coefficient, applied to cooling particles.
    #[serde(default = "default_cfl_energy")]
    pub energy: Float,
}

fn default_cfl_sound() -> Float {
    0.3
}

fn default_cfl_force() -> Float {
    0.125
}

fn default_cfl_energy() -> Float {
    0.3
}

impl Default for CflParameters {
    fn default() -> Self {
        Self {
            sound: default_cfl_sound(),
            force: default_cfl_force(),
            energy: default_cfl_energy(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicsParameters {
    /// Adiabatic index of the ideal gas equation of state.
    pub gamma: Float,
    /// The number of neighbors that the adaptive smoothing length
    /// aims for.
    pub neighbor_number: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvParameters {
    /// Artificial viscosity coefficient; also the initial value when
    /// the time-dependent formulation is active.
    #[serde(default = "default_alpha")]
    pub alpha: Float,
    /// Suppress viscosity in shear flows with the Balsara limiter.
    #[serde(default = "default_true")]
    pub use_balsara_switch: bool,
    /// Evolve alpha per particle between alpha_min and alpha_max.
    #[serde(default)]
    pub use_time_dependent_av: bool,
    #[serde(default = "default_alpha_min")]
    pub alpha_min: Float,
    #[serde(default = "default_alpha_max")]
    pub alpha_max: Float,
    /// Decay parameter of the time-dependent coefficient; the decay
    /// timescale is h / (epsilon c).
    #[serde(default = "default_av_epsilon")]
    pub epsilon: Float,
    /// Add the signal-velocity artificial conductivity term to the
    /// energy equation. Mostly useful for SSPH contact
    /// discontinuities.
    #[serde(default)]
    pub use_conductivity: bool,
    #[serde(default = "default_alpha")]
    pub conductivity_alpha: Float,
}

fn default_alpha() -> Float {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_alpha_min() -> Float {
    0.1
}

fn default_alpha_max() -> Float {
    2.0
}

fn default_av_epsilon() -> Float {
    0.2
}

impl Default for AvParameters {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            use_balsara_switch: true,
            use_time_dependent_av: false,
            alpha_min: default_alpha_min(),
            alpha_max: default_alpha_max(),
            epsilon: default_av_epsilon(),
            use_conductivity: false,
            conductivity_alpha: default_alpha(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub enum KernelChoice {
    #[default]
    #[serde(rename = "cubic_spline")]
    CubicSpline,
    #[serde(rename = "wendland_c4")]
    WendlandC4,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnisotropicParameters {
    /// Fixed vertical smoothing scale of the 2D+1D product kernel.
    pub hz: Float,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalPointMass {
    pub pos: Vec<Float>,
    pub mass: Float,
}

impl ExternalPointMass {
    pub fn position(&self) -> Result<MVec> {
        vec_from_components("gravity.external_point_masses.pos", &self.pos)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GravityParameters {
    /// Self-gravity via the tree multipole walk.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gravity_constant", rename = "G")]
    pub gravity_constant: Float,
    /// Barnes-Hut opening angle: any node seen under an angle smaller
    /// than this is approximated by its mass moments instead of being
    /// opened.
    #[serde(default = "default_theta")]
    pub theta: Float,
    /// Plummer softening length.
    #[serde(default)]
    pub softening: Float,
    /// Leaf size of the tree used for both the gravity walk and the
    /// neighbor search.
    #[serde(default = "default_leaf_particle_number")]
    pub leaf_particle_number: usize,
    /// Static point masses whose pull is added to every hydro
    /// particle by direct summation.
    #[serde(default)]
    pub external_point_masses: Vec<ExternalPointMass>,
}

fn default_gravity_constant() -> Float {
    1.0
}

fn default_theta() -> Float {
    0.5
}

fn default_leaf_particle_number() -> usize {
    16
}

impl Default for GravityParameters {
    fn default() -> Self {
        Self {
            enabled: false,
            gravity_constant: default_gravity_constant(),
            theta: default_theta(),
            softening: 0.0,
            leaf_particle_number: default_leaf_particle_number(),
            external_point_masses: vec![],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GsphParameters {
    /// Second-order MUSCL reconstruction of the Riemann states.
    #[serde(default)]
    pub is_2nd_order: bool,
    /// Apply the grad-h factors inside the Godunov pair terms.
    #[serde(default)]
    pub force_correction: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainParameters {
    #[serde(rename = "rangeMin")]
    pub range_min: Vec<Float>,
    #[serde(rename = "rangeMax")]
    pub range_max: Vec<Float>,
    /// Per-axis periodicity flags.
    pub periodic: Vec<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleParameters {
    /// Name of a registered sample setup, used when no initial
    /// conditions file is given.
    pub name: String,
    /// Particles per axis of the sampled lattice.
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Position jitter amplitude in units of the lattice spacing.
    #[serde(default)]
    pub jitter: Float,
    /// Point masses appended to the sampled particles at load time.
    #[serde(default)]
    pub point_masses: Vec<ExternalPointMass>,
}

fn default_resolution() -> usize {
    32
}

fn default_seed() -> u64 {
    123
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeatingCoolingParameters {
    #[serde(default)]
    pub enabled: bool,
    /// Uniform specific heating rate.
    #[serde(default)]
    pub heating_rate: Float,
    /// Relax u toward this value on the timescale below; zero
    /// timescale disables the cooling term.
    #[serde(default)]
    pub target_energy: Float,
    #[serde(default)]
    pub timescale: Float,
}

impl Default for HeatingCoolingParameters {
    fn default() -> Self {
        Self {
            enabled: false,
            heating_rate: 0.0,
            target_energy: 0.0,
            timescale: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaxationParameters {
    /// Damp velocities with -v / timescale; used to settle initial
    /// conditions into equilibrium.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_relaxation_timescale")]
    pub timescale: Float,
}

fn default_relaxation_timescale() -> Float {
    1.0
}

impl Default for RelaxationParameters {
    fn default() -> Self {
        Self {
            enabled: false,
            timescale: default_relaxation_timescale(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    #[serde(rename = "type")]
    pub sph_type: SphType,
    pub time: TimeParameters,
    #[serde(default)]
    pub cfl: CflParameters,
    pub physics: PhysicsParameters,
    #[serde(default)]
    pub av: AvParameters,
    #[serde(default)]
    pub kernel: KernelChoice,
    #[serde(default)]
    pub anisotropic: Option<AnisotropicParameters>,
    #[serde(default)]
    pub gravity: GravityParameters,
    #[serde(default)]
    pub gsph: GsphParameters,
    pub domain: DomainParameters,
    #[serde(default, rename = "initialConditionsFile")]
    pub initial_conditions_file: String,
    #[serde(default)]
    pub sample: Option<SampleParameters>,
    #[serde(default, rename = "heatingCooling")]
    pub heating_cooling: HeatingCoolingParameters,
    #[serde(default)]
    pub relaxation: RelaxationParameters,
    #[serde(default = "default_output_directory", rename = "outputDirectory")]
    pub output_directory: PathBuf,
    /// Mirror every CSV snapshot in the packed binary format.
    #[serde(default, rename = "binaryOutput")]
    pub binary_output: bool,
    #[serde(default, rename = "enableCheckpointing")]
    pub enable_checkpointing: bool,
    #[serde(default = "default_checkpoint_interval", rename = "checkpointInterval")]
    pub checkpoint_interval: Float,
    #[serde(default = "default_checkpoint_max_keep", rename = "checkpointMaxKeep")]
    pub checkpoint_max_keep: usize,
    #[serde(default = "default_true", rename = "checkpointOnInterrupt")]
    pub checkpoint_on_interrupt: bool,
    #[serde(default = "default_checkpoint_directory", rename = "checkpointDirectory")]
    pub checkpoint_directory: PathBuf,
    #[serde(default, rename = "resumeFromCheckpoint")]
    pub resume_from_checkpoint: bool,
    #[serde(default, rename = "resumeCheckpointFile")]
    pub resume_checkpoint_file: String,
}

fn default_output_directory() -> PathBuf {
    "output".into()
}

fn default_checkpoint_interval() -> Float {
    10.0
}

fn default_checkpoint_max_keep() -> usize {
    3
}

fn default_checkpoint_directory() -> PathBuf {
    "checkpoints".into()
}

fn vec_from_components(what: &str, components: &[Float]) -> Result<MVec> {
    if components.len() != NUM_DIMENSIONS {
        return Err(Error::Config(format!(
            "{} must have {} components for this build, found {}",
            what,
            NUM_DIMENSIONS,
            components.len()
        )));
    }
    Ok(MVec::from_slice(components))
}

impl Parameters {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let parameters: Parameters = serde_json::from_str(&contents)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<()> {
        let config_error = |message: String| Err(Error::Config(message));
        if self.physics.gamma <= 1.0 {
            return config_error(format!("gamma must exceed 1, got {}", self.physics.gamma));
        }
        if self.physics.neighbor_number == 0 {
            return config_error("neighbor_number must be positive".into());
        }
        if self.time.end <= 0.0 || self.time.output <= 0.0 {
            return config_error("time.end and time.output must be positive".into());
        }
        if self.cfl.sound <= 0.0 || self.cfl.force <= 0.0 || self.cfl.energy <= 0.0 {
            return config_error("cfl coefficients must be positive".into());
        }
        if self.av.alpha_min > self.av.alpha_max {
            return config_error(format!(
                "av.alpha_min ({}) exceeds av.alpha_max ({})",
                self.av.alpha_min, self.av.alpha_max
            ));
        }
        if self.domain.periodic.len() != NUM_DIMENSIONS {
            return config_error(format!(
                "domain.periodic must have {} entries for this build",
                NUM_DIMENSIONS
            ));
        }
        let range_min = vec_from_components("domain.rangeMin", &self.domain.range_min)?;
        let range_max = vec_from_components("domain.rangeMax", &self.domain.range_max)?;
        for axis in 0..NUM_DIMENSIONS {
            if range_min[axis] >= range_max[axis] {
                return config_error(format!(
                    "domain.rangeMin must be below domain.rangeMax on axis {}",
                    axis
                ));
            }
        }
        if let Some(anisotropic) = &self.anisotropic {
            if NUM_DIMENSIONS != 3 {
                return config_error(
                    "the anisotropic kernel requires a 3d build".into(),
                );
            }
            if anisotropic.hz <= 0.0 {
                return config_error("anisotropic.hz must be positive".into());
            }
        }
        if self.gravity.theta < 0.0 || self.gravity.softening < 0.0 {
            return config_error("gravity.theta and gravity.softening must not be negative".into());
        }
        if self.gravity.leaf_particle_number == 0 {
            return config_error("gravity.leaf_particle_number must be positive".into());
        }
        for point_mass in self
            .gravity
            .external_point_masses
            .iter()
            .chain(self.sample.iter().flat_map(|sample| sample.point_masses.iter()))
        {
            point_mass.position()?;
            if point_mass.mass <= 0.0 {
                return config_error("point masses must have positive mass".into());
            }
        }
        if self.enable_checkpointing && self.checkpoint_interval <= 0.0 {
            return config_error("checkpointInterval must be positive".into());
        }
        if self.heating_cooling.enabled && self.heating_cooling.timescale < 0.0 {
            return config_error("heatingCooling.timescale must not be negative".into());
        }
        if self.relaxation.enabled && self.relaxation.timescale <= 0.0 {
            return config_error("relaxation.timescale must be positive".into());
        }
        Ok(())
    }

    pub fn simulation_box(&self) -> Result<SimulationBox> {
        let range_min = vec_from_components("domain.rangeMin", &self.domain.range_min)?;
        let range_max = vec_from_components("domain.rangeMax", &self.domain.range_max)?;
        let mut periodic = [false; NUM_DIMENSIONS];
        for (axis, flag) in self.domain.periodic.iter().enumerate() {
            periodic[axis] = *flag;
        }
        Ok(SimulationBox::new(
            Extent::new(range_min, range_max),
            periodic,
        ))
    }

    /// The dimension entering kernel normalization, the
    /// neighbor-count formula and the grad-h factors. 2 in the
    /// anisotropic ("2.5D") mode regardless of the ambient space.
    pub fn effective_dimension(&self) -> usize {
        if self.anisotropic.is_some() {
            2
        } else {
            NUM_DIMENSIONS
        }
    }

    pub fn build_kernel(&self) -> Box<dyn KernelFunction> {
        #[cfg(not(any(feature = "1d", feature = "2d")))]
        if let Some(anisotropic) = &self.anisotropic {
            return Box::new(crate::kernel::Anisotropic::new(anisotropic.hz));
        }
        let dim = self.effective_dimension();
        match self.kernel {
            KernelChoice::CubicSpline => Box::new(CubicSpline::new(dim)),
            KernelChoice::WendlandC4 => Box::new(WendlandC4::new(dim)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Parameters;
    use crate::config::NUM_DIMENSIONS;

    pub(crate) fn minimal_json() -> serde_json::Value {
        let axis_array = |value: f64| vec![value; NUM_DIMENSIONS];
        serde_json::json!({
            "type": "SSPH",
            "time": {"end": 1.0, "output": 0.1},
            "physics": {"gamma": 1.4, "neighbor_number": 8},
            "domain": {
                "rangeMin": axis_array(-0.5),
                "rangeMax": axis_array(0.5),
                "periodic": vec![true; NUM_DIMENSIONS],
            },
        })
    }

    #[test]
    fn minimal_configuration_parses_and_validates() {
        let parameters: Parameters = serde_json::from_value(minimal_json()).unwrap();
        parameters.validate().unwrap();
        assert_eq!(parameters.physics.neighbor_number, 8);
        assert_eq!(parameters.cfl.sound, 0.3);
        assert!(!parameters.gravity.enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut json = minimal_json();
        json["no_such_key"] = 1.into();
        assert!(serde_json::from_value::<Parameters>(json).is_err());
    }

    #[test]
    fn mismatched_domain_dimension_is_rejected() {
        let mut json = minimal_json();
        json["domain"]["rangeMin"] = serde_json::json!(vec![0.0; NUM_DIMENSIONS + 1]);
        let parameters: Parameters = serde_json::from_value(json).unwrap();
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn gamma_below_unity_is_rejected() {
        let mut json = minimal_json();
        json["physics"]["gamma"] = serde_json::json!(0.9);
        let parameters: Parameters = serde_json::from_value(json).unwrap();
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn unknown_sph_type_is_rejected() {
        let mut json = minimal_json();
        json["type"] = "MAGIC".into();
        assert!(serde_json::from_value::<Parameters>(json).is_err());
    }
}
