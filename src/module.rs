use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::Error;
use crate::error::Result;
use crate::external;
use crate::gravity;
use crate::hydrodynamics;
use crate::parameters::Parameters;
use crate::parameters::SphType;
use crate::simulation::Simulation;
use crate::timestep;

/// One pass of the per-step pipeline. A module mutates only the
/// particle fields it is responsible for.
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;
    fn exec(&self, simulation: &mut Simulation) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    PreInteraction,
    FluidForce,
    Gravity,
    Timestep,
    HeatingCooling,
    Relaxation,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PreInteraction => "pre-interaction",
            Role::FluidForce => "fluid-force",
            Role::Gravity => "gravity",
            Role::Timestep => "timestep",
            Role::HeatingCooling => "heating-cooling",
            Role::Relaxation => "relaxation",
        }
    }
}

type Constructor = fn(&Parameters) -> Box<dyn Module>;

const ALL_VARIANTS: [SphType; 4] = [SphType::Ssph, SphType::Disph, SphType::Gsph, SphType::Gdisph];

/// The registration table binding (SPH variant, role) to an
/// implementation. Populated once at startup; the solver composes its
/// pipeline from lookups into this table.
static REGISTRY: Lazy<HashMap<(SphType, Role), Constructor>> = Lazy::new(|| {
    let mut table: HashMap<(SphType, Role), Constructor> = HashMap::new();
    for variant in ALL_VARIANTS {
        table.insert(
            (variant, Role::PreInteraction),
            hydrodynamics::PreInteraction::construct,
        );
        table.insert((variant, Role::Gravity), gravity::Gravity::construct);
        table.insert(
            (variant, Role::Timestep),
            timestep::TimestepController::construct,
        );
        table.insert(
            (variant, Role::HeatingCooling),
            external::HeatingCooling::construct,
        );
        table.insert((variant, Role::Relaxation), external::Relaxation::construct);
    }
    table.insert(
        (SphType::Ssph, Role::FluidForce),
        hydrodynamics::SsphForce::construct,
    );
    table.insert(
        (SphType::Disph, Role::FluidForce),
        hydrodynamics::DisphForce::construct,
    );
    table.insert(
        (SphType::Gsph, Role::FluidForce),
        hydrodynamics::GsphForce::construct,
    );
    table.insert(
        (SphType::Gdisph, Role::FluidForce),
        hydrodynamics::GsphForce::construct,
    );
    table
});

pub fn create_module(
    variant: SphType,
    role: Role,
    parameters: &Parameters,
) -> Result<Box<dyn Module>> {
    REGISTRY
        .get(&(variant, role))
        .map(|constructor| constructor(parameters))
        .ok_or_else(|| Error::UnknownModule {
            variant: variant.as_str().into(),
            role: role.as_str().into(),
        })
}

/// The per-step pass sequence for the configured variant:
/// pre-interaction, fluid force, then the optional force sources, and
/// finally the timestep controller.
pub fn build_pipeline(parameters: &Parameters) -> Result<Vec<Box<dyn Module>>> {
    let variant = parameters.sph_type;
    let mut pipeline = vec![
        create_module(variant, Role::PreInteraction, parameters)?,
        create_module(variant, Role::FluidForce, parameters)?,
    ];
    if parameters.gravity.enabled || !parameters.gravity.external_point_masses.is_empty() {
        pipeline.push(create_module(variant, Role::Gravity, parameters)?);
    }
    if parameters.heating_cooling.enabled {
        pipeline.push(create_module(variant, Role::HeatingCooling, parameters)?);
    }
    if parameters.relaxation.enabled {
        pipeline.push(create_module(variant, Role::Relaxation, parameters)?);
    }
    pipeline.push(create_module(variant, Role::Timestep, parameters)?);
    Ok(pipeline)
}
