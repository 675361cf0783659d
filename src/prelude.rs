pub use crate::dimension::Float;
pub use crate::dimension::MVec;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::module::Module;
pub use crate::parameters::Parameters;
pub use crate::parameters::SphType;
pub use crate::particle::Particle;
pub use crate::simulation::Simulation;
pub use crate::solver::Solver;
