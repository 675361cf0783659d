use crate::dimension::Float;
use crate::error::Error;
use crate::error::Result;
use crate::extent::Extent;
use crate::kernel::KernelFunction;
use crate::named_arrays::NamedArrays;
use crate::parameters::Parameters;
use crate::particle::Particle;
use crate::quadtree::LeafData;
use crate::quadtree::QuadTree;
use crate::quadtree::QuadTreeConfig;
use crate::simulation_box::SimulationBox;

/// The global simulation state: the particle array plus everything
/// the per-step passes share. Modules mutate only the particle fields
/// they are responsible for.
pub struct Simulation {
    pub parameters: Parameters,
    pub particles: Vec<Particle>,
    pub t: Float,
    pub dt: Float,
    pub step: u64,
    pub box_: SimulationBox,
    pub kernel: Box<dyn KernelFunction>,
    pub tree: QuadTree,
    pub arrays: NamedArrays,
    /// Global minimum of h / v_sig, merged from per-thread minima in
    /// the pre-interaction pass; sets the viscous timestep bound.
    pub h_per_v_sig: Float,
    /// Particles whose smoothing length iteration did not converge
    /// this run; surfaced in the end-of-run summary.
    pub smoothing_length_failures: u64,
}

impl Simulation {
    pub fn new(parameters: Parameters, particles: Vec<Particle>) -> Result<Self> {
        let box_ = parameters.simulation_box()?;
        let kernel = parameters.build_kernel();
        let mut simulation = Self {
            tree: QuadTree::make_empty_leaf_from_extent(box_.extent.clone()),
            box_,
            kernel,
            parameters,
            particles,
            t: 0.0,
            dt: 0.0,
            step: 0,
            arrays: NamedArrays::default(),
            h_per_v_sig: Float::MAX,
            smoothing_length_failures: 0,
        };
        simulation.wrap_positions();
        simulation.rebuild_tree();
        Ok(simulation)
    }

    pub fn tree_config(&self) -> QuadTreeConfig {
        QuadTreeConfig {
            max_num_particles_per_leaf: self.parameters.gravity.leaf_particle_number,
            ..Default::default()
        }
    }

    pub fn wrap_positions(&mut self) {
        for particle in self.particles.iter_mut() {
            particle.pos = self.box_.periodic_wrap(particle.pos);
        }
    }

    /// Rebuilds the tree from scratch over the current positions. The
    /// tree extent covers all particles even when some have left an
    /// open (non-periodic) domain.
    pub fn rebuild_tree(&mut self) {
        let leaves = LeafData::from_particles(&self.particles);
        let extent = Extent::from_positions(
            leaves
                .iter()
                .map(|leaf| &leaf.pos)
                .chain([&self.box_.extent.min, &self.box_.extent.max]),
        )
        .expect("tree built with no particles and no box")
        .pad();
        self.tree = QuadTree::new(&self.tree_config(), leaves, &extent);
    }

    pub fn gamma(&self) -> Float {
        self.parameters.physics.gamma
    }

    /// Aborts the step if any hydro particle accumulated a non-finite
    /// acceleration or energy derivative.
    pub fn check_finite(&self) -> Result<()> {
        for particle in self.particles.iter().filter(|particle| particle.is_hydro()) {
            if !particle.acc.is_finite() {
                return Err(self.non_finite("acceleration", particle));
            }
            if !particle.dene.is_finite() {
                return Err(self.non_finite("energy derivative", particle));
            }
        }
        Ok(())
    }

    fn non_finite(&self, quantity: &'static str, particle: &Particle) -> Error {
        Error::NonFinite {
            quantity,
            particle: particle.id,
            step: self.step,
            time: self.t,
        }
    }

    pub fn total_mass(&self) -> Float {
        self.particles.iter().map(|particle| particle.mass).sum()
    }
}
