use serde::Deserialize;
use serde::Serialize;

use crate::config::MAX_DEPTH;

/// Parameters controlling the construction of a tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuadTreeConfig {
    /// The maximum depth of the tree. Should be high enough to ensure
    /// that the tree can keep an approximately constant number of
    /// particles per leaf node. Should not be too high in order to
    /// prevent "infinite subdivisions" in edge cases of many
    /// particles at very similar positions.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// The maximum number of particles that a leaf will be filled
    /// with before it is subdivided. The maximum can be exceeded if
    /// the leaf node is at max_depth and will therefore not be
    /// subdivided any further.
    #[serde(default = "default_leaf_particle_number")]
    pub max_num_particles_per_leaf: usize,
}

fn default_max_depth() -> usize {
    MAX_DEPTH
}

fn default_leaf_particle_number() -> usize {
    16
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_num_particles_per_leaf: default_leaf_particle_number(),
        }
    }
}
