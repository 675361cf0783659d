use std::collections::HashMap;

use crate::dimension::Float;
use crate::dimension::MVec;

/// Auxiliary per-particle arrays keyed by name, sized to the particle
/// count. The GSPH reconstruction stores its gradient fields here;
/// contents are recomputed every step before the fluid force pass.
#[derive(Default)]
pub struct NamedArrays {
    scalars: HashMap<&'static str, Vec<Float>>,
    vectors: HashMap<&'static str, Vec<MVec>>,
}

impl NamedArrays {
    pub fn insert_scalar(&mut self, name: &'static str, values: Vec<Float>) {
        self.scalars.insert(name, values);
    }

    pub fn insert_vector(&mut self, name: &'static str, values: Vec<MVec>) {
        self.vectors.insert(name, values);
    }

    pub fn scalar(&self, name: &str) -> Option<&[Float]> {
        self.scalars.get(name).map(|values| values.as_slice())
    }

    pub fn vector(&self, name: &str) -> Option<&[MVec]> {
        self.vectors.get(name).map(|values| values.as_slice())
    }

    pub fn clear(&mut self) {
        self.scalars.clear();
        self.vectors.clear();
    }
}

/// Names of the gradient arrays filled by the reconstruction pass.
pub const GRAD_DENSITY: &str = "grad_density";
pub const GRAD_PRESSURE: &str = "grad_pressure";
pub const GRAD_VELOCITY: [&str; 3] = ["grad_velocity_x", "grad_velocity_y", "grad_velocity_z"];

/// Velocity divergence from the pre-interaction pass; the Godunov
/// force uses it to detect shock-quiet pairs.
pub const DIV_VELOCITY: &str = "div_velocity";
