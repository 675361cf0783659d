use rayon::prelude::*;

use crate::dimension::Float;
use crate::dimension::MVec;
use crate::error::Result;
use crate::module::Module;
use crate::parameters::Parameters;
use crate::quadtree::Node;
use crate::quadtree::QuadTree;
use crate::simulation::Simulation;
use crate::simulation_box::SimulationBox;

pub(crate) struct Solver {
    gravity_constant: Float,
    softening_length: Float,
    opening_angle: Float,
    box_: SimulationBox,
}

impl Solver {
    fn calc_gravity_acceleration(&self, pos1: &MVec, pos2: &MVec, mass2: Float) -> MVec {
        let distance_vector = self.box_.periodic_distance_vec(pos1, pos2);
        let softened = distance_vector.length_squared()
            + self.softening_length * self.softening_length;
        if softened == 0.0 {
            return MVec::ZERO;
        }
        -distance_vector * self.gravity_constant * mass2 / softened.powf(1.5)
    }

    /// Accumulated acceleration from the whole tree, skipping the
    /// particle's own contribution by index at the leaves.
    pub fn traverse_tree(&self, tree: &QuadTree, pos: &MVec, self_index: usize) -> MVec {
        match tree.node {
            Node::Tree(ref children) => children
                .iter()
                .map(|child| {
                    if child.data.moments.count() == 0 {
                        MVec::ZERO
                    } else if self.should_be_opened(child, pos) {
                        self.traverse_tree(child, pos, self_index)
                    } else {
                        self.calc_gravity_acceleration(
                            pos,
                            &child.data.moments.center_of_mass(),
                            child.data.moments.total(),
                        )
                    }
                })
                .fold(MVec::ZERO, |acc, contribution| acc + contribution),
            Node::Leaf(ref leaf) => leaf
                .iter()
                .filter(|particle| particle.index != self_index)
                .map(|particle| {
                    self.calc_gravity_acceleration(pos, &particle.pos, particle.mass)
                })
                .fold(MVec::ZERO, |acc, contribution| acc + contribution),
        }
    }

    fn should_be_opened(&self, child: &QuadTree, pos: &MVec) -> bool {
        let distance = self
            .box_
            .periodic_distance(pos, &child.data.moments.center_of_mass());
        if distance == 0.0 {
            return true;
        }
        child.extent.max_side_length() / distance > self.opening_angle
    }
}

/// Self-gravity via the Barnes-Hut multipole walk, plus the direct
/// pull of any configured external point masses. Point-mass particles
/// source and receive gravity like everything else; wall particles
/// stay pinned.
pub struct Gravity {
    enabled: bool,
    gravity_constant: Float,
    theta: Float,
    softening: Float,
    external: Vec<(MVec, Float)>,
}

impl Gravity {
    pub fn construct(parameters: &Parameters) -> Box<dyn Module> {
        let external = parameters
            .gravity
            .external_point_masses
            .iter()
            .map(|point_mass| {
                let pos = point_mass
                    .position()
                    .expect("point masses are validated at startup");
                (pos, point_mass.mass)
            })
            .collect();
        Box::new(Self {
            enabled: parameters.gravity.enabled,
            gravity_constant: parameters.gravity.gravity_constant,
            theta: parameters.gravity.theta,
            softening: parameters.gravity.softening,
            external,
        })
    }

    fn solver(&self, simulation: &Simulation) -> Solver {
        Solver {
            gravity_constant: self.gravity_constant,
            softening_length: self.softening,
            opening_angle: self.theta,
            box_: simulation.box_.clone(),
        }
    }
}

impl Module for Gravity {
    fn name(&self) -> &'static str {
        "gravity"
    }

    fn exec(&self, simulation: &mut Simulation) -> Result<()> {
        let solver = self.solver(simulation);
        let accelerations: Vec<MVec> = {
            let simulation = &*simulation;
            simulation
                .particles
                .par_iter()
                .enumerate()
                .map(|(index, particle)| {
                    if particle.is_wall {
                        return MVec::ZERO;
                    }
                    let mut acc = MVec::ZERO;
                    if self.enabled {
                        acc += solver.traverse_tree(&simulation.tree, &particle.pos, index);
                    }
                    for (pos, mass) in self.external.iter() {
                        acc += solver.calc_gravity_acceleration(&particle.pos, pos, *mass);
                    }
                    acc
                })
                .collect()
        };
        for (particle, acc) in simulation.particles.iter_mut().zip(accelerations) {
            particle.acc += acc;
        }
        Ok(())
    }
}
