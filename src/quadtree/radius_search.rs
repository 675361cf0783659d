use super::LeafData;
use super::Node;
use super::QuadTree;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::simulation_box::SimulationBox;

/// Returned when a gather exceeds the neighbor buffer; callers attach
/// the particle and step context.
#[derive(Debug)]
pub struct Overflow {
    pub capacity: usize,
}

/// A caller-provided, bounded neighbor buffer. Reused across
/// particles to avoid per-gather allocations.
#[derive(Debug)]
pub struct NeighborList {
    indices: Vec<usize>,
    capacity: usize,
}

impl NeighborList {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    fn push(&mut self, index: usize) -> Result<(), Overflow> {
        if self.indices.len() >= self.capacity {
            return Err(Overflow {
                capacity: self.capacity,
            });
        }
        self.indices.push(index);
        Ok(())
    }
}

/// Returns whether the two bounding boxes given by the center
/// coordinates pos1 and pos2 and the side lengths size1 and size2
/// overlap under the periodic minimum image.
fn bounding_boxes_overlap_periodic(
    box_: &SimulationBox,
    pos1: &MVec,
    size1: &MVec,
    pos2: &MVec,
    size2: &MVec,
) -> bool {
    let dist = box_.periodic_distance_vec(pos1, pos2);
    let total_size = *size1 + *size2;
    (0..crate::config::NUM_DIMENSIONS).all(|axis| dist[axis].abs() <= total_size[axis])
}

trait SearchCriterion {
    fn should_visit_node(&self, tree: &QuadTree) -> bool;
    fn should_include_leaf(&self, leaf: &LeafData) -> bool;
}

/// All gas particles j with |r_ij| < radius under the minimum image.
struct PeriodicRadiusSearch<'a> {
    box_: &'a SimulationBox,
    pos: MVec,
    radius: Float,
}

impl SearchCriterion for PeriodicRadiusSearch<'_> {
    fn should_visit_node(&self, tree: &QuadTree) -> bool {
        bounding_boxes_overlap_periodic(
            self.box_,
            &tree.extent.center(),
            &tree.extent.side_lengths(),
            &self.pos,
            &(MVec::ONE * self.radius),
        )
    }

    fn should_include_leaf(&self, leaf: &LeafData) -> bool {
        leaf.is_gas && self.box_.periodic_distance(&self.pos, &leaf.pos) < self.radius
    }
}

/// All gas particles j with |r_ij| < max(radius, h_j); the node bound
/// uses the largest descendant smoothing length.
struct SymmetricRadiusSearch<'a> {
    box_: &'a SimulationBox,
    pos: MVec,
    radius: Float,
}

impl SearchCriterion for SymmetricRadiusSearch<'_> {
    fn should_visit_node(&self, tree: &QuadTree) -> bool {
        let radius = self.radius.max(tree.data.max_sml);
        bounding_boxes_overlap_periodic(
            self.box_,
            &tree.extent.center(),
            &tree.extent.side_lengths(),
            &self.pos,
            &(MVec::ONE * radius),
        )
    }

    fn should_include_leaf(&self, leaf: &LeafData) -> bool {
        leaf.is_gas
            && self.box_.periodic_distance(&self.pos, &leaf.pos) < self.radius.max(leaf.sml)
    }
}

impl QuadTree {
    /// Collects all gas particles within `radius` of `pos` into the
    /// buffer. The caller decides what to do about an overflow.
    pub fn fill_neighbors(
        &self,
        box_: &SimulationBox,
        pos: MVec,
        radius: Float,
        list: &mut NeighborList,
    ) -> Result<(), Overflow> {
        list.clear();
        self.search(
            &PeriodicRadiusSearch {
                box_,
                pos,
                radius,
            },
            list,
        )
    }

    /// Symmetric gather: collects all gas particles j with
    /// |r_ij| < max(radius, h_j), as required by the fluid force
    /// pass.
    pub fn fill_neighbors_symmetric(
        &self,
        box_: &SimulationBox,
        pos: MVec,
        radius: Float,
        list: &mut NeighborList,
    ) -> Result<(), Overflow> {
        list.clear();
        self.search(
            &SymmetricRadiusSearch {
                box_,
                pos,
                radius,
            },
            list,
        )
    }

    fn search(
        &self,
        criterion: &impl SearchCriterion,
        list: &mut NeighborList,
    ) -> Result<(), Overflow> {
        if !criterion.should_visit_node(self) {
            return Ok(());
        }
        match self.node {
            Node::Tree(ref children) => {
                for child in children.iter() {
                    child.search(criterion, list)?;
                }
            }
            Node::Leaf(ref leaf) => {
                for particle in leaf.iter() {
                    if criterion.should_include_leaf(particle) {
                        list.push(particle.index)?;
                    }
                }
            }
        }
        Ok(())
    }
}
