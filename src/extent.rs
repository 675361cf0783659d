use crate::config::NUM_DIMENSIONS;
use crate::config::TWO_TO_NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;

#[derive(Clone, Default, PartialEq)]
pub struct Extent {
    pub min: MVec,
    pub max: MVec,
    pub center: MVec,
}

impl Extent {
    pub fn new(min: MVec, max: MVec) -> Self {
        for axis in 0..NUM_DIMENSIONS {
            debug_assert!(min[axis] <= max[axis]);
        }
        Self {
            min,
            max,
            center: (min + max) * 0.5,
        }
    }

    pub fn cube_from_side_length(side_length: Float) -> Self {
        Self::new(MVec::ZERO, MVec::ONE * side_length)
    }

    /// Return an extent with slightly increased size but the same
    /// center. Degenerate axes (all particles in a plane) are widened
    /// by an absolute epsilon so that the tree subdivision stays
    /// well-defined.
    pub fn pad(self) -> Self {
        const PADDING_FRACTION: Float = 0.01;
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..NUM_DIMENSIONS {
            let half = (max[axis] - min[axis]) * 0.5;
            let pad = (half * PADDING_FRACTION).max(1e-10);
            min[axis] = self.center[axis] - half - pad;
            max[axis] = self.center[axis] + half + pad;
        }
        Self::new(min, max)
    }

    pub fn center(&self) -> MVec {
        self.center
    }

    pub fn side_lengths(&self) -> MVec {
        self.max - self.min
    }

    pub fn max_side_length(&self) -> Float {
        let side_lengths = self.side_lengths();
        let mut max = side_lengths[0];
        for axis in 1..NUM_DIMENSIONS {
            max = max.max(side_lengths[axis]);
        }
        max
    }

    pub fn from_positions<'a>(positions: impl Iterator<Item = &'a MVec>) -> Option<Self> {
        let mut min: Option<MVec> = None;
        let mut max: Option<MVec> = None;
        for pos in positions {
            min = Some(min.map_or(*pos, |min| min.min(*pos)));
            max = Some(max.map_or(*pos, |max| max.max(*pos)));
        }
        Some(Self::new(min?, max?))
    }

    pub fn contains(&self, pos: &MVec) -> bool {
        (0..NUM_DIMENSIONS).all(|axis| self.min[axis] <= pos[axis] && pos[axis] <= self.max[axis])
    }

    /// The index of the child extent that contains `pos`: bit k of
    /// the index is set iff pos is in the upper half along axis k.
    pub fn get_quadrant_index(&self, pos: &MVec) -> usize {
        debug_assert!(self.contains(pos));
        let mut index = 0;
        for axis in 0..NUM_DIMENSIONS {
            if pos[axis] >= self.center[axis] {
                index |= 1 << axis;
            }
        }
        index
    }

    pub fn get_quadrants(&self) -> [Self; TWO_TO_NUM_DIMENSIONS] {
        std::array::from_fn(|index| {
            let mut min = self.min;
            let mut max = self.max;
            for axis in 0..NUM_DIMENSIONS {
                if index & (1 << axis) == 0 {
                    max[axis] = self.center[axis];
                } else {
                    min[axis] = self.center[axis];
                }
            }
            Self::new(min, max)
        })
    }
}

impl std::fmt::Debug for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Extent({:.3?} {:.3?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::Extent;
    use crate::config::NUM_DIMENSIONS;
    use crate::config::TWO_TO_NUM_DIMENSIONS;
    use crate::dimension::MVec;
    use crate::test_utils::assert_vec_is_close;
    use crate::test_utils::vec_from;

    #[test]
    fn extent_quadrants_partition_the_extent() {
        let root = Extent::new(vec_from(-1.0), vec_from(1.0));
        let quadrants = root.get_quadrants();
        assert_eq!(quadrants.len(), TWO_TO_NUM_DIMENSIONS);
        for (index, quadrant) in quadrants.iter().enumerate() {
            assert_eq!(root.get_quadrant_index(&quadrant.center()), index);
            for axis in 0..NUM_DIMENSIONS {
                assert_eq!(
                    quadrant.side_lengths()[axis],
                    root.side_lengths()[axis] * 0.5
                );
            }
        }
    }

    #[test]
    fn extent_from_positions() {
        let positions = [vec_from(1.0), vec_from(-1.0), vec_from(0.5)];
        let extent = Extent::from_positions(positions.iter()).unwrap();
        assert_vec_is_close(extent.min, vec_from(-1.0));
        assert_vec_is_close(extent.max, vec_from(1.0));
    }

    #[test]
    fn extent_from_positions_is_none_with_zero_positions() {
        assert!(Extent::from_positions([].iter()).is_none());
    }

    #[test]
    fn pad_keeps_center_and_widens_degenerate_axes() {
        let extent = Extent::new(vec_from(1.0), vec_from(1.0)).pad();
        assert_vec_is_close(extent.center(), vec_from(1.0));
        for axis in 0..NUM_DIMENSIONS {
            assert!(extent.side_lengths()[axis] > 0.0);
        }
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn invalid_extent() {
        Extent::new(vec_from(1.0), vec_from(-1.0));
    }

    #[test]
    fn quadrant_index_of_contained_position() {
        let root = Extent::new(vec_from(0.0), vec_from(1.0));
        let mut pos = MVec::ZERO;
        for axis in 0..NUM_DIMENSIONS {
            pos[axis] = 0.75;
        }
        assert_eq!(root.get_quadrant_index(&pos), TWO_TO_NUM_DIMENSIONS - 1);
    }
}
