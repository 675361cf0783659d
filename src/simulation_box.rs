use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::extent::Extent;

/// The box size of the simulation. Along axes flagged periodic,
/// positions outside of the box are wrapped back into it and pair
/// displacements use the minimum image; open axes behave as identity.
#[derive(Clone, Debug)]
pub struct SimulationBox {
    pub extent: Extent,
    pub periodic: [bool; NUM_DIMENSIONS],
}

fn periodic_wrap_component(v: Float, min: Float, max: Float) -> Float {
    (v - min).rem_euclid(max - min) + min
}

fn minimize_component(v: Float, length: Float) -> Float {
    if v < 0.0 {
        if v.abs() < (v + length).abs() {
            v
        } else {
            v + length
        }
    } else if v.abs() < (v - length).abs() {
        v
    } else {
        v - length
    }
}

impl SimulationBox {
    pub fn new(extent: Extent, periodic: [bool; NUM_DIMENSIONS]) -> Self {
        Self { extent, periodic }
    }

    pub fn open(extent: Extent) -> Self {
        Self {
            extent,
            periodic: [false; NUM_DIMENSIONS],
        }
    }

    pub fn cube_from_side_length(side_length: Float) -> Self {
        Self {
            extent: Extent::cube_from_side_length(side_length),
            periodic: [true; NUM_DIMENSIONS],
        }
    }

    pub fn side_lengths(&self) -> MVec {
        self.extent.side_lengths()
    }

    pub fn is_fully_open(&self) -> bool {
        self.periodic.iter().all(|periodic| !periodic)
    }

    pub fn periodic_wrap(&self, mut pos: MVec) -> MVec {
        for axis in 0..NUM_DIMENSIONS {
            if self.periodic[axis] {
                pos[axis] = periodic_wrap_component(
                    pos[axis],
                    self.extent.min[axis],
                    self.extent.max[axis],
                );
            }
        }
        pos
    }

    /// The minimum-image displacement p1 - p2. Every periodic
    /// component of the result lies in (-L/2, L/2]; the operation is
    /// exactly antisymmetric in its arguments.
    pub fn periodic_distance_vec(&self, p1: &MVec, p2: &MVec) -> MVec {
        let mut dist = *p1 - *p2;
        let side_lengths = self.side_lengths();
        for axis in 0..NUM_DIMENSIONS {
            if self.periodic[axis] {
                dist[axis] = minimize_component(dist[axis], side_lengths[axis]);
            }
        }
        dist
    }

    pub fn periodic_distance(&self, p1: &MVec, p2: &MVec) -> Float {
        self.periodic_distance_vec(p1, p2).length()
    }
}

#[cfg(test)]
#[cfg(not(any(feature = "1d", feature = "2d")))]
mod tests {
    use crate::extent::Extent;
    use crate::simulation_box::SimulationBox;
    use crate::test_utils::assert_float_is_close;
    use crate::test_utils::assert_vec_is_close;
    use crate::test_utils::get_lattice_positions;
    use glam::DVec3;

    fn periodic_box(min: (f64, f64, f64), max: (f64, f64, f64)) -> SimulationBox {
        SimulationBox::new(
            Extent::new(
                DVec3::new(min.0, min.1, min.2),
                DVec3::new(max.0, max.1, max.2),
            ),
            [true; 3],
        )
    }

    #[test]
    fn periodic_wrap() {
        let check_wrap = |box_: &SimulationBox, (x, y, z), (x_wrapped, y_wrapped, z_wrapped)| {
            let v = box_.periodic_wrap(DVec3::new(x, y, z));
            assert_vec_is_close(v, DVec3::new(x_wrapped, y_wrapped, z_wrapped));
        };
        let box_ = periodic_box((0.0, 0.0, 0.0), (1.0, 2.0, 3.0));
        check_wrap(&box_, (0.5, 0.5, 0.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (1.5, 0.5, 0.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (0.5, 2.5, 0.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (0.5, 0.5, 3.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (1.5, 2.5, 3.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (-0.5, -0.5, -0.5), (0.5, 1.5, 2.5));
        let box_ = periodic_box((-1.0, -1.0, -1.0), (1.0, 2.0, 3.0));
        check_wrap(&box_, (0.5, 0.5, 0.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (-0.5, -0.5, -0.5), (-0.5, -0.5, -0.5));
        check_wrap(&box_, (-1.5, 0.5, 0.5), (0.5, 0.5, 0.5));
        check_wrap(&box_, (-1.5, -0.5, -0.5), (0.5, -0.5, -0.5));
    }

    #[test]
    fn open_axes_are_not_wrapped() {
        let mut box_ = periodic_box((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        box_.periodic[2] = false;
        let v = box_.periodic_wrap(DVec3::new(1.5, 0.5, 1.5));
        assert_vec_is_close(v, DVec3::new(0.5, 0.5, 1.5));
        let dist = box_.periodic_distance_vec(&DVec3::new(0.9, 0.9, 0.9), &DVec3::ZERO);
        assert_vec_is_close(dist, DVec3::new(-0.1, -0.1, 0.9));
    }

    #[test]
    fn periodic_distance() {
        let check_dist = |box_: &SimulationBox, (x1, y1, z1), (x2, y2, z2), distance| {
            let v1 = DVec3::new(x1, y1, z1);
            let v2 = DVec3::new(x2, y2, z2);
            assert_float_is_close(box_.periodic_distance(&v1, &v2), distance);
        };
        let box_ = periodic_box((0.0, 0.0, 0.0), (1.0, 2.0, 3.0));
        check_dist(&box_, (0.0, 0.0, 0.0), (0.0, 0.0, 0.0), 0.0);
        check_dist(&box_, (0.1, 0.0, 0.0), (0.1, 0.0, 0.0), 0.0);
        check_dist(&box_, (-0.1, 0.0, 0.0), (0.1, 0.0, 0.0), 0.2);
        check_dist(&box_, (0.0, -0.1, 0.0), (0.0, 0.1, 0.0), 0.2);
        check_dist(&box_, (0.0, 0.0, -0.1), (0.0, 0.0, 0.1), 0.2);
        check_dist(&box_, (0.0, 0.0, 0.0), (0.5, 0.0, 0.0), 0.5);
        check_dist(&box_, (0.2, 0.0, 0.0), (0.7, 0.0, 0.0), 0.5);
        let box_ = periodic_box((-1.0, -1.0, -1.0), (1.0, 2.0, 3.0));
        check_dist(&box_, (-1.1, 0.0, 0.0), (-0.9, 0.0, 0.0), 0.2);
        check_dist(&box_, (0.0, -1.1, 0.0), (0.0, -0.9, 0.0), 0.2);
        check_dist(&box_, (0.0, 0.0, -1.1), (0.0, 0.0, -0.9), 0.2);
        check_dist(&box_, (1.1, 0.0, 0.0), (0.9, 0.0, 0.0), 0.2);
        check_dist(&box_, (0.0, 2.1, 0.0), (0.0, 1.9, 0.0), 0.2);
        check_dist(&box_, (0.0, 0.0, 3.1), (0.0, 0.0, 2.9), 0.2);
    }

    #[test]
    fn periodic_distance_is_antisymmetric() {
        let positions = get_lattice_positions(5, 5);
        let box_ = periodic_box((-1.0, -1.0, -1.0), (1.0, 2.0, 3.0));
        for p1 in positions.iter() {
            for p2 in positions.iter() {
                let d1 = box_.periodic_distance_vec(p1, p2);
                let d2 = box_.periodic_distance_vec(p2, p1);
                assert_vec_is_close(d1, -d2);
            }
        }
    }

    #[test]
    fn minimum_image_components_are_bounded_by_half_box() {
        let box_ = periodic_box((0.0, 0.0, 0.0), (1.0, 2.0, 3.0));
        let positions: Vec<_> = get_lattice_positions(6, 6)
            .into_iter()
            .map(|pos| box_.periodic_wrap(pos))
            .collect();
        let side_lengths = box_.side_lengths();
        for p1 in positions.iter() {
            for p2 in positions.iter() {
                let dist = box_.periodic_distance_vec(p1, p2);
                for axis in 0..3 {
                    assert!(dist[axis].abs() <= side_lengths[axis] * 0.5 + f64::EPSILON);
                }
            }
        }
    }
}
