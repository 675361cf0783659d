use crate::config::NUM_DIMENSIONS;
use crate::dimension::Float;
use crate::dimension::MVec;
use crate::parameters::Parameters;
use crate::particle::Particle;
use crate::simulation::Simulation;

pub fn assert_float_is_close(x: Float, y: Float) {
    assert!((x - y).abs() < 10.0 * f64::EPSILON, "{} {}", x, y)
}

pub fn assert_float_is_close_high_error(x: Float, y: Float) {
    assert!((x - y).abs() < 1e3 * f64::EPSILON, "{} {}", x, y)
}

pub fn assert_vec_is_close(x: MVec, y: MVec) {
    assert!((x - y).length() < 10.0 * f64::EPSILON, "{:?} {:?}", x, y)
}

/// A vector with all components set to `x`.
pub fn vec_from(x: Float) -> MVec {
    MVec::ONE * x
}

/// A neighbor target that is reachable on small test lattices.
pub fn test_neighbor_number() -> usize {
    match NUM_DIMENSIONS {
        1 => 4,
        2 => 12,
        _ => 32,
    }
}

/// Particles of equal mass on a regular n^D lattice covering the
/// unit box, normalized to unit density and unit specific energy.
pub fn unit_lattice_particles(n: usize) -> Vec<Particle> {
    let total = n.pow(NUM_DIMENSIONS as u32);
    let mass = 1.0 / total as Float;
    (0..total)
        .map(|index| {
            let mut rem = index;
            let mut pos = MVec::ZERO;
            for axis in 0..NUM_DIMENSIONS {
                pos[axis] = ((rem % n) as Float + 0.5) / n as Float;
                rem /= n;
            }
            let mut particle = Particle::gas(index as u64, pos, MVec::ZERO, mass, 1.0);
            particle.dens = 1.0;
            particle
        })
        .collect()
}

pub fn test_parameters() -> Parameters {
    let mut json = crate::parameters::tests::minimal_json();
    json["domain"]["rangeMin"] = serde_json::json!(vec![0.0; NUM_DIMENSIONS]);
    json["domain"]["rangeMax"] = serde_json::json!(vec![1.0; NUM_DIMENSIONS]);
    json["physics"]["neighbor_number"] = test_neighbor_number().into();
    let parameters: Parameters = serde_json::from_value(json).unwrap();
    parameters.validate().unwrap();
    parameters
}

pub fn build_lattice_simulation(n: usize) -> Simulation {
    Simulation::new(test_parameters(), unit_lattice_particles(n)).unwrap()
}

pub fn get_lattice_positions(n: i32, m: i32) -> Vec<MVec> {
    (1..n + 1)
        .flat_map(move |x| {
            (1..m + 1).map(move |y| {
                #[cfg(feature = "1d")]
                {
                    let _ = y;
                    MVec::new((x * m + y) as Float)
                }
                #[cfg(feature = "2d")]
                {
                    MVec::new(x as Float, y as Float)
                }
                #[cfg(not(any(feature = "1d", feature = "2d")))]
                {
                    MVec::new(x as Float, y as Float, (x * y) as Float)
                }
            })
        })
        .collect()
}
