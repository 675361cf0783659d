#[cfg(feature = "1d")]
pub const NUM_DIMENSIONS: usize = 1;
#[cfg(feature = "2d")]
pub const NUM_DIMENSIONS: usize = 2;
#[cfg(not(any(feature = "1d", feature = "2d")))]
pub const NUM_DIMENSIONS: usize = 3;

pub const TWO_TO_NUM_DIMENSIONS: usize = 2usize.pow(NUM_DIMENSIONS as u32);

/// Hard cap on the tree depth to prevent infinite subdivisions in
/// edge cases of many particles at very similar positions.
pub const MAX_DEPTH: usize = 32;
