pub mod checkpoint;
pub mod input;
pub mod output;

/// Axis suffixes of vector columns in snapshot files.
pub const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];
