use thiserror::Error;

use crate::dimension::Float;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no module registered for variant {variant} in role {role}")]
    UnknownModule { variant: String, role: String },
    #[error(
        "neighbor list overflow for particle {particle} \
         ({found} neighbors, capacity {capacity}) at step {step}"
    )]
    NeighborOverflow {
        particle: u64,
        found: usize,
        capacity: usize,
        step: u64,
    },
    #[error("non-finite {quantity} on particle {particle} at step {step}, t = {time:.6e}")]
    NonFinite {
        quantity: &'static str,
        particle: u64,
        step: u64,
        time: Float,
    },
    #[error(
        "negative star pressure {pres:.6e} in Riemann solve between \
         particles {left} and {right} at step {step}"
    )]
    NegativeStarPressure {
        pres: Float,
        left: u64,
        right: u64,
        step: u64,
    },
    #[error("negative pressure {pres:.6e} on particle {particle} at step {step}")]
    NegativePressure {
        pres: Float,
        particle: u64,
        step: u64,
    },
    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
