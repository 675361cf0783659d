use crate::dimension::Float;

/// One side of the 1D Riemann problem along the pair axis.
#[derive(Clone, Copy, Debug)]
pub struct RiemannState {
    pub dens: Float,
    /// Velocity projected on the interface normal.
    pub vel: Float,
    pub pres: Float,
    pub sound: Float,
}

/// Star state of the approximate solver: contact pressure and
/// velocity.
#[derive(Clone, Copy, Debug)]
pub struct StarState {
    pub pres: Float,
    pub vel: Float,
}

/// HLL solve: Roe-averaged wave speed estimates bracket the fan, the
/// star state is the contact average of the bracketed fluxes. The
/// solver is stateless and deterministic; a negative star pressure is
/// reported to the caller, which treats it as fatal.
pub fn solve_hll(left: RiemannState, right: RiemannState) -> Result<StarState, Float> {
    let sqrt_dens_l = left.dens.sqrt();
    let sqrt_dens_r = right.dens.sqrt();
    let weight = 1.0 / (sqrt_dens_l + sqrt_dens_r);
    let roe_vel = (sqrt_dens_l * left.vel + sqrt_dens_r * right.vel) * weight;
    let roe_sound = (sqrt_dens_l * left.sound + sqrt_dens_r * right.sound) * weight;

    let s_l = (left.vel - left.sound).min(roe_vel - roe_sound);
    let s_r = (right.vel + right.sound).max(roe_vel + roe_sound);

    let momentum_l = left.dens * (left.vel - s_l);
    let momentum_r = right.dens * (right.vel - s_r);
    let denominator = momentum_r - momentum_l;
    if denominator == 0.0 {
        // Degenerate (cold, symmetric) input; the contact is the
        // arithmetic mean.
        return Ok(StarState {
            pres: 0.5 * (left.pres + right.pres),
            vel: 0.5 * (left.vel + right.vel),
        });
    }
    let vel = (right.vel * momentum_r - left.vel * momentum_l + left.pres - right.pres)
        / denominator;
    let pres = left.pres + momentum_l * (left.vel - vel);
    if pres < 0.0 {
        return Err(pres);
    }
    Ok(StarState { pres, vel })
}
