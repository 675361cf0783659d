use std::iter::Sum;
use std::ops::AddAssign;

use crate::dimension::Float;
use crate::dimension::MVec;

#[derive(Clone, Default)]
pub struct MassMoments {
    total: Float,
    weighted_position_sum: MVec,
    count: usize,
}

impl MassMoments {
    pub fn total(&self) -> Float {
        self.total
    }

    pub fn center_of_mass(&self) -> MVec {
        if self.count == 0 {
            return MVec::ZERO;
        }
        self.weighted_position_sum / self.total
    }

    pub fn add_mass_at(&mut self, pos: &MVec, mass: Float) {
        self.count += 1;
        self.total += mass;
        self.weighted_position_sum += *pos * mass;
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Sum<(Float, MVec)> for MassMoments {
    fn sum<I: Iterator<Item = (Float, MVec)>>(iter: I) -> Self {
        let mut moments = Self::default();
        for (mass, pos) in iter {
            moments.add_mass_at(&pos, mass);
        }
        moments
    }
}

impl AddAssign<&MassMoments> for MassMoments {
    fn add_assign(&mut self, rhs: &MassMoments) {
        self.count += rhs.count;
        self.total += rhs.total;
        self.weighted_position_sum += rhs.weighted_position_sum;
    }
}

impl std::fmt::Debug for MassMoments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Moments({:.3?} @ {:.3?})",
            self.total(),
            self.center_of_mass()
        )
    }
}
