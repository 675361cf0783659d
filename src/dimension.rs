pub type Float = f64;

#[cfg(feature = "1d")]
pub type MVec = MVec1;
#[cfg(feature = "2d")]
pub type MVec = glam::DVec2;
#[cfg(not(any(feature = "1d", feature = "2d")))]
pub type MVec = glam::DVec3;

/// The result type of [`cross`]: the z component in 2D, a full vector
/// in 3D. 1D flows carry no vorticity.
#[cfg(not(any(feature = "1d", feature = "2d")))]
pub type MCross = glam::DVec3;
#[cfg(any(feature = "1d", feature = "2d"))]
pub type MCross = Float;

/// Square matrix used by the linear-exact gradient renormalization.
#[cfg(feature = "1d")]
pub type MMat = Float;
#[cfg(feature = "2d")]
pub type MMat = glam::DMat2;
#[cfg(not(any(feature = "1d", feature = "2d")))]
pub type MMat = glam::DMat3;

#[cfg(feature = "1d")]
pub fn cross(_a: MVec, _b: MVec) -> MCross {
    0.0
}

#[cfg(feature = "2d")]
pub fn cross(a: MVec, b: MVec) -> MCross {
    a.x * b.y - a.y * b.x
}

#[cfg(not(any(feature = "1d", feature = "2d")))]
pub fn cross(a: MVec, b: MVec) -> MCross {
    a.cross(b)
}

#[cfg(not(any(feature = "1d", feature = "2d")))]
pub fn cross_norm(c: MCross) -> Float {
    c.length()
}

#[cfg(any(feature = "1d", feature = "2d"))]
pub fn cross_norm(c: MCross) -> Float {
    c.abs()
}

/// The outer product a ⊗ b, i.e. the matrix with entries a_i b_j.
#[cfg(feature = "1d")]
pub fn outer(a: MVec, b: MVec) -> MMat {
    a.x * b.x
}

#[cfg(feature = "2d")]
pub fn outer(a: MVec, b: MVec) -> MMat {
    glam::DMat2::from_cols(a * b.x, a * b.y)
}

#[cfg(not(any(feature = "1d", feature = "2d")))]
pub fn outer(a: MVec, b: MVec) -> MMat {
    glam::DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

#[cfg(feature = "1d")]
pub fn mat_zero() -> MMat {
    0.0
}

#[cfg(feature = "2d")]
pub fn mat_zero() -> MMat {
    glam::DMat2::ZERO
}

#[cfg(not(any(feature = "1d", feature = "2d")))]
pub fn mat_zero() -> MMat {
    glam::DMat3::ZERO
}

#[cfg(feature = "1d")]
pub fn mat_determinant(m: &MMat) -> Float {
    *m
}

#[cfg(not(feature = "1d"))]
pub fn mat_determinant(m: &MMat) -> Float {
    m.determinant()
}

/// Inverts the renormalization matrix and applies it to `v`. Returns
/// `None` for (numerically) singular matrices, in which case callers
/// fall back to the uncorrected gradient.
pub fn renormalize(m: &MMat, v: MVec) -> Option<MVec> {
    if mat_determinant(m).abs() < 1e-12 {
        return None;
    }
    #[cfg(feature = "1d")]
    {
        Some(MVec1::new(v.x / *m))
    }
    #[cfg(not(feature = "1d"))]
    {
        Some(m.inverse() * v)
    }
}

/// One-component vector mirroring the part of the glam API that the
/// engine uses, so that all call sites stay dimension-agnostic.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MVec1 {
    pub x: Float,
}

impl MVec1 {
    pub const ZERO: Self = Self { x: 0.0 };
    pub const ONE: Self = Self { x: 1.0 };

    pub const fn new(x: Float) -> Self {
        Self { x }
    }

    pub const fn splat(x: Float) -> Self {
        Self { x }
    }

    pub fn from_slice(slice: &[Float]) -> Self {
        Self { x: slice[0] }
    }

    pub fn dot(self, other: Self) -> Float {
        self.x * other.x
    }

    pub fn length(self) -> Float {
        self.x.abs()
    }

    pub fn length_squared(self) -> Float {
        self.x * self.x
    }

    pub fn abs(self) -> Self {
        Self { x: self.x.abs() }
    }

    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
        }
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite()
    }
}

impl std::ops::Add for MVec1 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x }
    }
}

impl std::ops::Sub for MVec1 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x }
    }
}

impl std::ops::Neg for MVec1 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x }
    }
}

impl std::ops::Mul<Float> for MVec1 {
    type Output = Self;
    fn mul(self, rhs: Float) -> Self {
        Self { x: self.x * rhs }
    }
}

impl std::ops::Mul<MVec1> for Float {
    type Output = MVec1;
    fn mul(self, rhs: MVec1) -> MVec1 {
        MVec1 { x: self * rhs.x }
    }
}

impl std::ops::Div<Float> for MVec1 {
    type Output = Self;
    fn div(self, rhs: Float) -> Self {
        Self { x: self.x / rhs }
    }
}

impl std::ops::AddAssign for MVec1 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
    }
}

impl std::ops::SubAssign for MVec1 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
    }
}

impl std::ops::MulAssign<Float> for MVec1 {
    fn mul_assign(&mut self, rhs: Float) {
        self.x *= rhs;
    }
}

impl std::ops::Index<usize> for MVec1 {
    type Output = Float;
    fn index(&self, index: usize) -> &Float {
        debug_assert_eq!(index, 0);
        &self.x
    }
}

impl std::ops::IndexMut<usize> for MVec1 {
    fn index_mut(&mut self, index: usize) -> &mut Float {
        debug_assert_eq!(index, 0);
        &mut self.x
    }
}

impl std::fmt::Display for MVec1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.x)
    }
}
