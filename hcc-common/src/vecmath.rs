use serde::{Serialize, Deserialize};

/// Basic 2D vector in lattice coordinates.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn zero() -> Self { Self::new(0.0, 0.0) }
    #[inline(always)]
    pub fn length_squared(self) -> f64 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f64 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x; let dy = self.y - other.y; dx * dx + dy * dy
    }
    #[inline(always)]
    pub fn distance(self, other: Self) -> f64 { self.distance_squared(other).sqrt() }
    #[inline(always)]
    pub fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y) }
    #[inline(always)]
    pub fn sub(self, other: Self) -> Self { Self::new(self.x - other.x, self.y - other.y) }
    #[inline(always)]
    pub fn scale(self, scalar: f64) -> Self { Self::new(self.x * scalar, self.y * scalar) }

    #[inline(always)]
    pub fn is_finite(self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

/// Unit vector at angle `theta` (radians, counter-clockwise from +x).
#[inline(always)]
pub fn angle_to_vec(theta: f64) -> Vec2 { Vec2::new(theta.cos(), theta.sin()) }

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hex_directions_are_unit_length_and_sixty_degrees_apart() {
        let step = std::f64::consts::PI / 3.0;
        for k in 0..6 {
            let a = angle_to_vec(step * k as f64);
            let b = angle_to_vec(step * (k + 1) as f64);
            assert_relative_eq!(a.length(), 1.0, epsilon = 1e-12);
            // Adjacent hex directions are themselves one unit apart.
            assert_relative_eq!(a.distance(b), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn distance_matches_components() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 6.0);
        assert_relative_eq!(a.distance_squared(b), 25.0);
        assert_relative_eq!(a.distance(b), 5.0);
        assert_eq!(a.add(b).sub(b), a);
        assert_eq!(a.scale(2.0), Vec2::new(2.0, 4.0));
    }
}
