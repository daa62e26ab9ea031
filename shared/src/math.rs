//! 2D vector math used by the simulation and the wire format.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D position or direction in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Build a vector from an angle (radians) and a magnitude.
    pub fn from_polar(angle: f32, magnitude: f32) -> Self {
        Self {
            x: angle.cos() * magnitude,
            y: angle.sin() * magnitude,
        }
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance_to(&self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle of this vector in radians, in (-PI, PI].
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Rotate counterclockwise by `angle` radians.
    pub fn rotated(&self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2 {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2 {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Exponential ease toward a target value. `rate` is the fraction of the
/// remaining distance covered per call; used for the petal orbit radius.
pub fn ease_toward(current: f32, target: f32, rate: f32) -> f32 {
    current + (target - current) * rate.clamp(0.0, 1.0)
}

/// Normalize an angle into [-PI, PI). In-range angles pass through exactly.
pub fn wrap_angle(angle: f32) -> f32 {
    if (-PI..PI).contains(&angle) {
        return angle;
    }
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polar_roundtrip() {
        let v = Vec2::from_polar(PI / 4.0, 2.0);
        assert!((v.length() - 2.0).abs() < 0.001);
        assert!((v.angle() - PI / 4.0).abs() < 0.001);
    }

    #[test]
    fn test_rotated_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotated(PI / 2.0);
        assert!(v.x.abs() < 0.001);
        assert!((v.y - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_normalized_zero_vector() {
        let v = Vec2::ZERO.normalized();
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn test_ease_toward_converges() {
        let mut r = 0.0;
        for _ in 0..100 {
            r = ease_toward(r, 10.0, 0.2);
        }
        assert!((r - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(1.5 * PI) + 0.5 * PI).abs() < 0.001);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < 0.001);
        assert!((wrap_angle(0.25 * PI) - 0.25 * PI).abs() < 0.001);
        // Always lands in range, shifted by a whole number of turns.
        for angle in [0.0, 5.0 * PI, -7.3, 12.9, -3.0 * PI] {
            let wrapped = wrap_angle(angle);
            assert!(wrapped >= -PI - 0.001 && wrapped < PI + 0.001);
            let turns = (angle - wrapped) / (2.0 * PI);
            assert!((turns - turns.round()).abs() < 0.001);
        }
    }
}
