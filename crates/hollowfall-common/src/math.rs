//! Flat-plane math helpers for ground-based movement.
//!
//! Positions are [`Vec3`] with Y up. Steering and facing only care about
//! the XZ plane, so these helpers ignore the vertical component.

use glam::Vec3;

/// Distance between two points on the XZ plane.
#[must_use]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Normalized direction from `from` to `to` on the XZ plane.
///
/// Returns [`Vec3::ZERO`] when the points coincide.
#[must_use]
pub fn flat_direction(from: Vec3, to: Vec3) -> Vec3 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    let len = (dx * dx + dz * dz).sqrt();
    if len < 1e-4 {
        Vec3::ZERO
    } else {
        Vec3::new(dx / len, 0.0, dz / len)
    }
}

/// Distance from `point` to the segment `a`..`b` on the XZ plane.
///
/// Degenerates to point distance when the segment has no length.
#[must_use]
pub fn flat_segment_distance(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let seg = Vec3::new(b.x - a.x, 0.0, b.z - a.z);
    let rel = Vec3::new(point.x - a.x, 0.0, point.z - a.z);
    let len_sq = seg.length_squared();
    if len_sq < 1e-8 {
        return rel.length();
    }
    let t = (rel.dot(seg) / len_sq).clamp(0.0, 1.0);
    (rel - seg * t).length()
}

/// Yaw (radians) that faces `to` from `from` on the XZ plane.
#[must_use]
pub fn yaw_to(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    dx.atan2(dz)
}

/// Rotates `current` yaw towards `target` yaw by at most `max_delta`
/// radians, taking the shortest arc.
#[must_use]
pub fn rotate_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let mut diff = (target - current) % std::f32::consts::TAU;
    if diff > std::f32::consts::PI {
        diff -= std::f32::consts::TAU;
    } else if diff < -std::f32::consts::PI {
        diff += std::f32::consts::TAU;
    }
    current + diff.clamp(-max_delta, max_delta)
}

/// Wraps a yaw angle into `(-PI, PI]`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    } else if a <= -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    }
    a
}
