/// Transformation matrices, rotation state and the user's manual adjustment
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::pose::Size;

/// Rotation around three axes, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotationState {
    /// Around X (nodding)
    pub pitch: f32,
    /// Around Y (turning)
    pub yaw: f32,
    /// Around Z (tilting), the only angle used for flat images
    pub roll: f32,
}

impl RotationState {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Rotate by delta amounts (in degrees)
    pub fn rotate(&mut self, dpitch: f32, dyaw: f32, droll: f32) {
        self.pitch += dpitch;
        self.yaw += dyaw;
        self.roll += droll;
    }

    /// Sum of two rotations, angle by angle
    pub fn combined(&self, other: &RotationState) -> RotationState {
        RotationState::new(
            self.pitch + other.pitch,
            self.yaw + other.yaw,
            self.roll + other.roll,
        )
    }
}

/// Transform builder for placement matrices
pub struct Transform;

impl Transform {
    /// Create a rotation matrix from a rotation state
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.pitch.to_radians(), 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.yaw.to_radians(), 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.roll.to_radians()));

        // Apply rotations in order: X, Y, Z
        rz * ry * rx
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Orthographic projection from view pixels (origin top-left, y down) to clip space
    pub fn screen_projection(view: &Size, depth: f32) -> Matrix4<f32> {
        let width = if view.width > 0.0 { view.width } else { 1.0 };
        let height = if view.height > 0.0 { view.height } else { 1.0 };
        Matrix4::new_orthographic(0.0, width, height, 0.0, -depth, depth)
    }
}

/// Bounds for the gesture-driven scale override
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureLimits {
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for GestureLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 5.0,
        }
    }
}

/// One decoded gesture step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureDelta {
    /// Multiplicative pinch factor, 1.0 means unchanged
    pub scale_delta: f32,
    /// Degrees added around X
    pub rotation_dx: f32,
    /// Degrees added around Y
    pub rotation_dy: f32,
}

impl GestureDelta {
    pub fn scale(factor: f32) -> Self {
        Self {
            scale_delta: factor,
            rotation_dx: 0.0,
            rotation_dy: 0.0,
        }
    }

    pub fn rotate(dx: f32, dy: f32) -> Self {
        Self {
            scale_delta: 1.0,
            rotation_dx: dx,
            rotation_dy: dy,
        }
    }
}

/// Session-scoped override layered on top of automatic tracking.
///
/// Scale multiplies the tracked scale, rotation adds to the head angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub scale: f32,
    pub rotation: RotationState,
}

impl Default for ManualAdjustment {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: RotationState::zero(),
        }
    }
}

impl ManualAdjustment {
    pub fn new(scale: f32, rotation: RotationState) -> Self {
        Self { scale, rotation }
    }

    /// Fold a gesture step in, keeping the scale inside `limits`
    pub fn apply(&mut self, delta: &GestureDelta, limits: &GestureLimits) {
        if delta.scale_delta.is_finite() && delta.scale_delta > 0.0 {
            self.scale *= delta.scale_delta;
        }
        self.scale = self.scale.clamp(limits.min_scale, limits.max_scale);
        self.rotation.rotate(delta.rotation_dx, delta.rotation_dy, 0.0);
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}
