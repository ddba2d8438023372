use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::frustum::Frustum;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// Far clip distance.
    pub fn far(&self) -> f32 {
        match *self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }

    /// Right-handed projection matrix, depth in `0..1`.
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Scene camera. Looks down its local -Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 15.0),
            rotation: Quat::IDENTITY,
            projection: Projection::default(),
        }
        .looking_at(Vec3::ZERO)
    }
}

impl Camera {
    /// Camera at `position` looking down -Z.
    pub fn new(position: Vec3, projection: Projection) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            projection,
        }
    }

    /// Orient towards `target`, keeping +Y up unless looking straight along it.
    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.look_at(target);
        self
    }

    /// Rotate in place to face `target`, keeping +Y up.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = (target - self.position).normalize_or_zero();
        if dir == Vec3::ZERO {
            return;
        }
        let up = if dir.dot(Vec3::Y).abs() > 0.999 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation.normalize();
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn far(&self) -> f32 {
        self.projection.far()
    }

    /// Camera to world.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// World to camera.
    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Projection times view, for the shader and the frustum.
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Six clip planes of the current view.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = Camera::default();
        assert!(cam.position.y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
        assert!(cam.frustum().contains_point(Vec3::ZERO));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let cam = Camera::new(Vec3::new(3.0, 4.0, 5.0), Projection::default())
            .looking_at(Vec3::new(3.0, 0.0, 0.0));
        let expected = (Vec3::new(3.0, 0.0, 0.0) - cam.position).normalize();
        assert!((cam.forward() - expected).length() < 1e-4);
    }

    #[test]
    fn looking_straight_down_is_well_defined() {
        let cam = Camera::new(Vec3::new(0.0, 10.0, 0.0), Projection::default())
            .looking_at(Vec3::ZERO);
        assert!((cam.forward() - Vec3::NEG_Y).length() < 1e-4);
        assert!(cam.frustum().contains_point(Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn orthographic_far() {
        let p = Projection::Orthographic {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
            near: 0.0,
            far: 50.0,
        };
        assert_eq!(p.far(), 50.0);
        assert!(!p.matrix().col(0).x.is_nan());
    }
}
