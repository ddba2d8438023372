use glam::{Mat4, Vec3, Vec4};

/// Plane in Hessian normal form: points `p` with `normal.dot(p) + d == 0`.
/// The positive side is the one `normal` points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Plane through `point`; `normal` is normalised.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    fn from_vec4(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: v.w / len,
            }
        } else {
            Self { normal, d: v.w }
        }
    }

    /// Positive on the side the normal points to.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// Crossing point of the segment `start..=end` with the plane.
    pub fn intersect_segment(&self, start: Vec3, end: Vec3) -> Option<Vec3> {
        let d0 = self.signed_distance(start);
        let d1 = self.signed_distance(end);
        if (d0 > 0.0 && d1 > 0.0) || (d0 < 0.0 && d1 < 0.0) {
            return None;
        }
        let denom = d0 - d1;
        if denom == 0.0 {
            // segment lies in the plane
            return Some(start);
        }
        Some(start + (end - start) * (d0 / denom))
    }
}

/// Six clip planes with normals pointing inwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of a right-handed view-projection matrix with a
    /// `[0, 1]` depth range (the glam `*_rh` projections).
    pub fn from_view_projection(m: Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        Self {
            planes: [
                Plane::from_vec4(r3 + r0),
                Plane::from_vec4(r3 - r0),
                Plane::from_vec4(r3 + r1),
                Plane::from_vec4(r3 - r1),
                Plane::from_vec4(r2),
                Plane::from_vec4(r3 - r2),
            ],
        }
    }

    /// Inside or on every plane.
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(p) >= 0.0)
    }

    /// Conservative box test: false only when the box is fully outside one
    /// of the planes.
    pub fn intersects_box(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|pl| {
            let n = pl.normal;
            let positive = Vec3::new(
                if n.x >= 0.0 { max.x } else { min.x },
                if n.y >= 0.0 { max.y } else { min.y },
                if n.z >= 0.0 { max.z } else { min.z },
            );
            pl.signed_distance(positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let proj = Mat4::perspective_rh(90f32.to_radians(), 1.0, 1.0, 100.0);
        Frustum::from_view_projection(proj)
    }

    #[test]
    fn points_inside_and_outside() {
        let f = looking_down_negative_z();
        assert!(f.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -0.5)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -101.0)));
        assert!(!f.contains_point(Vec3::new(20.0, 0.0, -10.0)));
    }

    #[test]
    fn box_test_is_conservative() {
        let f = looking_down_negative_z();
        // straddles the left plane
        assert!(f.intersects_box(Vec3::new(-12.0, -1.0, -11.0), Vec3::new(-9.0, 1.0, -9.0)));
        // fully behind the camera
        assert!(!f.intersects_box(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 2.0)));
        // fully right of the right plane
        assert!(!f.intersects_box(Vec3::new(30.0, -1.0, -11.0), Vec3::new(31.0, 1.0, -9.0)));
    }

    #[test]
    fn segment_plane_intersection() {
        let ground = Plane::from_point_normal(Vec3::ZERO, Vec3::Y);
        let hit = ground
            .intersect_segment(Vec3::new(0.0, 10.0, 0.0), Vec3::new(10.0, -10.0, 0.0))
            .unwrap();
        assert!((hit - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);

        // both ends above the plane
        assert!(
            ground
                .intersect_segment(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
                .is_none()
        );
    }
}
