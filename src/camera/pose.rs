use crate::camera::model::CameraModel;
use geo::Coord;
use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Sum of half field of view and tilt beyond which a footprint is unbounded.
const HORIZON_ANGLE: f64 = 89.9 * PI / 180.0;
const RAY_Z_EPSILON: f64 = 1e-9;

/// One captured image. Position in projected metres, angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub omega: f64,
    pub phi: f64,
    pub kappa: f64,
    #[serde(default)]
    pub polygon_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Pose {
    pub fn nadir(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }

    pub fn new(x: f64, y: f64, z: f64, omega: f64, phi: f64, kappa: f64) -> Self {
        Self {
            x,
            y,
            z,
            omega,
            phi,
            kappa,
            polygon_id: None,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_polygon(mut self, polygon_id: impl Into<String>) -> Self {
        self.polygon_id = Some(polygon_id.into());
        self
    }

    #[inline]
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Camera-to-world rotation `Rz(kappa) * Ry(phi) * Rx(omega)`.
    pub fn rotation(&self) -> Matrix3<f64> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), self.omega);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), self.phi);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), self.kappa);
        (rz * ry * rx).into_inner()
    }

    pub fn frame(&self) -> PoseFrame {
        let rotation = self.rotation();
        PoseFrame {
            position: self.position(),
            rotation,
            rotation_t: rotation.transpose(),
        }
    }

    /// Conservative radius of the ground circle this pose could image.
    ///
    /// Height is taken above `ground_z` (floored at 1 m). Returns infinity when
    /// the tilted field of view reaches the horizon.
    pub fn footprint_radius(&self, camera: &CameraModel, ground_z: f64, margin: f64) -> f64 {
        let angle = camera.footprint_half_angle() + self.frame().tilt();
        if angle >= HORIZON_ANGLE {
            return f64::INFINITY;
        }
        let height = (self.z - ground_z).max(1.0);
        height * angle.tan() * margin
    }

    /// Sensor corners projected onto the plane `z = ground_z`, clockwise from
    /// the top-left pixel. A corner whose ray misses the plane is `None`.
    pub fn ground_footprint(&self, camera: &CameraModel, ground_z: f64) -> [Option<Coord<f64>>; 4] {
        let frame = self.frame();
        let (w, h) = (camera.width_px as f64, camera.height_px as f64);
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
            .map(|(u, v)| frame.intersect_plane(camera.ray_direction(u, v), ground_z))
    }
}

/// Pose with its rotation precomputed for repeated projection.
#[derive(Debug, Clone, Copy)]
pub struct PoseFrame {
    pub position: Vector3<f64>,
    pub rotation: Matrix3<f64>,
    pub rotation_t: Matrix3<f64>,
}

impl PoseFrame {
    #[inline]
    pub fn to_camera(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_t * (point - self.position)
    }

    #[inline]
    pub fn project(&self, camera: &CameraModel, point: &Vector3<f64>) -> Option<[f64; 2]> {
        camera.project(&self.to_camera(point))
    }

    /// Angle between the optical axis and straight down.
    pub fn tilt(&self) -> f64 {
        self.rotation[(2, 2)].clamp(-1.0, 1.0).acos()
    }

    fn intersect_plane(&self, ray_cam: Vector3<f64>, ground_z: f64) -> Option<Coord<f64>> {
        let dir = self.rotation * ray_cam;
        if dir.z > -RAY_Z_EPSILON {
            return None;
        }
        let t = (ground_z - self.position.z) / dir.z;
        if t <= 0.0 {
            return None;
        }
        let hit = self.position + dir * t;
        Some(Coord { x: hit.x, y: hit.y })
    }
}
