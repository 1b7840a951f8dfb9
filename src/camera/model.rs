use anyhow::{Result, anyhow, ensure};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

const CAMERA_Z_EPSILON: f64 = 1e-9;

/// Pinhole camera. Focal length and pixel pitch in metres, sensor in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub focal_length: f64,
    pub pixel_pitch_x: f64,
    pub pixel_pitch_y: f64,
    pub width_px: u32,
    pub height_px: u32,
    #[serde(default)]
    pub principal_point: Option<[f64; 2]>,
}

impl CameraModel {
    pub fn new(focal_length: f64, pixel_pitch: f64, width_px: u32, height_px: u32) -> Self {
        Self {
            focal_length,
            pixel_pitch_x: pixel_pitch,
            pixel_pitch_y: pixel_pitch,
            width_px,
            height_px,
            principal_point: None,
        }
    }

    pub fn with_principal_point(mut self, cx: f64, cy: f64) -> Self {
        self.principal_point = Some([cx, cy]);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.focal_length.is_finite() && self.focal_length > 0.0,
            "Focal length must be positive, got {}",
            self.focal_length
        );
        ensure!(
            self.pixel_pitch_x > 0.0 && self.pixel_pitch_y > 0.0,
            "Pixel pitch must be positive, got {}x{}",
            self.pixel_pitch_x,
            self.pixel_pitch_y
        );
        ensure!(
            self.width_px > 0 && self.height_px > 0,
            "Sensor must have pixels, got {}x{}",
            self.width_px,
            self.height_px
        );
        Ok(())
    }

    pub fn principal_point(&self) -> (f64, f64) {
        match self.principal_point {
            Some([cx, cy]) => (cx, cy),
            None => (self.width_px as f64 / 2.0, self.height_px as f64 / 2.0),
        }
    }

    pub fn sensor_size(&self) -> (f64, f64) {
        (
            self.width_px as f64 * self.pixel_pitch_x,
            self.height_px as f64 * self.pixel_pitch_y,
        )
    }

    /// Half of the diagonal field of view, radians.
    pub fn footprint_half_angle(&self) -> f64 {
        let (w, h) = self.sensor_size();
        (0.5 * w.hypot(h) / self.focal_length).atan()
    }

    /// Ground metres per image pixel for each metre of range, worst axis.
    pub fn gsd_per_meter(&self) -> f64 {
        self.pixel_pitch_x.max(self.pixel_pitch_y) / self.focal_length
    }

    /// Camera-space point (camera looks down -Z) to sensor pixel coordinates.
    pub fn project(&self, cam: &Vector3<f64>) -> Option<[f64; 2]> {
        if cam.z >= -CAMERA_Z_EPSILON {
            return None;
        }

        let (cx, cy) = self.principal_point();
        let depth = -cam.z;
        let u = cx + self.focal_length * (cam.x / depth) / self.pixel_pitch_x;
        let v = cy + self.focal_length * (cam.y / depth) / self.pixel_pitch_y;

        let inside = u >= 0.0
            && u < self.width_px as f64
            && v >= 0.0
            && v < self.height_px as f64;

        inside.then_some([u, v])
    }

    /// Camera-space direction (z = -1) through sensor pixel `(u, v)`.
    pub fn ray_direction(&self, u: f64, v: f64) -> Vector3<f64> {
        let (cx, cy) = self.principal_point();
        Vector3::new(
            (u - cx) * self.pixel_pitch_x / self.focal_length,
            (v - cy) * self.pixel_pitch_y / self.focal_length,
            -1.0,
        )
    }
}

/// Which camera took which pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraAssignment {
    Single(CameraModel),
    PerPose {
        cameras: Vec<CameraModel>,
        indices: Vec<u16>,
    },
}

/// Per-pose camera lookup resolved once per run.
#[derive(Debug, Clone)]
pub struct CameraSet {
    cameras: Vec<CameraModel>,
    indices: Option<Vec<u16>>,
}

impl CameraSet {
    pub fn resolve(assignment: CameraAssignment, pose_count: usize) -> Result<Self> {
        match assignment {
            CameraAssignment::Single(camera) => {
                camera.validate()?;
                Ok(Self {
                    cameras: vec![camera],
                    indices: None,
                })
            }
            CameraAssignment::PerPose { cameras, indices } => {
                ensure!(!cameras.is_empty(), "Multi-camera run without cameras");
                ensure!(
                    indices.len() == pose_count,
                    "Camera index list has {} entries for {} poses",
                    indices.len(),
                    pose_count
                );
                for (i, camera) in cameras.iter().enumerate() {
                    camera
                        .validate()
                        .map_err(|e| anyhow!("Camera {i} is invalid: {e}"))?;
                }
                if let Some((pose, &idx)) = indices
                    .iter()
                    .enumerate()
                    .find(|&(_, &idx)| idx as usize >= cameras.len())
                {
                    return Err(anyhow!(
                        "Pose {pose} references camera {idx}, only {} defined",
                        cameras.len()
                    ));
                }
                Ok(Self {
                    cameras,
                    indices: Some(indices),
                })
            }
        }
    }

    #[inline]
    pub fn camera_for(&self, pose_index: usize) -> &CameraModel {
        match &self.indices {
            Some(indices) => &self.cameras[indices[pose_index] as usize],
            None => &self.cameras[0],
        }
    }

    pub fn cameras(&self) -> &[CameraModel] {
        &self.cameras
    }
}
