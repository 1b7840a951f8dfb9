use crate::camera::{CameraModel, CameraSet, Pose, PoseFrame};
use geo::Rect;
use log::warn;

/// A pose readied for one tile: frame, camera and conservative footprint.
#[derive(Debug, Clone)]
pub struct PreparedPose<'a> {
    /// Index into the run's pose list.
    pub index: u32,
    pub frame: PoseFrame,
    pub camera: &'a CameraModel,
    pub radius: f64,
    pub radius_sq: f64,
    pub gsd_factor: f64,
}

impl PreparedPose<'_> {
    #[inline]
    pub fn within_footprint(&self, x: f64, y: f64) -> bool {
        let dx = x - self.frame.position.x;
        let dy = y - self.frame.position.y;
        dx * dx + dy * dy <= self.radius_sq
    }
}

pub fn prepare_poses<'a>(
    poses: &[Pose],
    cameras: &'a CameraSet,
    ground_z: f64,
    margin: f64,
) -> Vec<PreparedPose<'a>> {
    poses
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            let camera = cameras.camera_for(i);
            let radius = pose.footprint_radius(camera, ground_z, margin);
            PreparedPose {
                index: i as u32,
                frame: pose.frame(),
                camera,
                radius,
                radius_sq: radius * radius,
                gsd_factor: camera.gsd_per_meter(),
            }
        })
        .collect()
}

/// Distance from `(x, y)` to the nearest point of `rect`, zero inside.
pub fn rect_distance(rect: &Rect<f64>, x: f64, y: f64) -> f64 {
    let dx = (rect.min().x - x).max(0.0).max(x - rect.max().x);
    let dy = (rect.min().y - y).max(0.0).max(y - rect.max().y);
    dx.hypot(dy)
}

/// Drops poses whose footprint circle cannot reach `rect`.
///
/// If nothing survives while poses were supplied, the unfiltered list is
/// returned instead of an empty one.
pub fn cull_by_footprint<'a>(prepared: Vec<PreparedPose<'a>>, rect: &Rect<f64>) -> Vec<PreparedPose<'a>> {
    let total = prepared.len();
    let kept: Vec<PreparedPose<'a>> = prepared
        .iter()
        .filter(|p| rect_distance(rect, p.frame.position.x, p.frame.position.y) <= p.radius)
        .cloned()
        .collect();

    if kept.is_empty() && total > 0 {
        warn!("Footprint culling rejected all {total} poses, falling back to the full pose set");
        return prepared;
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraAssignment, CameraModel};
    use geo::Coord;

    fn cameras() -> CameraSet {
        CameraSet::resolve(
            CameraAssignment::Single(CameraModel::new(0.035, 4.88e-6, 6000, 4000)),
            0,
        )
        .unwrap()
    }

    fn unit_rect() -> Rect<f64> {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 })
    }

    #[test]
    fn distance_to_rect() {
        let r = unit_rect();
        assert_eq!(rect_distance(&r, 50.0, 50.0), 0.0);
        assert_eq!(rect_distance(&r, 130.0, 50.0), 30.0);
        assert_eq!(rect_distance(&r, -30.0, 140.0), 50.0);
    }

    #[test]
    fn far_poses_are_culled() {
        let cams = cameras();
        let poses = vec![Pose::nadir(50.0, 50.0, 100.0), Pose::nadir(5000.0, 50.0, 100.0)];
        let prepared = prepare_poses(&poses, &cams, 0.0, 1.25);
        let kept = cull_by_footprint(prepared, &unit_rect());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn pose_just_outside_rect_survives_within_radius() {
        let cams = cameras();
        let poses = vec![Pose::nadir(150.0, 50.0, 100.0)];
        let prepared = prepare_poses(&poses, &cams, 0.0, 1.25);
        assert!(prepared[0].radius > 50.0);
        assert_eq!(cull_by_footprint(prepared, &unit_rect()).len(), 1);
    }

    #[test]
    fn fail_safe_keeps_everything() {
        let cams = cameras();
        let poses = vec![Pose::nadir(9000.0, 0.0, 100.0), Pose::nadir(0.0, 9000.0, 100.0)];
        let prepared = prepare_poses(&poses, &cams, 0.0, 1.25);
        assert_eq!(cull_by_footprint(prepared, &unit_rect()).len(), 2);
        assert!(cull_by_footprint(Vec::new(), &unit_rect()).is_empty());
    }
}
