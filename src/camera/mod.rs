pub mod model;
pub mod pose;

pub use model::{CameraAssignment, CameraModel, CameraSet};
pub use pose::{Pose, PoseFrame};
