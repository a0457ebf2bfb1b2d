use crate::error::RigError;
use crate::rig::EulerAngles;
use serde::{Deserialize, Serialize};

/// Tunables for a body rig. Every field has a default, so a partial JSON
/// object (or `{}`) is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Bend the spine toward overextended hands when no head target is present
    pub enable_torso: bool,
    /// Solve legs and let the hips follow the hip target height
    pub enable_legs: bool,
    /// Maximum spine bend in degrees; reaching it triggers crouching
    pub max_hip_angle: f32,
    /// Lower head limits relative to the hips (pitch, yaw, roll in degrees)
    pub head_min: EulerAngles,
    /// Upper head limits relative to the hips (pitch, yaw, roll in degrees)
    pub head_max: EulerAngles,
    /// Largest per-frame change of a digit's curl value
    pub grab_speed: f32,
    pub t_pose_tolerance: f32,
    pub leg_vertical_tolerance: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            enable_torso: true,
            enable_legs: true,
            max_hip_angle: 70.0,
            head_min: EulerAngles::new(-60.0, -90.0, -45.0),
            head_max: EulerAngles::new(70.0, 90.0, 45.0),
            grab_speed: 0.1,
            t_pose_tolerance: 0.1,
            leg_vertical_tolerance: 0.2,
        }
    }
}

impl BodyConfig {
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        Ok(serde_json::from_str(json)?)
    }
}
