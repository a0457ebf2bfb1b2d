use crate::math::QuatAxes;
use crate::rig::{Digit, Side};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// World pose of a tracked target for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPose {
    pub position: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl TargetPose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation.forward()
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation.up()
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation.right()
    }

    /// Targets with NaN or infinite components are treated as absent
    pub fn is_valid(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

/// Everything the tracking layer supplies for one frame.
///
/// Only the hip target is mandatory. Finger inputs are ordered thumb first
/// and expected in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    #[serde(default)]
    pub head: Option<TargetPose>,
    #[serde(default)]
    pub left_hand: Option<TargetPose>,
    #[serde(default)]
    pub right_hand: Option<TargetPose>,
    pub hips: TargetPose,
    #[serde(default)]
    pub left_foot: Option<TargetPose>,
    #[serde(default)]
    pub right_foot: Option<TargetPose>,
    #[serde(default)]
    pub fingers_left: [f32; Digit::COUNT],
    #[serde(default)]
    pub fingers_right: [f32; Digit::COUNT],
}

impl FrameInput {
    /// Frame with only the hip target
    pub fn new(hips: TargetPose) -> Self {
        Self {
            head: None,
            left_hand: None,
            right_hand: None,
            hips,
            left_foot: None,
            right_foot: None,
            fingers_left: [0.0; Digit::COUNT],
            fingers_right: [0.0; Digit::COUNT],
        }
    }

    pub fn hand(&self, side: Side) -> Option<&TargetPose> {
        match side {
            Side::Left => self.left_hand.as_ref(),
            Side::Right => self.right_hand.as_ref(),
        }
        .filter(|t| t.is_valid())
    }

    pub fn foot(&self, side: Side) -> Option<&TargetPose> {
        match side {
            Side::Left => self.left_foot.as_ref(),
            Side::Right => self.right_foot.as_ref(),
        }
        .filter(|t| t.is_valid())
    }

    pub fn head(&self) -> Option<&TargetPose> {
        self.head.as_ref().filter(|t| t.is_valid())
    }

    pub fn fingers(&self, side: Side) -> &[f32; Digit::COUNT] {
        match side {
            Side::Left => &self.fingers_left,
            Side::Right => &self.fingers_right,
        }
    }

    /// Which optional targets are present. A change between frames means
    /// the tracking setup was swapped and calibration is stale.
    pub fn presence(&self) -> TargetPresence {
        TargetPresence {
            head: self.head().is_some(),
            hands: [self.hand(Side::Left).is_some(), self.hand(Side::Right).is_some()],
            feet: [self.foot(Side::Left).is_some(), self.foot(Side::Right).is_some()],
        }
    }
}

/// Presence of each optional target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetPresence {
    pub head: bool,
    pub hands: [bool; 2],
    pub feet: [bool; 2],
}
