//! Hips, spine and neck.
//!
//! With a head target the torso follows it directly. Without one the spine
//! bends forward when a hand reaches past arm's length, and once the bend
//! hits its limit the hips drop into a crouch.

use crate::calibration::{HipFrame, TorsoCalibration};
use crate::config::BodyConfig;
use crate::error::RigError;
use crate::ik::LimbChain;
use crate::math::{
    angle_axis, clamp_angle, flat_forward, from_pitch_yaw_roll, look_rotation, look_rotation_up,
    to_pitch_yaw_roll,
};
use crate::rig::{BoneHandle, BoneRole, SceneGraph, Side, SkeletonBinding};
use crate::target::{FrameInput, TargetPose};
use glam::Vec3;

/// Torso bones. `neck` is the head bone on rigs without a neck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TorsoBones {
    pub hips: BoneHandle,
    pub spine: BoneHandle,
    pub neck: BoneHandle,
}

impl TorsoBones {
    pub fn bind(binding: &SkeletonBinding) -> Result<Self, RigError> {
        Ok(Self {
            hips: binding.require(BoneRole::Hips)?,
            spine: binding.require(BoneRole::Spine)?,
            neck: binding.neck_or_head()?,
        })
    }
}

/// How the torso is driven this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorsoMode {
    DirectFollow,
    AutoBend,
}

impl TorsoMode {
    pub fn for_input(input: &FrameInput) -> Self {
        if input.head().is_some() {
            TorsoMode::DirectFollow
        } else {
            TorsoMode::AutoBend
        }
    }
}

/// Per-frame AutoBend state, reset on every recalibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoBendState {
    pub bend_angle: f32,
    pub crouching: bool,
    /// Where the neck is pulled to while crouching
    pub neck_target: Vec3,
}

impl AutoBendState {
    pub fn new(calibration: &TorsoCalibration) -> Self {
        Self {
            bend_angle: 0.0,
            crouching: false,
            neck_target: calibration.neck_start_position,
        }
    }
}

/// Move the hips to the hip target horizontally and turn them with its yaw.
/// Height is only taken over when `follow_height` is set.
pub fn follow_hips<G: SceneGraph>(
    graph: &mut G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    hips: &TargetPose,
    follow_height: bool,
) {
    let current = graph.world_position(bones.hips);
    let y = if follow_height { hips.position.y } else { current.y };
    graph.set_world_position(bones.hips, Vec3::new(hips.position.x, y, hips.position.z));
    graph.set_world_rotation(
        bones.hips,
        look_rotation_up(flat_forward(hips.rotation)) * calibration.hips,
    );
}

/// Point the spine at the head target
pub fn follow_head<G: SceneGraph>(
    graph: &mut G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    head: &TargetPose,
    hips: &TargetPose,
) {
    let spine_pos = graph.world_position(bones.spine);
    let look = look_rotation(head.position - spine_pos, hips.forward());
    graph.set_world_rotation(bones.spine, look * calibration.torso);
}

/// Apply the head orientation to the neck, limited relative to the hips.
/// Returns the applied (pitch, yaw, roll) in degrees.
pub fn clamp_head<G: SceneGraph>(
    graph: &mut G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    head: &TargetPose,
    hips: &TargetPose,
    config: &BodyConfig,
) -> Vec3 {
    let local = to_pitch_yaw_roll(hips.rotation.inverse() * head.rotation);
    let (min, max) = (config.head_min, config.head_max);
    let clamped = Vec3::new(
        clamp_angle(local.x, min.x, max.x),
        clamp_angle(local.y, min.y, max.y),
        clamp_angle(local.z, min.z, max.z),
    );

    let rotation =
        look_rotation_up(hips.forward()) * from_pitch_yaw_roll(clamped) * calibration.neck;
    graph.set_world_rotation(bones.neck, rotation);
    clamped
}

/// How far a hand target lies beyond the arm's reach from the unbent
/// shoulder, carried along with the hips. `None` without a hand target.
fn overextension(
    calibration: &TorsoCalibration,
    frame: &HipFrame,
    arms: &[LimbChain; 2],
    input: &FrameInput,
    side: Side,
) -> Option<(f32, Vec3)> {
    let hand = input.hand(side)?;
    let to_hand = hand.position - frame.point(calibration.arm_root_start[side.index()]);
    let over = to_hand.length() - arms[side.index()].lengths.sum;
    Some((over, to_hand))
}

/// Spine bend toward `torso_target`, the point the shoulders should be
/// brought to, in degrees.
fn bend_toward<G: SceneGraph>(
    graph: &G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    frame: &HipFrame,
    torso_target: Vec3,
    arm_length: f32,
    max_angle: f32,
) -> f32 {
    let to_target = torso_target - graph.world_position(bones.spine);
    let d = to_target.length();
    if d <= f32::EPSILON {
        return 0.0;
    }

    let base = frame
        .direction(calibration.spine_start_orientation)
        .angle_between(to_target)
        .to_degrees();

    let t = calibration.length;
    let cos = (d * d + t * t - arm_length * arm_length) / (2.0 * d * t);
    let mut spine_angle = cos.acos().to_degrees();
    if spine_angle.is_nan() {
        spine_angle = 0.0;
    }

    let bend = (base - spine_angle).min(max_angle);
    if bend.is_finite() {
        bend.max(0.0)
    } else {
        0.0
    }
}

/// Result of one horizontal AutoBend pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalBend {
    /// Hand the torso bends toward; `None` when no hand is out of reach
    pub side: Option<Side>,
    pub angle: f32,
}

/// Bend the spine forward so an overextended hand can be reached. The arms
/// must be solved again afterwards.
pub fn auto_horizontal<G: SceneGraph>(
    graph: &mut G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    arms: &[LimbChain; 2],
    input: &FrameInput,
    max_angle: f32,
) -> HorizontalBend {
    let frame = calibration.hip_frame(&*graph, bones);
    let spine_rest = frame.rotation(calibration.spine_start_rotation);
    let shoulder_to_neck = (graph.world_position(arms[Side::Left.index()].root)
        - graph.world_position(arms[Side::Right.index()].root))
        / 2.0;

    let candidate = |side: Side| -> Option<(Vec3, f32)> {
        let (over, _) = overextension(calibration, &frame, arms, input, side)?;
        if over <= 0.0 {
            return None;
        }
        let hand = input.hand(side)?.position;
        let target = match side {
            Side::Left => hand - shoulder_to_neck,
            Side::Right => hand + shoulder_to_neck,
        };
        let arm_length = arms[side.index()].lengths.sum;
        Some((target, arm_length))
    };

    let bend = |(target, arm_length): (Vec3, f32)| {
        bend_toward(&*graph, bones, calibration, &frame, target, arm_length, max_angle)
    };

    let chosen = match (candidate(Side::Left), candidate(Side::Right)) {
        (Some(left), Some(right)) => {
            let left_angle = bend(left);
            let right_angle = bend(right);
            if right_angle >= left_angle {
                Some((Side::Right, right_angle))
            } else {
                Some((Side::Left, left_angle))
            }
        }
        (Some(left), None) => Some((Side::Left, bend(left))),
        (None, Some(right)) => Some((Side::Right, bend(right))),
        (None, None) => None,
    };

    match chosen {
        Some((side, angle)) => {
            graph.set_world_rotation(
                bones.spine,
                spine_rest * angle_axis(angle, calibration.spine_axis),
            );
            HorizontalBend {
                side: Some(side),
                angle,
            }
        }
        None => {
            graph.set_world_rotation(bones.spine, spine_rest);
            HorizontalBend {
                side: None,
                angle: 0.0,
            }
        }
    }
}

/// Drop the hips so the neck follows the vertical part of the larger
/// overextension. Never raises the hips above their calibrated height.
/// The arms must be solved again afterwards. Returns whether the body is
/// crouching.
pub fn auto_vertical<G: SceneGraph>(
    graph: &mut G,
    bones: &TorsoBones,
    calibration: &TorsoCalibration,
    arms: &[LimbChain; 2],
    input: &FrameInput,
    state: &mut AutoBendState,
) -> bool {
    let frame = calibration.hip_frame(&*graph, bones);
    let reach = |side| overextension(calibration, &frame, arms, input, side);
    let (left_over, left_to) = reach(Side::Left).unwrap_or((f32::NEG_INFINITY, Vec3::ZERO));
    let (right_over, right_to) = reach(Side::Right).unwrap_or((f32::NEG_INFINITY, Vec3::ZERO));

    let neck_delta = if left_over > 0.0 {
        if right_over > left_over {
            right_to.normalize_or_zero() * right_over
        } else {
            left_to.normalize_or_zero() * left_over
        }
    } else if right_over > 0.0 {
        right_to.normalize_or_zero() * right_over
    } else {
        Vec3::ZERO
    };

    state.neck_target =
        frame.point(calibration.neck_start_position) + Vec3::new(0.0, neck_delta.y, 0.0);

    let dy = state.neck_target.y - graph.world_position(bones.neck).y;
    let hips = graph.world_position(bones.hips);
    let start_y = calibration.hip_start_position.y;
    if hips.y + dy < start_y {
        graph.set_world_position(bones.hips, hips + Vec3::new(0.0, dy, 0.0));
    } else if hips.y + dy > start_y {
        graph.set_world_position(bones.hips, Vec3::new(hips.x, start_y, hips.z));
    }

    graph.world_position(bones.hips).y < start_y
}
