//! Calibration offsets.
//!
//! Every solved bone gets `final = normalized * offset`. Calibration captures
//! the offsets so the formula reproduces the skeleton's pose at the moment
//! of calibration. A [`Calibration`] is built whole and swapped in one
//! assignment; nothing mutates it afterwards.

use crate::config::BodyConfig;
use crate::error::RigError;
use crate::ik::{LimbChain, LimbKind};
use crate::math::{distance_to_ray, flat_forward, look_rotation, look_rotation_up};
use crate::rig::{SceneGraph, Side};
use crate::target::{FrameInput, TargetPose};
use crate::torso::TorsoBones;
use glam::{Quat, Vec3};

/// Which reference pose the skeleton is in when calibrating
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseKind {
    /// Arms spread in a T or legs straight down: segments are colinear
    Neutral,
    /// The skeleton already matches the live targets
    Tracked,
}

/// Pose kind per limb, indexed by [`Side::index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationPlan {
    pub arms: [PoseKind; 2],
    pub legs: [PoseKind; 2],
}

impl CalibrationPlan {
    pub const fn uniform(kind: PoseKind) -> Self {
        Self {
            arms: [kind; 2],
            legs: [kind; 2],
        }
    }

    /// Pick the pose kind of each limb from the skeleton's current shape
    pub fn detect<G: SceneGraph>(
        graph: &G,
        arms: &[LimbChain; 2],
        legs: &[LimbChain; 2],
        config: &BodyConfig,
    ) -> Self {
        let arm_kind = if is_t_pose_like(graph, arms, config.t_pose_tolerance) {
            PoseKind::Neutral
        } else {
            PoseKind::Tracked
        };
        let leg_kind = |leg: &LimbChain| {
            if is_leg_vertical(graph, leg, config.t_pose_tolerance, config.leg_vertical_tolerance) {
                PoseKind::Neutral
            } else {
                PoseKind::Tracked
            }
        };

        let plan = Self {
            arms: [arm_kind; 2],
            legs: [leg_kind(&legs[0]), leg_kind(&legs[1])],
        };
        log::debug!("Detected calibration plan {:?}", plan);
        plan
    }
}

/// Both arms lie on the line between the hands and are stretched out.
pub fn is_t_pose_like<G: SceneGraph>(graph: &G, arms: &[LimbChain; 2], tolerance: f32) -> bool {
    let [left, right] = arms;
    let left_hand = graph.world_position(left.end);
    let direction = graph.world_position(right.end) - left_hand;

    let on_line = [left.mid, left.root, right.root, right.mid]
        .into_iter()
        .all(|bone| distance_to_ray(left_hand, direction, graph.world_position(bone)) <= tolerance);
    if !on_line {
        return false;
    }

    arms.iter().all(|arm| {
        let span = graph.world_position(arm.root).distance(graph.world_position(arm.end));
        span >= arm.lengths.sum - tolerance
    })
}

/// The leg hangs straight down: knee on the hip-to-foot line and that line
/// close to vertical.
pub fn is_leg_vertical<G: SceneGraph>(
    graph: &G,
    leg: &LimbChain,
    line_tolerance: f32,
    vertical_tolerance: f32,
) -> bool {
    let hip = graph.world_position(leg.root);
    let to_foot = graph.world_position(leg.end) - hip;
    if distance_to_ray(hip, to_foot, graph.world_position(leg.mid)) > line_tolerance {
        return false;
    }
    let dir = to_foot.normalize_or_zero();
    dir.x.abs() <= vertical_tolerance && dir.z.abs() <= vertical_tolerance
}

/// Offsets of one limb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbCalibration {
    pub kind: PoseKind,
    pub root: Quat,
    pub mid: Quat,
    /// Relative to the end target's rotation
    pub end: Quat,
}

impl LimbCalibration {
    /// Offsets for a limb whose segments are colinear in the current pose
    pub fn neutral<G: SceneGraph>(chain: &LimbChain, graph: &G, hips: &TargetPose) -> Self {
        let root_pos = graph.world_position(chain.root);
        let mid_pos = graph.world_position(chain.mid);
        let end_pos = graph.world_position(chain.end);

        let (root_norm, mid_norm, end_norm) = match chain.kind {
            LimbKind::Arm => {
                let forearm = look_rotation_up(end_pos - mid_pos);
                (look_rotation_up(mid_pos - root_pos), forearm, forearm)
            }
            LimbKind::Leg => {
                let forward = hips.forward();
                (
                    look_rotation(mid_pos - root_pos, forward),
                    look_rotation(end_pos - mid_pos, forward),
                    look_rotation_up(forward),
                )
            }
        };

        Self {
            kind: PoseKind::Neutral,
            root: root_norm.inverse() * graph.world_rotation(chain.root),
            mid: mid_norm.inverse() * graph.world_rotation(chain.mid),
            end: end_norm.inverse() * graph.world_rotation(chain.end),
        }
    }

    /// Offsets that make solving for `target` reproduce the current pose
    pub fn tracked<G: SceneGraph>(
        chain: &LimbChain,
        graph: &G,
        hips: &TargetPose,
        target: &TargetPose,
    ) -> Self {
        let root_pos = graph.world_position(chain.root);
        let mid_pos = graph.world_position(chain.mid);
        let root_norm = chain.root_norm(root_pos, hips.rotation, target);
        let mid_norm = chain.mid_norm(mid_pos, target);

        Self {
            kind: PoseKind::Tracked,
            root: root_norm.inverse() * graph.world_rotation(chain.root),
            mid: mid_norm.inverse() * graph.world_rotation(chain.mid),
            end: target.rotation.inverse() * graph.world_rotation(chain.end),
        }
    }
}

/// Static torso measurements captured at calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoCalibration {
    pub hip_start_position: Vec3,
    pub hip_start_rotation: Quat,
    pub neck_start_position: Vec3,
    pub spine_start_rotation: Quat,
    /// Spine-to-neck vector at calibration
    pub spine_start_orientation: Vec3,
    /// Bend axis in the spine's local frame (the hip target's right axis)
    pub spine_axis: Vec3,
    /// Spine to shoulder height
    pub length: f32,
    /// Shoulder joints at calibration, indexed by [`Side::index`]
    pub arm_root_start: [Vec3; 2],
    pub neck: Quat,
    pub torso: Quat,
    pub hips: Quat,
}

impl TorsoCalibration {
    pub fn capture<G: SceneGraph>(
        graph: &G,
        bones: &TorsoBones,
        arms: &[LimbChain; 2],
        hips: &TargetPose,
    ) -> Result<Self, RigError> {
        let spine_pos = graph.world_position(bones.spine);
        let neck_pos = graph.world_position(bones.neck);
        let spine_rot = graph.world_rotation(bones.spine);
        let arm_root_start = [
            graph.world_position(arms[Side::Left.index()].root),
            graph.world_position(arms[Side::Right.index()].root),
        ];

        let shoulder_height = arm_root_start[Side::Right.index()].y;
        let length = spine_pos.distance(Vec3::new(neck_pos.x, shoulder_height, neck_pos.z));
        if !(length > f32::EPSILON) {
            return Err(RigError::ZeroLengthTorso);
        }

        let forward = hips.forward();
        Ok(Self {
            hip_start_position: graph.world_position(bones.hips),
            hip_start_rotation: graph.world_rotation(bones.hips),
            neck_start_position: neck_pos,
            spine_start_rotation: spine_rot,
            spine_start_orientation: neck_pos - spine_pos,
            spine_axis: spine_rot.inverse() * hips.right(),
            length,
            arm_root_start,
            neck: look_rotation_up(forward).inverse() * graph.world_rotation(bones.neck),
            torso: look_rotation(neck_pos - spine_pos, forward).inverse() * spine_rot,
            hips: look_rotation_up(flat_forward(hips.rotation)).inverse()
                * graph.world_rotation(bones.hips),
        })
    }

    /// Frame carrying the calibration-time torso along with the hips' current
    /// horizontal position and turn. Height stays at the calibrated hip
    /// height, so a crouch does not move it.
    pub fn hip_frame<G: SceneGraph>(&self, graph: &G, bones: &TorsoBones) -> HipFrame {
        let hips = graph.world_position(bones.hips);
        let turn = graph.world_rotation(bones.hips) * self.hip_start_rotation.inverse();
        HipFrame {
            start: self.hip_start_position,
            origin: Vec3::new(hips.x, self.hip_start_position.y, hips.z),
            turn: turn.normalize(),
        }
    }
}

/// Maps torso positions and rotations captured at calibration onto the
/// hips' current placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HipFrame {
    start: Vec3,
    origin: Vec3,
    turn: Quat,
}

impl HipFrame {
    #[inline]
    pub fn point(&self, start_position: Vec3) -> Vec3 {
        self.origin + self.turn * (start_position - self.start)
    }

    #[inline]
    pub fn direction(&self, start_direction: Vec3) -> Vec3 {
        self.turn * start_direction
    }

    #[inline]
    pub fn rotation(&self, start_rotation: Quat) -> Quat {
        (self.turn * start_rotation).normalize()
    }
}

/// Complete offset set for a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub plan: CalibrationPlan,
    pub arms: [LimbCalibration; 2],
    pub legs: [LimbCalibration; 2],
    pub torso: TorsoCalibration,
    /// Foot positions at calibration, used when a foot has no target
    pub feet: [Vec3; 2],
}

impl Calibration {
    /// Capture offsets for the skeleton's current pose, torso included.
    pub fn capture<G: SceneGraph>(
        graph: &G,
        torso: &TorsoBones,
        arms: &[LimbChain; 2],
        legs: &[LimbChain; 2],
        plan: CalibrationPlan,
        input: &FrameInput,
    ) -> Result<Self, RigError> {
        let torso = TorsoCalibration::capture(graph, torso, arms, &input.hips)?;
        Ok(Self::with_torso(graph, arms, legs, plan, input, torso))
    }

    /// Capture limb offsets and feet for the current pose, keeping torso
    /// measurements taken earlier.
    ///
    /// Tracked limbs need their targets: an arm without a hand target falls
    /// back to neutral, a leg without a foot target uses its planted target.
    pub fn with_torso<G: SceneGraph>(
        graph: &G,
        arms: &[LimbChain; 2],
        legs: &[LimbChain; 2],
        plan: CalibrationPlan,
        input: &FrameInput,
        torso: TorsoCalibration,
    ) -> Self {
        let hips = &input.hips;
        let feet = [
            graph.world_position(legs[Side::Left.index()].end),
            graph.world_position(legs[Side::Right.index()].end),
        ];

        let arm = |chain: &LimbChain| {
            let side = chain.side;
            match (plan.arms[side.index()], input.hand(side)) {
                (PoseKind::Tracked, Some(target)) => {
                    LimbCalibration::tracked(chain, graph, hips, target)
                }
                (PoseKind::Tracked, None) => {
                    log::warn!(
                        "No {:?} hand target for tracked calibration, assuming a neutral arm",
                        side
                    );
                    LimbCalibration::neutral(chain, graph, hips)
                }
                (PoseKind::Neutral, _) => LimbCalibration::neutral(chain, graph, hips),
            }
        };

        let leg = |chain: &LimbChain| match plan.legs[chain.side.index()] {
            PoseKind::Tracked => {
                let target = input
                    .foot(chain.side)
                    .copied()
                    .unwrap_or_else(|| planted_foot(feet[chain.side.index()], hips));
                LimbCalibration::tracked(chain, graph, hips, &target)
            }
            PoseKind::Neutral => LimbCalibration::neutral(chain, graph, hips),
        };

        let calibration = Self {
            plan,
            arms: [arm(&arms[0]), arm(&arms[1])],
            legs: [leg(&legs[0]), leg(&legs[1])],
            torso,
            feet,
        };
        log::info!(
            "Calibrated body: arms {:?}, legs {:?}",
            calibration.plan.arms,
            calibration.plan.legs
        );
        calibration
    }

    #[inline]
    pub fn arm(&self, side: Side) -> &LimbCalibration {
        &self.arms[side.index()]
    }

    #[inline]
    pub fn leg(&self, side: Side) -> &LimbCalibration {
        &self.legs[side.index()]
    }
}

/// Target for a foot without tracking: where it stood at calibration, turned
/// with the hips.
#[inline]
pub fn planted_foot(position: Vec3, hips: &TargetPose) -> TargetPose {
    TargetPose::new(position, hips.rotation)
}
