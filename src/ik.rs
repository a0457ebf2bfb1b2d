//! Analytic two-bone limb solver.
//!
//! A limb is root (shoulder or hip joint), mid (elbow or knee) and end (hand
//! or foot). The solver builds a "normalized" orientation for each bone from
//! the target alone, then multiplies in the calibration offset captured by
//! [`crate::calibration`]. The result only depends on the target, the chain
//! topology and the offsets, so it never accumulates error frame to frame.

use crate::calibration::LimbCalibration;
use crate::error::RigError;
use crate::math::{angle_axis, bend_angle, look_rotation, QuatAxes};
use crate::rig::{BoneHandle, BoneRole, SceneGraph, Side, SkeletonBinding};
use crate::target::TargetPose;
use glam::{Quat, Vec3};

/// Below this a segment is considered collapsed
const MIN_SEGMENT_LENGTH: f32 = 1e-5;

/// Segment lengths of a two-bone chain, measured once at initialization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLengths {
    pub upper: f32,
    pub lower: f32,
    pub upper_sq: f32,
    pub lower_sq: f32,
    pub sum: f32,
}

impl SegmentLengths {
    pub fn new(upper: f32, lower: f32) -> Self {
        Self {
            upper,
            lower,
            upper_sq: upper * upper,
            lower_sq: lower * lower,
            sum: upper + lower,
        }
    }

    /// Root bend in degrees for a root-to-target distance `d`; 0 when the
    /// target is out of reach either way.
    #[inline]
    pub fn bend_angle(&self, d: f32) -> f32 {
        bend_angle(d, self.upper, self.lower)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimbKind {
    Arm,
    Leg,
}

impl LimbKind {
    pub const fn name(self) -> &'static str {
        match self {
            LimbKind::Arm => "arm",
            LimbKind::Leg => "leg",
        }
    }

    pub const fn roles(self, side: Side) -> [BoneRole; 3] {
        match self {
            LimbKind::Arm => BoneRole::arm(side),
            LimbKind::Leg => BoneRole::leg(side),
        }
    }
}

/// Bones and static measurements of one limb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbChain {
    pub side: Side,
    pub kind: LimbKind,
    pub root: BoneHandle,
    pub mid: BoneHandle,
    pub end: BoneHandle,
    pub lengths: SegmentLengths,
    /// Mid joint position in the root bone's frame
    mid_offset: Vec3,
}

/// World rotations produced for one limb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbPose {
    pub root: Quat,
    pub mid: Quat,
    pub end: Quat,
}

impl LimbPose {
    pub fn is_finite(&self) -> bool {
        self.root.is_finite() && self.mid.is_finite() && self.end.is_finite()
    }

    /// Write the rotations parent first so each child sees its updated parent
    pub fn apply<G: SceneGraph>(&self, graph: &mut G, chain: &LimbChain) {
        graph.set_world_rotation(chain.root, self.root);
        graph.set_world_rotation(chain.mid, self.mid);
        graph.set_world_rotation(chain.end, self.end);
    }
}

impl LimbChain {
    /// Look up the limb's bones and measure it in the current pose
    pub fn bind<G: SceneGraph>(
        graph: &G,
        binding: &SkeletonBinding,
        side: Side,
        kind: LimbKind,
    ) -> Result<Self, RigError> {
        let [root_role, mid_role, end_role] = kind.roles(side);
        let root = binding.require(root_role)?;
        let mid = binding.require(mid_role)?;
        let end = binding.require(end_role)?;

        let root_pos = graph.world_position(root);
        let mid_pos = graph.world_position(mid);
        let end_pos = graph.world_position(end);

        let upper = root_pos.distance(mid_pos);
        let lower = mid_pos.distance(end_pos);
        if !(upper > MIN_SEGMENT_LENGTH && lower > MIN_SEGMENT_LENGTH) {
            return Err(RigError::ZeroLengthSegment {
                side,
                limb: kind.name(),
                upper,
                lower,
            });
        }

        Ok(Self {
            side,
            kind,
            root,
            mid,
            end,
            lengths: SegmentLengths::new(upper, lower),
            mid_offset: graph.world_rotation(root).inverse() * (mid_pos - root_pos),
        })
    }

    /// Where the mid joint lands when the root bone has `root_rotation`
    #[inline]
    pub fn mid_position(&self, root_position: Vec3, root_rotation: Quat) -> Vec3 {
        root_position + root_rotation * self.mid_offset
    }

    /// Normalized root orientation: looking from the root joint at the
    /// target, swung by the bend angle so the mid joint lies on the circle
    /// that reaches the target.
    pub fn root_norm(&self, root_position: Vec3, hips: Quat, target: &TargetPose) -> Quat {
        let to_target = target.position - root_position;
        let angle = self.lengths.bend_angle(to_target.length());

        match self.kind {
            LimbKind::Arm => {
                let s = self.side.sign();
                let up = arm_up_hint(s, hips, target, to_target);
                let look = look_rotation(to_target, up);
                angle_axis(s * angle, look.up()) * look
            }
            LimbKind::Leg => {
                let forward = target.forward();
                let look = look_rotation(to_target, forward);
                angle_axis(-angle, forward.cross(to_target)) * look
            }
        }
    }

    /// Normalized mid orientation: looking from the mid joint at the target
    pub fn mid_norm(&self, mid_position: Vec3, target: &TargetPose) -> Quat {
        let hint = match self.kind {
            LimbKind::Arm => target.up(),
            LimbKind::Leg => target.forward(),
        };
        look_rotation(target.position - mid_position, hint)
    }

    /// Solve the limb for `target`. Unreachable targets lay the limb straight
    /// toward the target; the output is always finite for finite input.
    pub fn solve(
        &self,
        calibration: &LimbCalibration,
        root_position: Vec3,
        hips: Quat,
        target: &TargetPose,
    ) -> LimbPose {
        let root = (self.root_norm(root_position, hips, target) * calibration.root).normalize();
        let mid_position = self.mid_position(root_position, root);
        let mid = (self.mid_norm(mid_position, target) * calibration.mid).normalize();
        let end = (target.rotation * calibration.end).normalize();
        LimbPose { root, mid, end }
    }

    /// Solve against the live root position and write the result
    pub fn solve_into<G: SceneGraph>(
        &self,
        graph: &mut G,
        calibration: &LimbCalibration,
        hips: Quat,
        target: &TargetPose,
    ) -> LimbPose {
        let pose = self.solve(calibration, graph.world_position(self.root), hips, target);
        pose.apply(graph, self);
        pose
    }
}

/// Elbow up-hint in world space, built in the hip frame.
///
/// Starts from the hand's up axis, forced outward and upward and kept near
/// the torso plane, then pushed further when the hand crosses the body
/// midline or rises above the shoulder.
fn arm_up_hint(s: f32, hips: Quat, target: &TargetPose, to_target: Vec3) -> Vec3 {
    let to_hips = hips.inverse();
    let mut up = to_hips * target.up();
    up.x = s * (s * up.x).max(0.3);
    up.y = up.y.max(0.01);
    up.z = up.z.clamp(-0.1, 0.1);

    let hand = to_hips * to_target;
    if s * hand.x < 0.0 {
        up.z -= s * hand.x * 10.0;
    }
    if hand.y > 0.0 {
        up.y += hand.y * 10.0;
    }
    hips * up
}
