//! Body movements orchestrator.
//!
//! [`BodyRig`] is a bound but idle body: bones looked up and measured.
//! [`BodyRig::start`] calibrates it into a running [`BodyMovements`], which
//! writes the skeleton pose once per frame. [`BodyMovements::stop`] hands
//! the rig back.

use crate::calibration::{planted_foot, Calibration, CalibrationPlan};
use crate::config::BodyConfig;
use crate::digits::HandDigits;
use crate::error::RigError;
use crate::ik::{LimbChain, LimbKind};
use crate::rig::{SceneGraph, Side, SkeletonBinding};
use crate::target::{FrameInput, TargetPresence};
use crate::torso::{self, AutoBendState, TorsoBones, TorsoMode};
use static_assertions::assert_impl_all;

/// Bound skeleton parts of one body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRig {
    config: BodyConfig,
    torso: TorsoBones,
    arms: [LimbChain; 2],
    legs: [LimbChain; 2],
    hands: [HandDigits; 2],
}

impl BodyRig {
    /// Bind and measure the body in its current pose
    pub fn initialize<G: SceneGraph>(
        graph: &G,
        binding: &SkeletonBinding,
        config: BodyConfig,
    ) -> Result<Self, RigError> {
        binding.validate(graph)?;

        let torso = TorsoBones::bind(binding)?;
        let arms = [
            LimbChain::bind(graph, binding, Side::Left, LimbKind::Arm)?,
            LimbChain::bind(graph, binding, Side::Right, LimbKind::Arm)?,
        ];
        let legs = [
            LimbChain::bind(graph, binding, Side::Left, LimbKind::Leg)?,
            LimbChain::bind(graph, binding, Side::Right, LimbKind::Leg)?,
        ];
        let hands = Side::BOTH.map(|side| HandDigits::bind(graph, binding, side));

        log::info!(
            "Initialized body rig: arms {:.3}/{:.3}, legs {:.3}/{:.3}",
            arms[0].lengths.sum,
            arms[1].lengths.sum,
            legs[0].lengths.sum,
            legs[1].lengths.sum
        );

        Ok(Self {
            config,
            torso,
            arms,
            legs,
            hands,
        })
    }

    #[inline]
    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    #[inline]
    pub fn arm(&self, side: Side) -> &LimbChain {
        &self.arms[side.index()]
    }

    #[inline]
    pub fn leg(&self, side: Side) -> &LimbChain {
        &self.legs[side.index()]
    }

    #[inline]
    pub fn torso(&self) -> &TorsoBones {
        &self.torso
    }

    /// Whether the skeleton currently stands with its arms spread in a T
    pub fn is_t_pose_like<G: SceneGraph>(&self, graph: &G) -> bool {
        crate::calibration::is_t_pose_like(graph, &self.arms, self.config.t_pose_tolerance)
    }

    /// Calibration plan matching the skeleton's current pose
    pub fn detect_plan<G: SceneGraph>(&self, graph: &G) -> CalibrationPlan {
        CalibrationPlan::detect(graph, &self.arms, &self.legs, &self.config)
    }

    /// Capture a calibration of the current pose
    pub fn calibrate<G: SceneGraph>(
        &self,
        graph: &G,
        plan: CalibrationPlan,
        input: &FrameInput,
    ) -> Result<Calibration, RigError> {
        Calibration::capture(graph, &self.torso, &self.arms, &self.legs, plan, input)
    }

    /// Calibrate with a detected plan and start driving the body
    pub fn start<G: SceneGraph>(
        self,
        graph: &G,
        input: &FrameInput,
    ) -> Result<BodyMovements, RigError> {
        let plan = self.detect_plan(graph);
        let calibration = self.calibrate(graph, plan, input)?;
        Ok(BodyMovements {
            auto_bend: AutoBendState::new(&calibration.torso),
            presence: input.presence(),
            calibration,
            rig: self,
        })
    }
}

/// A calibrated body being driven by targets
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMovements {
    rig: BodyRig,
    calibration: Calibration,
    auto_bend: AutoBendState,
    presence: TargetPresence,
}

assert_impl_all!(BodyMovements: Send);

impl BodyMovements {
    #[inline]
    pub fn rig(&self) -> &BodyRig {
        &self.rig
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[inline]
    pub fn auto_bend(&self) -> &AutoBendState {
        &self.auto_bend
    }

    /// Stop driving the body
    pub fn stop(self) -> BodyRig {
        self.rig
    }

    /// Recalibrate against the current pose with a detected plan. The torso
    /// is measured again, so the body should be upright.
    pub fn recalibrate<G: SceneGraph>(
        &mut self,
        graph: &G,
        input: &FrameInput,
    ) -> Result<(), RigError> {
        let plan = self.rig.detect_plan(graph);
        self.recalibrate_with(graph, plan, input)
    }

    /// Recalibrate with an explicit plan. The previous calibration stays in
    /// place if capturing fails.
    pub fn recalibrate_with<G: SceneGraph>(
        &mut self,
        graph: &G,
        plan: CalibrationPlan,
        input: &FrameInput,
    ) -> Result<(), RigError> {
        let calibration = self.rig.calibrate(graph, plan, input)?;
        self.auto_bend = AutoBendState::new(&calibration.torso);
        self.calibration = calibration;
        self.presence = input.presence();
        Ok(())
    }

    /// Recapture limb offsets for a changed target set. Torso measurements
    /// and the AutoBend state carry over, since the torso may be bent or
    /// crouched at this point.
    fn recalibrate_limbs<G: SceneGraph>(&mut self, graph: &G, input: &FrameInput) {
        let rig = &self.rig;
        let plan = rig.detect_plan(graph);
        let torso = self.calibration.torso;
        self.calibration = Calibration::with_torso(graph, &rig.arms, &rig.legs, plan, input, torso);
        self.presence = input.presence();
    }

    /// Latch every digit of a hand at its current curl
    pub fn grab(&mut self, side: Side) {
        self.rig.hands[side.index()].grab();
    }

    pub fn has_grabbed(&self, side: Side) -> bool {
        self.rig.hands[side.index()].has_grabbed()
    }

    /// Drive the skeleton for one frame: torso, arms, head, legs, digits.
    pub fn step_frame<G: SceneGraph>(&mut self, graph: &mut G, input: &FrameInput) {
        if !input.hips.is_valid() {
            log::warn!("Hip target is not finite, skipping frame");
            return;
        }

        let presence = input.presence();
        if presence != self.presence {
            log::info!(
                "Target set changed ({:?} -> {:?}), recalibrating limbs",
                self.presence,
                presence
            );
            self.recalibrate_limbs(&*graph, input);
        }

        let config = self.rig.config;
        match TorsoMode::for_input(input) {
            TorsoMode::DirectFollow => self.direct_follow(graph, input),
            TorsoMode::AutoBend => self.auto_bend_step(graph, input),
        }

        if config.enable_legs {
            self.solve_legs(graph, input);
        }

        for side in Side::BOTH {
            self.rig.hands[side.index()].update(graph, input.fingers(side), config.grab_speed);
        }
    }

    fn direct_follow<G: SceneGraph>(&self, graph: &mut G, input: &FrameInput) {
        let config = &self.rig.config;
        let bones = &self.rig.torso;
        let calibration = &self.calibration.torso;
        let hips = &input.hips;

        if config.enable_torso {
            torso::follow_hips(graph, bones, calibration, hips, config.enable_legs);
        }
        if let Some(head) = input.head() {
            if config.enable_torso {
                torso::follow_head(graph, bones, calibration, head, hips);
            }
            self.solve_arms(graph, input);
            torso::clamp_head(graph, bones, calibration, head, hips, config);
        }
    }

    fn auto_bend_step<G: SceneGraph>(&mut self, graph: &mut G, input: &FrameInput) {
        let config = self.rig.config;
        let bones = self.rig.torso;
        let calibration = self.calibration.torso;
        let mut state = self.auto_bend;

        if config.enable_torso {
            torso::follow_hips(graph, &bones, &calibration, &input.hips, false);
        }

        if state.bend_angle <= 0.0 && !state.crouching {
            self.solve_arms(graph, input);
        }

        if config.enable_torso && !state.crouching {
            let bend = torso::auto_horizontal(
                graph,
                &bones,
                &calibration,
                &self.rig.arms,
                input,
                config.max_hip_angle,
            );
            state.bend_angle = bend.angle;
            self.solve_arms(graph, input);
        }

        if config.enable_legs && state.bend_angle >= config.max_hip_angle {
            let arms = &self.rig.arms;
            let crouching =
                torso::auto_vertical(graph, &bones, &calibration, arms, input, &mut state);
            state.crouching = crouching;
            self.solve_arms(graph, input);
        }

        self.auto_bend = state;
    }

    /// Arms without a hand target keep their current pose
    fn solve_arms<G: SceneGraph>(&self, graph: &mut G, input: &FrameInput) {
        for side in Side::BOTH {
            if let Some(target) = input.hand(side) {
                self.rig.arms[side.index()].solve_into(
                    graph,
                    self.calibration.arm(side),
                    input.hips.rotation,
                    target,
                );
            }
        }
    }

    fn solve_legs<G: SceneGraph>(&self, graph: &mut G, input: &FrameInput) {
        for side in Side::BOTH {
            let target = input
                .foot(side)
                .copied()
                .unwrap_or_else(|| planted_foot(self.calibration.feet[side.index()], &input.hips));
            self.rig.legs[side.index()].solve_into(
                graph,
                self.calibration.leg(side),
                input.hips.rotation,
                &target,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::PoseKind;
    use crate::math::QuatAxes;
    use crate::rig::{humanoid, BoneRole, Digit, Skeleton};
    use crate::target::TargetPose;
    use glam::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    const TOL: f32 = 1e-3;

    fn t_pose_input() -> FrameInput {
        let mut input = FrameInput::new(TargetPose::at(humanoid::HIPS));
        input.head = Some(TargetPose::at(humanoid::HEAD));
        input.left_hand = Some(TargetPose::at(humanoid::mirrored(Side::Left, humanoid::HAND)));
        input.right_hand = Some(TargetPose::at(humanoid::HAND));
        input
    }

    fn started(config: BodyConfig, input: &FrameInput) -> (Skeleton, BodyMovements) {
        let (skeleton, binding) = humanoid::t_pose().unwrap();
        let rig = BodyRig::initialize(&skeleton, &binding, config).unwrap();
        assert!(rig.is_t_pose_like(&skeleton));
        let body = rig.start(&skeleton, input).unwrap();
        (skeleton, body)
    }

    fn assert_all_finite(skeleton: &Skeleton) {
        for bone in skeleton.bones() {
            assert!(skeleton.world_rotation(bone).is_finite(), "{}", skeleton.name(bone));
            assert!(skeleton.world_position(bone).is_finite(), "{}", skeleton.name(bone));
        }
    }

    #[test]
    fn test_initialize_reports_missing_bone() {
        let (skeleton, binding) = humanoid::t_pose().unwrap();
        let mut partial = SkeletonBinding::new();
        for role in BoneRole::ALL {
            if role != BoneRole::RightLowerLeg {
                partial = partial.with(role, binding.get(role).unwrap());
            }
        }
        assert!(matches!(
            BodyRig::initialize(&skeleton, &partial, BodyConfig::default()),
            Err(RigError::MissingBone(BoneRole::RightLowerLeg))
        ));
    }

    #[test]
    fn test_t_pose_start_holds_pose() {
        let input = t_pose_input();
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);
        assert_eq!(body.calibration().plan, CalibrationPlan::uniform(PoseKind::Neutral));

        body.step_frame(&mut skeleton, &input);
        for bone in skeleton.bones() {
            let rotation = skeleton.world_rotation(bone);
            let name = skeleton.name(bone);
            // Digits spread and rest away from the bind pose
            if name.contains(char::is_numeric) {
                continue;
            }
            assert!(
                rotation.angle_between(Quat::IDENTITY) < 0.01,
                "{} rotated to {:?}",
                name,
                rotation
            );
        }
        let hand = skeleton.world_position(body.rig().arm(Side::Right).end);
        assert!(hand.abs_diff_eq(humanoid::HAND, TOL), "hand {:?}", hand);
    }

    #[test]
    fn test_hands_follow_targets() {
        let mut input = t_pose_input();
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        let right = Vec3::new(0.35, 1.3, 0.3);
        let left = Vec3::new(-0.3, 1.6, 0.25);
        input.right_hand = Some(TargetPose::at(right));
        input.left_hand = Some(TargetPose::new(left, Quat::from_rotation_z(0.4)));
        body.step_frame(&mut skeleton, &input);

        let hand = |side| skeleton.world_position(body.rig().arm(side).end);
        assert!(hand(Side::Right).distance(right) < TOL, "right {:?}", hand(Side::Right));
        assert!(hand(Side::Left).distance(left) < TOL, "left {:?}", hand(Side::Left));
        assert_all_finite(&skeleton);
    }

    #[test]
    fn test_missing_foot_targets_stay_planted() {
        let input = t_pose_input();
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        let mut lowered = input;
        lowered.hips.position.y -= 0.1;
        lowered.head = Some(TargetPose::at(humanoid::HEAD - Vec3::Y * 0.1));
        body.step_frame(&mut skeleton, &lowered);

        let hips = skeleton.world_position(body.rig().torso().hips);
        assert!((hips.y - 0.9).abs() < TOL, "hips {:?}", hips);
        for side in Side::BOTH {
            let leg = body.rig().leg(side);
            let foot = skeleton.world_position(leg.end);
            let expected = humanoid::mirrored(side, humanoid::FOOT);
            assert!(foot.abs_diff_eq(expected, TOL), "{:?} foot {:?}", side, foot);
            let knee = skeleton.world_position(leg.mid);
            assert!(knee.z > 0.0, "{:?} knee should bend forward, got {:?}", side, knee);
        }
    }

    #[test]
    fn test_legs_disabled_keep_hip_height() {
        let input = t_pose_input();
        let config = BodyConfig {
            enable_legs: false,
            ..BodyConfig::default()
        };
        let (mut skeleton, mut body) = started(config, &input);

        let mut moved = input;
        moved.hips.position += Vec3::new(0.2, -0.3, 0.1);
        body.step_frame(&mut skeleton, &moved);

        let hips = skeleton.world_position(body.rig().torso().hips);
        assert!(hips.abs_diff_eq(Vec3::new(0.2, 1.0, 0.1), TOL), "hips {:?}", hips);
    }

    #[test]
    fn test_torso_disabled_leaves_hips() {
        let input = t_pose_input();
        let config = BodyConfig {
            enable_torso: false,
            ..BodyConfig::default()
        };
        let (mut skeleton, mut body) = started(config, &input);

        let mut moved = input;
        moved.hips = TargetPose::new(Vec3::new(0.3, 0.9, 0.2), Quat::from_rotation_y(0.8));
        body.step_frame(&mut skeleton, &moved);

        let hips = body.rig().torso().hips;
        assert!(skeleton.world_position(hips).abs_diff_eq(humanoid::HIPS, TOL));
        assert!(skeleton.world_rotation(hips).abs_diff_eq(Quat::IDENTITY, TOL));
    }

    #[test]
    fn test_auto_bend_without_head() {
        let mut input = t_pose_input();
        input.head = None;
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.left_hand = Some(TargetPose::at(Vec3::new(-0.2, 1.45, 0.85)));
        input.right_hand = Some(TargetPose::at(Vec3::new(0.6, 1.4, 0.1)));
        body.step_frame(&mut skeleton, &input);

        let bend = body.auto_bend().bend_angle;
        assert!((bend - 67.62).abs() < 0.1, "bend {}", bend);
        assert!(!body.auto_bend().crouching);
        let spine_up = skeleton.world_rotation(body.rig().torso().spine).up();
        assert!(spine_up.z > 0.9, "spine up {:?}", spine_up);
        assert_all_finite(&skeleton);
    }

    #[test]
    fn test_auto_bend_turns_spine_with_hips() {
        let mut input = FrameInput::new(TargetPose::at(humanoid::HIPS));
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.hips = TargetPose::new(humanoid::HIPS, Quat::from_rotation_y(FRAC_PI_2));
        body.step_frame(&mut skeleton, &input);

        let torso = body.rig().torso();
        let hips = skeleton.world_rotation(torso.hips).forward();
        let spine = skeleton.world_rotation(torso.spine).forward();
        assert!(hips.abs_diff_eq(Vec3::X, TOL), "hips {:?}", hips);
        assert!(spine.abs_diff_eq(Vec3::X, TOL), "spine {:?}", spine);
        assert_eq!(body.auto_bend().bend_angle, 0.0);
    }

    #[test]
    fn test_auto_bend_follows_walked_hips() {
        let mut input = t_pose_input();
        input.head = None;
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        // Same reach as the bend test, 1.5 to the right
        let walk = Vec3::new(1.5, 0.0, 0.0);
        input.hips.position += walk;
        input.left_hand = Some(TargetPose::at(Vec3::new(-0.2, 1.45, 0.85) + walk));
        input.right_hand = Some(TargetPose::at(Vec3::new(0.6, 1.4, 0.1) + walk));
        body.step_frame(&mut skeleton, &input);

        let bend = body.auto_bend().bend_angle;
        assert!((bend - 67.62).abs() < 0.1, "bend {}", bend);
        let hips = skeleton.world_position(body.rig().torso().hips);
        assert!(hips.abs_diff_eq(humanoid::HIPS + walk, TOL), "hips {:?}", hips);
        let spine_up = skeleton.world_rotation(body.rig().torso().spine).up();
        assert!(spine_up.z > 0.9, "spine up {:?}", spine_up);
    }

    #[test]
    fn test_auto_bend_crouches_at_limit() {
        let mut input = t_pose_input();
        input.head = None;
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.left_hand = Some(TargetPose::at(Vec3::new(-0.2, 0.3, 0.6)));
        input.right_hand = Some(TargetPose::at(Vec3::new(0.6, 1.4, 0.1)));
        body.step_frame(&mut skeleton, &input);

        assert_eq!(body.auto_bend().bend_angle, 70.0);
        assert!(body.auto_bend().crouching);
        let hips = skeleton.world_position(body.rig().torso().hips);
        assert!(hips.y < 0.7, "hips {:?}", hips);
        assert_all_finite(&skeleton);
    }

    #[test]
    fn test_target_set_change_recalibrates() {
        let mut input = t_pose_input();
        input.head = None;
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.left_hand = Some(TargetPose::at(Vec3::new(-0.2, 1.45, 0.85)));
        body.step_frame(&mut skeleton, &input);
        assert!(body.auto_bend().bend_angle > 0.0);

        // A head target appears: limb offsets are recaptured, the torso
        // measurements and AutoBend state carry over
        let torso = body.calibration().torso;
        let bend = body.auto_bend().bend_angle;
        input.head = Some(TargetPose::at(humanoid::HEAD));
        body.step_frame(&mut skeleton, &input);
        assert_eq!(body.calibration().plan.arms, [PoseKind::Tracked; 2]);
        assert_eq!(body.calibration().torso, torso);
        assert_eq!(body.auto_bend().bend_angle, bend);

        // An explicit recalibration starts AutoBend over
        body.recalibrate(&skeleton, &input).unwrap();
        assert_eq!(body.auto_bend().bend_angle, 0.0);
    }

    #[test]
    fn test_hand_dropout_while_crouched_recovers() {
        let mut input = t_pose_input();
        input.head = None;
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.left_hand = Some(TargetPose::at(Vec3::new(-0.2, 0.3, 0.6)));
        input.right_hand = Some(TargetPose::at(Vec3::new(0.6, 1.4, 0.1)));
        body.step_frame(&mut skeleton, &input);
        assert!(body.auto_bend().crouching);

        // Right controller drops out for a frame
        input.right_hand = None;
        body.step_frame(&mut skeleton, &input);

        input.left_hand = Some(TargetPose::at(Vec3::new(-0.5, 1.3, 0.2)));
        input.right_hand = Some(TargetPose::at(Vec3::new(0.5, 1.3, 0.2)));
        for _ in 0..10 {
            body.step_frame(&mut skeleton, &input);
        }

        let torso = body.rig().torso();
        assert!(!body.auto_bend().crouching);
        assert!((body.calibration().torso.hip_start_position.y - 1.0).abs() < TOL);
        let hips = skeleton.world_position(torso.hips);
        assert!((hips.y - 1.0).abs() < TOL, "hips {:?}", hips);
        let spine = skeleton.world_rotation(torso.spine);
        assert!(spine.angle_between(Quat::IDENTITY) < 0.01, "spine {:?}", spine);
        assert_all_finite(&skeleton);
    }

    #[test]
    fn test_non_finite_hips_skip_frame() {
        let input = t_pose_input();
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        let mut broken = input;
        broken.hips = TargetPose::at(Vec3::splat(f32::NAN));
        body.step_frame(&mut skeleton, &broken);
        assert_all_finite(&skeleton);

        // Invalid hand targets count as absent
        let mut broken = input;
        broken.right_hand = Some(TargetPose::at(Vec3::new(f32::INFINITY, 0.0, 0.0)));
        body.step_frame(&mut skeleton, &broken);
        assert_all_finite(&skeleton);
    }

    #[test]
    fn test_grab_and_fingers() {
        let mut input = t_pose_input();
        let (mut skeleton, mut body) = started(BodyConfig::default(), &input);

        input.fingers_right = [1.0; Digit::COUNT];
        for _ in 0..10 {
            body.step_frame(&mut skeleton, &input);
        }
        body.grab(Side::Right);
        assert!(body.has_grabbed(Side::Right));
        assert!(!body.has_grabbed(Side::Left));

        input.fingers_right = [0.0; Digit::COUNT];
        body.step_frame(&mut skeleton, &input);
        assert!(!body.has_grabbed(Side::Right));
    }

    #[test]
    fn test_stop_and_restart() {
        let input = t_pose_input();
        let (skeleton, body) = started(BodyConfig::default(), &input);
        let rig = body.stop();
        let body = rig.clone().start(&skeleton, &input).unwrap();
        assert_eq!(body.rig(), &rig);
    }
}
