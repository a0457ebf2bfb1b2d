//! Reference humanoid in T-pose.
//!
//! The character faces +Z with its right side on +X. All rest rotations are
//! identity, so every local offset is simply the difference of the world
//! joint positions below.

use super::binding::SkeletonBinding;
use super::def::{BoneDefJson, CharacterDef, HandMap, HumanoidMap, SkeletonDef};
use super::id::{BoneRole, Side};
use super::skeleton::Skeleton;
use crate::error::RigError;
use glam::Vec3;
use std::collections::HashMap;

pub const HIPS: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const SPINE: Vec3 = Vec3::new(0.0, 1.1, 0.0);
pub const NECK: Vec3 = Vec3::new(0.0, 1.5, 0.0);
pub const HEAD: Vec3 = Vec3::new(0.0, 1.65, 0.0);

// Right side; the left side mirrors X
pub const UPPER_ARM: Vec3 = Vec3::new(0.2, 1.45, 0.0);
pub const FOREARM: Vec3 = Vec3::new(0.5, 1.45, 0.0);
pub const HAND: Vec3 = Vec3::new(0.75, 1.45, 0.0);
pub const UPPER_LEG: Vec3 = Vec3::new(0.1, 0.95, 0.0);
pub const LOWER_LEG: Vec3 = Vec3::new(0.1, 0.5, 0.0);
pub const FOOT: Vec3 = Vec3::new(0.1, 0.08, 0.0);

/// Thumb root relative to the hand, then step per phalanx
const THUMB_ROOT: Vec3 = Vec3::new(0.03, 0.0, 0.04);
const THUMB_STEP: Vec3 = Vec3::new(0.025, 0.0, 0.01);

/// Finger roots relative to the hand (index to little), then step per phalanx
const FINGER_ROOTS: [Vec3; 4] = [
    Vec3::new(0.09, 0.0, 0.03),
    Vec3::new(0.09, 0.0, 0.01),
    Vec3::new(0.09, 0.0, -0.01),
    Vec3::new(0.09, 0.0, -0.03),
];
const FINGER_STEP: Vec3 = Vec3::new(0.03, 0.0, 0.0);

const DIGIT_NAMES: [&str; 5] = ["thumb", "index", "middle", "ring", "little"];

/// Place a right-side position on the given side
#[inline]
pub fn mirrored(side: Side, right: Vec3) -> Vec3 {
    Vec3::new(right.x * side.sign(), right.y, right.z)
}

fn suffix(side: Side) -> &'static str {
    match side {
        Side::Left => "l",
        Side::Right => "r",
    }
}

struct DefBuilder {
    bones: Vec<BoneDefJson>,
    world: HashMap<String, Vec3>,
}

impl DefBuilder {
    fn push(&mut self, name: String, parent: Option<&str>, world: Vec3) {
        let parent_world = parent
            .and_then(|p| self.world.get(p).copied())
            .unwrap_or(Vec3::ZERO);
        self.bones.push(BoneDefJson {
            name: name.clone(),
            parent: parent.map(str::to_string),
            offset: (world - parent_world).to_array(),
            rotation: None,
        });
        self.world.insert(name, world);
    }
}

/// The reference humanoid as a definition plus role mapping
pub fn definition() -> CharacterDef {
    let mut b = DefBuilder {
        bones: Vec::new(),
        world: HashMap::new(),
    };
    let mut roles = HashMap::new();

    b.push("hips".into(), None, HIPS);
    b.push("spine".into(), Some("hips"), SPINE);
    b.push("neck".into(), Some("spine"), NECK);
    b.push("head".into(), Some("neck"), HEAD);
    roles.insert(BoneRole::Hips, "hips".to_string());
    roles.insert(BoneRole::Spine, "spine".to_string());
    roles.insert(BoneRole::Neck, "neck".to_string());
    roles.insert(BoneRole::Head, "head".to_string());

    let mut hands = [HandMap::default(), HandMap::default()];

    for side in Side::BOTH {
        let s = suffix(side);
        let [upper_arm, forearm, hand] = BoneRole::arm(side);
        let [upper_leg, lower_leg, foot] = BoneRole::leg(side);

        let arm_names = [
            format!("upper_arm_{s}"),
            format!("forearm_{s}"),
            format!("hand_{s}"),
        ];
        b.push(arm_names[0].clone(), Some("spine"), mirrored(side, UPPER_ARM));
        b.push(arm_names[1].clone(), Some(arm_names[0].as_str()), mirrored(side, FOREARM));
        b.push(arm_names[2].clone(), Some(arm_names[1].as_str()), mirrored(side, HAND));
        roles.insert(upper_arm, arm_names[0].clone());
        roles.insert(forearm, arm_names[1].clone());
        roles.insert(hand, arm_names[2].clone());

        let leg_names = [
            format!("upper_leg_{s}"),
            format!("lower_leg_{s}"),
            format!("foot_{s}"),
        ];
        b.push(leg_names[0].clone(), Some("hips"), mirrored(side, UPPER_LEG));
        b.push(leg_names[1].clone(), Some(leg_names[0].as_str()), mirrored(side, LOWER_LEG));
        b.push(leg_names[2].clone(), Some(leg_names[1].as_str()), mirrored(side, FOOT));
        roles.insert(upper_leg, leg_names[0].clone());
        roles.insert(lower_leg, leg_names[1].clone());
        roles.insert(foot, leg_names[2].clone());

        let hand_map = &mut hands[side.index()];
        for (i, digit_name) in DIGIT_NAMES.iter().enumerate() {
            let (root, step) = if i == 0 {
                (THUMB_ROOT, THUMB_STEP)
            } else {
                (FINGER_ROOTS[i - 1], FINGER_STEP)
            };

            let mut parent = arm_names[2].clone();
            let mut pos = mirrored(side, HAND + root);
            for phalanx in 0..3 {
                let name = format!("{digit_name}{}_{s}", phalanx + 1);
                b.push(name.clone(), Some(parent.as_str()), pos);
                parent = name;
                pos += mirrored(side, step);
            }

            let root_name = Some(format!("{digit_name}1_{s}"));
            match i {
                0 => hand_map.thumb = root_name,
                1 => hand_map.index = root_name,
                2 => hand_map.middle = root_name,
                3 => hand_map.ring = root_name,
                _ => hand_map.little = root_name,
            }
        }
    }

    let [left_hand, right_hand] = hands;
    CharacterDef {
        skeleton: SkeletonDef { bones: b.bones },
        humanoid: HumanoidMap {
            bones: roles,
            left_hand,
            right_hand,
        },
    }
}

/// Role mapping of the reference humanoid
pub fn humanoid_map() -> HumanoidMap {
    definition().humanoid
}

/// Build the reference humanoid and its binding
pub fn t_pose() -> Result<(Skeleton, SkeletonBinding), RigError> {
    let def = definition();
    let skeleton = def.skeleton.build()?;
    let binding = SkeletonBinding::resolve(&skeleton, &def.humanoid)?;
    Ok((skeleton, binding))
}
