//! JSON skeleton definitions.
//!
//! A definition lists bones parent-first with their local offset and an
//! optional local rotation in Euler degrees. A [`HumanoidMap`] names which
//! bone plays which [`BoneRole`].

use super::id::{BoneRole, Digit, Side};
use super::skeleton::Skeleton;
use crate::error::RigError;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Euler angles in degrees for JSON authoring (more intuitive than quaternions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct EulerAngles {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl EulerAngles {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Convert to quaternion (XYZ order)
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(
            glam::EulerRot::XYZ,
            self.x.to_radians(),
            self.y.to_radians(),
            self.z.to_radians(),
        )
    }

    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// One bone of a skeleton definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoneDefJson {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Offset from the parent joint in the parent's frame
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub rotation: Option<EulerAngles>,
}

/// Skeleton definition in JSON format
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SkeletonDef {
    pub bones: Vec<BoneDefJson>,
}

impl SkeletonDef {
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the scene graph. Parents must precede their children.
    pub fn build(&self) -> Result<Skeleton, RigError> {
        let mut skeleton = Skeleton::new();
        for bone in &self.bones {
            let parent = match &bone.parent {
                Some(name) => Some(
                    skeleton
                        .find(name)
                        .ok_or_else(|| RigError::UnknownParent(bone.name.clone()))?,
                ),
                None => None,
            };
            let rotation = bone.rotation.map(|e| e.to_quat()).unwrap_or(Quat::IDENTITY);
            skeleton.add_bone(
                bone.name.clone(),
                parent,
                Vec3::from_array(bone.offset),
                rotation,
            )?;
        }
        Ok(skeleton)
    }
}

/// Digit root bone names for one hand
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HandMap {
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub middle: Option<String>,
    #[serde(default)]
    pub ring: Option<String>,
    #[serde(default)]
    pub little: Option<String>,
}

impl HandMap {
    pub fn get(&self, digit: Digit) -> Option<&str> {
        match digit {
            Digit::Thumb => self.thumb.as_deref(),
            Digit::Index => self.index.as_deref(),
            Digit::Middle => self.middle.as_deref(),
            Digit::Ring => self.ring.as_deref(),
            Digit::Little => self.little.as_deref(),
        }
    }
}

/// Bone names for each humanoid role
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HumanoidMap {
    pub bones: HashMap<BoneRole, String>,
    #[serde(default)]
    pub left_hand: HandMap,
    #[serde(default)]
    pub right_hand: HandMap,
}

impl HumanoidMap {
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn hand(&self, side: Side) -> &HandMap {
        match side {
            Side::Left => &self.left_hand,
            Side::Right => &self.right_hand,
        }
    }
}

/// Skeleton definition plus role mapping, the unit a host loads a character from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CharacterDef {
    pub skeleton: SkeletonDef,
    pub humanoid: HumanoidMap,
}

impl CharacterDef {
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::SceneGraph;

    #[test]
    fn test_skeleton_def_parsing_and_build() {
        let json = r#"{
            "bones": [
                { "name": "hips", "offset": [0, 1, 0] },
                { "name": "spine", "parent": "hips", "offset": [0, 0.1, 0] },
                { "name": "neck", "parent": "spine", "offset": [0, 0.4, 0],
                  "rotation": { "y": 90 } }
            ]
        }"#;

        let def = SkeletonDef::from_json(json).unwrap();
        let skeleton = def.build().unwrap();
        assert_eq!(skeleton.len(), 3);

        let neck = skeleton.find("neck").unwrap();
        assert!((skeleton.world_position(neck).y - 1.5).abs() < 1e-5);
        let forward = skeleton.world_rotation(neck) * Vec3::Z;
        assert!(forward.abs_diff_eq(Vec3::X, 1e-5), "got {:?}", forward);
    }

    #[test]
    fn test_skeleton_def_rejects_child_before_parent() {
        let json = r#"{ "bones": [ { "name": "spine", "parent": "hips" } ] }"#;
        let def = SkeletonDef::from_json(json).unwrap();
        assert!(matches!(def.build(), Err(RigError::UnknownParent(_))));
    }

    #[test]
    fn test_humanoid_map_parsing() {
        let json = r#"{
            "bones": { "hips": "pelvis", "left_hand": "hand_l" },
            "right_hand": { "thumb": "thumb_r" }
        }"#;
        let map = HumanoidMap::from_json(json).unwrap();
        assert_eq!(map.bones[&BoneRole::Hips], "pelvis");
        assert_eq!(map.bones[&BoneRole::LeftHand], "hand_l");
        assert_eq!(map.hand(Side::Right).get(Digit::Thumb), Some("thumb_r"));
        assert_eq!(map.hand(Side::Left).get(Digit::Index), None);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            SkeletonDef::from_json("{ bones: }"),
            Err(RigError::Parse(_))
        ));
    }
}
