use super::def::HumanoidMap;
use super::id::{BoneRole, Digit, Side};
use super::skeleton::{BoneHandle, SceneGraph, Skeleton};
use crate::error::RigError;

/// Explicit role → bone table, built once before initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkeletonBinding {
    bones: [Option<BoneHandle>; BoneRole::COUNT],
    digits: [[Option<BoneHandle>; Digit::COUNT]; 2],
}

impl SkeletonBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new binding with `role` bound (Functional Set)
    pub fn with(mut self, role: BoneRole, bone: BoneHandle) -> Self {
        self.bones[role.index()] = Some(bone);
        self
    }

    /// Return a new binding with a digit root bound (Functional Set)
    pub fn with_digit(mut self, side: Side, digit: Digit, bone: BoneHandle) -> Self {
        self.digits[side.index()][digit.index()] = Some(bone);
        self
    }

    /// Resolve bone names against a skeleton. Unknown names are errors;
    /// unmapped roles stay unbound and are reported by [`Self::validate`].
    pub fn resolve(skeleton: &Skeleton, map: &HumanoidMap) -> Result<Self, RigError> {
        let mut binding = Self::new();
        for (&role, name) in &map.bones {
            let bone = skeleton.find(name).ok_or_else(|| RigError::UnknownBone {
                role,
                name: name.clone(),
            })?;
            binding = binding.with(role, bone);
        }

        for side in Side::BOTH {
            let hand = map.hand(side);
            for digit in Digit::ALL {
                if let Some(name) = hand.get(digit) {
                    match skeleton.find(name) {
                        Some(bone) => binding = binding.with_digit(side, digit, bone),
                        None => log::warn!(
                            "{:?} {:?} bone '{}' not found, digit disabled",
                            side,
                            digit,
                            name
                        ),
                    }
                }
            }
        }

        binding.validate(skeleton)?;
        Ok(binding)
    }

    /// Check every required role is bound to a node of `graph`
    pub fn validate<G: SceneGraph>(&self, graph: &G) -> Result<(), RigError> {
        for role in BoneRole::ALL {
            match self.bones[role.index()] {
                Some(bone) if !graph.contains(bone) => return Err(RigError::MissingBone(role)),
                None if !role.is_optional() => return Err(RigError::MissingBone(role)),
                _ => {}
            }
        }
        for side in Side::BOTH {
            for digit in Digit::ALL {
                match self.digit(side, digit) {
                    Some(bone) if !graph.contains(bone) => {
                        return Err(RigError::UnknownDigitBone { side, digit })
                    }
                    _ => {}
                }
            }
        }
        self.neck_or_head().map(|_| ())
    }

    #[inline]
    pub fn get(&self, role: BoneRole) -> Option<BoneHandle> {
        self.bones[role.index()]
    }

    pub fn require(&self, role: BoneRole) -> Result<BoneHandle, RigError> {
        self.get(role).ok_or(RigError::MissingBone(role))
    }

    /// The bone the head orientation is applied to: the neck, or the head
    /// when the rig has no neck.
    pub fn neck_or_head(&self) -> Result<BoneHandle, RigError> {
        match (self.get(BoneRole::Neck), self.get(BoneRole::Head)) {
            (Some(neck), _) => Ok(neck),
            (None, Some(head)) => {
                log::warn!("No neck bone bound, using the head bone instead");
                Ok(head)
            }
            (None, None) => Err(RigError::MissingBone(BoneRole::Neck)),
        }
    }

    #[inline]
    pub fn digit(&self, side: Side, digit: Digit) -> Option<BoneHandle> {
        self.digits[side.index()][digit.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::humanoid;
    use glam::{Quat, Vec3};

    #[test]
    fn test_missing_required_bone_is_reported() {
        let (skeleton, binding) = humanoid::t_pose().unwrap();
        let mut map = humanoid::humanoid_map();
        map.bones.remove(&BoneRole::LeftForearm);

        assert!(binding.validate(&skeleton).is_ok());
        assert!(matches!(
            SkeletonBinding::resolve(&skeleton, &map),
            Err(RigError::MissingBone(BoneRole::LeftForearm))
        ));
    }

    #[test]
    fn test_unknown_bone_name_is_reported() {
        let (skeleton, _) = humanoid::t_pose().unwrap();
        let mut map = humanoid::humanoid_map();
        map.bones.insert(BoneRole::Spine, "no_such_bone".to_string());

        assert!(matches!(
            SkeletonBinding::resolve(&skeleton, &map),
            Err(RigError::UnknownBone { role: BoneRole::Spine, .. })
        ));
    }

    #[test]
    fn test_neck_falls_back_to_head() {
        let (skeleton, binding) = humanoid::t_pose().unwrap();
        let head = binding.get(BoneRole::Head).unwrap();
        let mut without_neck = SkeletonBinding::new();
        for role in BoneRole::ALL {
            if role != BoneRole::Neck {
                without_neck = without_neck.with(role, binding.get(role).unwrap());
            }
        }

        assert!(without_neck.validate(&skeleton).is_ok());
        assert_eq!(without_neck.neck_or_head().unwrap(), head);
    }

    #[test]
    fn test_digit_outside_skeleton_is_reported() {
        let (skeleton, binding) = humanoid::t_pose().unwrap();

        // A handle from a larger skeleton points past the end of this one
        let mut other = Skeleton::new();
        let mut parent = None;
        for i in 0..=skeleton.len() {
            let bone = other
                .add_bone(format!("bone{i}"), parent, Vec3::X, Quat::IDENTITY)
                .unwrap();
            parent = Some(bone);
        }
        let foreign = parent.unwrap();
        assert!(!skeleton.contains(foreign));

        let broken = binding.with_digit(Side::Left, Digit::Index, foreign);
        assert!(matches!(
            broken.validate(&skeleton),
            Err(RigError::UnknownDigitBone {
                side: Side::Left,
                digit: Digit::Index
            })
        ));
    }

    #[test]
    fn test_resolve_matches_builder_binding() {
        let (skeleton, binding) = humanoid::t_pose().unwrap();
        let resolved = SkeletonBinding::resolve(&skeleton, &humanoid::humanoid_map()).unwrap();
        assert_eq!(resolved, binding);
    }
}
