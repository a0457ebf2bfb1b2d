use super::cache::WorldCache;
use crate::error::RigError;
use glam::{Quat, Vec3, Vec3A};
use std::cell::RefCell;

/// Opaque handle to a node of a scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneHandle(u32);

impl BoneHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The transform operations the body solver performs on a character.
///
/// Implemented by [`Skeleton`]; engines with their own scene graph can
/// implement it over their node handles instead.
pub trait SceneGraph {
    fn contains(&self, bone: BoneHandle) -> bool;
    fn children(&self, bone: BoneHandle) -> &[BoneHandle];

    fn world_position(&self, bone: BoneHandle) -> Vec3;
    fn world_rotation(&self, bone: BoneHandle) -> Quat;
    fn local_rotation(&self, bone: BoneHandle) -> Quat;

    /// Set the world rotation; descendants follow
    fn set_world_rotation(&mut self, bone: BoneHandle, rotation: Quat);
    /// Move the bone in world space; descendants follow
    fn set_world_position(&mut self, bone: BoneHandle, position: Vec3);
    fn set_local_rotation(&mut self, bone: BoneHandle, rotation: Quat);
}

#[derive(Debug, Clone)]
struct BoneNode {
    name: String,
    parent: Option<BoneHandle>,
    children: Vec<BoneHandle>,
    local_position: Vec3,
    local_rotation: Quat,
}

/// Hierarchical skeleton with local transforms and lazily evaluated world
/// transforms.
///
/// Bones are stored parents-before-children: a bone can only be added once
/// its parent exists, so index order is a valid traversal order.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    nodes: Vec<BoneNode>,
    cache: RefCell<WorldCache>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bone. `local_position` and `local_rotation` are relative to
    /// the parent (world space for roots).
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneHandle>,
        local_position: Vec3,
        local_rotation: Quat,
    ) -> Result<BoneHandle, RigError> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(RigError::DuplicateBone(name));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(RigError::UnknownParent(name));
            }
        }

        let handle = BoneHandle(self.nodes.len() as u32);
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(handle);
        }
        self.nodes.push(BoneNode {
            name,
            parent,
            children: Vec::new(),
            local_position,
            local_rotation: local_rotation.normalize(),
        });
        self.cache.get_mut().push();
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look a bone up by name
    pub fn find(&self, name: &str) -> Option<BoneHandle> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| BoneHandle(i as u32))
    }

    pub fn name(&self, bone: BoneHandle) -> &str {
        &self.nodes[bone.index()].name
    }

    pub fn parent(&self, bone: BoneHandle) -> Option<BoneHandle> {
        self.nodes[bone.index()].parent
    }

    pub fn local_position(&self, bone: BoneHandle) -> Vec3 {
        self.nodes[bone.index()].local_position
    }

    /// All handles in traversal order
    pub fn bones(&self) -> impl Iterator<Item = BoneHandle> + '_ {
        (0..self.nodes.len()).map(|i| BoneHandle(i as u32))
    }

    /// Mark a bone and all its descendants as needing recomputation
    fn mark_dirty(&mut self, bone: BoneHandle) {
        let cache = self.cache.get_mut();
        let mut stack = vec![bone];
        while let Some(b) = stack.pop() {
            cache.dirty[b.index()] = true;
            stack.extend_from_slice(&self.nodes[b.index()].children);
        }
    }

    /// Ensure a bone's world transform is computed
    fn ensure_computed(&self, bone: BoneHandle) {
        if !self.cache.borrow().is_dirty(bone.index()) {
            return;
        }

        // Collect dirty ancestors, then compute them root-first
        let mut chain = vec![bone];
        let mut current = self.nodes[bone.index()].parent;
        while let Some(parent) = current {
            if !self.cache.borrow().is_dirty(parent.index()) {
                break;
            }
            chain.push(parent);
            current = self.nodes[parent.index()].parent;
        }

        for b in chain.into_iter().rev() {
            self.compute_bone(b);
        }
    }

    /// Compute the world transform for a single bone; its parent must be clean
    fn compute_bone(&self, bone: BoneHandle) {
        let node = &self.nodes[bone.index()];
        let mut cache = self.cache.borrow_mut();

        let (parent_pos, parent_rot) = match node.parent {
            Some(parent) => (
                Vec3::from(cache.world_positions[parent.index()]),
                cache.world_rotations[parent.index()],
            ),
            None => (Vec3::ZERO, Quat::IDENTITY),
        };

        let world_rot = (parent_rot * node.local_rotation).normalize();
        let world_pos = parent_pos + parent_rot * node.local_position;

        cache.world_rotations[bone.index()] = world_rot;
        cache.world_positions[bone.index()] = Vec3A::from(world_pos);
        cache.clear(bone.index());
    }

    /// Force recomputation of all bones
    pub fn compute_all(&self) {
        for bone in self.bones() {
            self.compute_bone(bone);
        }
    }

    fn parent_transform(&self, bone: BoneHandle) -> (Vec3, Quat) {
        match self.nodes[bone.index()].parent {
            Some(parent) => (self.world_position(parent), self.world_rotation(parent)),
            None => (Vec3::ZERO, Quat::IDENTITY),
        }
    }
}

impl SceneGraph for Skeleton {
    fn contains(&self, bone: BoneHandle) -> bool {
        bone.index() < self.nodes.len()
    }

    fn children(&self, bone: BoneHandle) -> &[BoneHandle] {
        &self.nodes[bone.index()].children
    }

    fn world_position(&self, bone: BoneHandle) -> Vec3 {
        self.ensure_computed(bone);
        Vec3::from(self.cache.borrow().world_positions[bone.index()])
    }

    fn world_rotation(&self, bone: BoneHandle) -> Quat {
        self.ensure_computed(bone);
        self.cache.borrow().world_rotations[bone.index()]
    }

    fn local_rotation(&self, bone: BoneHandle) -> Quat {
        self.nodes[bone.index()].local_rotation
    }

    fn set_world_rotation(&mut self, bone: BoneHandle, rotation: Quat) {
        let (_, parent_rot) = self.parent_transform(bone);
        self.set_local_rotation(bone, parent_rot.inverse() * rotation);
    }

    fn set_world_position(&mut self, bone: BoneHandle, position: Vec3) {
        let (parent_pos, parent_rot) = self.parent_transform(bone);
        let local = parent_rot.inverse() * (position - parent_pos);
        if self.nodes[bone.index()].local_position != local {
            self.nodes[bone.index()].local_position = local;
            self.mark_dirty(bone);
        }
    }

    fn set_local_rotation(&mut self, bone: BoneHandle, rotation: Quat) {
        let rotation = rotation.normalize();
        if self.nodes[bone.index()].local_rotation != rotation {
            self.nodes[bone.index()].local_rotation = rotation;
            self.mark_dirty(bone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const TOL: f32 = 1e-5;

    fn two_link() -> (Skeleton, BoneHandle, BoneHandle, BoneHandle) {
        let mut skeleton = Skeleton::new();
        let root = skeleton
            .add_bone("root", None, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)
            .unwrap();
        let mid = skeleton
            .add_bone("mid", Some(root), Vec3::X, Quat::IDENTITY)
            .unwrap();
        let tip = skeleton
            .add_bone("tip", Some(mid), Vec3::X, Quat::IDENTITY)
            .unwrap();
        (skeleton, root, mid, tip)
    }

    #[test]
    fn test_forward_kinematics_positions() {
        let (skeleton, root, mid, tip) = two_link();
        assert!(skeleton.world_position(root).abs_diff_eq(Vec3::Y, TOL));
        assert!(skeleton.world_position(mid).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), TOL));
        assert!(skeleton.world_position(tip).abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), TOL));
    }

    #[test]
    fn test_world_rotation_moves_descendants() {
        let (mut skeleton, root, mid, tip) = two_link();
        skeleton.set_world_rotation(root, Quat::from_rotation_z(FRAC_PI_2));

        assert!(skeleton.world_position(mid).abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), TOL));
        assert!(skeleton.world_position(tip).abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), TOL));

        // Setting the child's world rotation is independent of the parent's
        skeleton.set_world_rotation(mid, Quat::IDENTITY);
        assert!(skeleton.world_rotation(mid).abs_diff_eq(Quat::IDENTITY, TOL));
        assert!(skeleton.world_position(tip).abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), TOL));
    }

    #[test]
    fn test_dirty_propagation() {
        let (mut skeleton, root, mid, tip) = two_link();
        skeleton.compute_all();
        assert!(!skeleton.cache.borrow().is_any_dirty());

        skeleton.set_local_rotation(mid, Quat::from_rotation_y(0.3));
        let cache = skeleton.cache.borrow();
        assert!(!cache.is_dirty(root.index()));
        assert!(cache.is_dirty(mid.index()));
        assert!(cache.is_dirty(tip.index()));
    }

    #[test]
    fn test_set_world_position_under_rotated_parent() {
        let (mut skeleton, root, mid, _) = two_link();
        skeleton.set_world_rotation(root, Quat::from_rotation_y(0.8));
        let target = Vec3::new(0.3, 0.4, -0.2);
        skeleton.set_world_position(mid, target);
        assert!(skeleton.world_position(mid).abs_diff_eq(target, TOL));
    }

    #[test]
    fn test_add_bone_rejects_duplicates_and_unknown_parents() {
        let (mut skeleton, _, _, _) = two_link();
        assert!(matches!(
            skeleton.add_bone("mid", None, Vec3::ZERO, Quat::IDENTITY),
            Err(RigError::DuplicateBone(_))
        ));
        assert!(matches!(
            skeleton.add_bone("ghost", Some(BoneHandle(42)), Vec3::ZERO, Quat::IDENTITY),
            Err(RigError::UnknownParent(_))
        ));
    }
}
