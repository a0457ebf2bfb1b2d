use glam::{Quat, Vec3A};

/// Cache for forward kinematics results.
///
/// World transforms are computed lazily; `dirty[i]` marks bone `i` as
/// needing recomputation.
#[derive(Debug, Clone, Default)]
pub struct WorldCache {
    pub world_positions: Vec<Vec3A>,
    pub world_rotations: Vec<Quat>,
    pub dirty: Vec<bool>,
}

impl WorldCache {
    /// Append a slot for a newly added bone, marked dirty
    pub fn push(&mut self) {
        self.world_positions.push(Vec3A::ZERO);
        self.world_rotations.push(Quat::IDENTITY);
        self.dirty.push(true);
    }

    #[inline]
    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty[index]
    }

    #[inline]
    pub fn is_any_dirty(&self) -> bool {
        self.dirty.iter().any(|d| *d)
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        self.dirty[index] = false;
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = true);
    }
}
