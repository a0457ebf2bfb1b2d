//! Body sessions behind integer handles.
//!
//! Each session owns a skeleton and the movements driving it. The wasm
//! bindings are thin wrappers that look a session up by handle and call the
//! plain functions here, so everything below is testable natively.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::Serialize;

use crate::body::{BodyMovements, BodyRig};
use crate::config::BodyConfig;
use crate::error::RigError;
use crate::rig::{humanoid, CharacterDef, SceneGraph, Side, Skeleton, SkeletonBinding};
use crate::target::FrameInput;

pub type BodyHandle = u32;

/// World transform of one bone, as handed to the host renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonePose {
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

/// A character and the movements driving it
pub struct BodySession {
    pub skeleton: Skeleton,
    pub movements: BodyMovements,
}

impl BodySession {
    /// Build the character in its bind pose and calibrate against `input`.
    /// Without a definition the reference humanoid is used.
    pub fn new(
        character: Option<&CharacterDef>,
        config: BodyConfig,
        input: &FrameInput,
    ) -> Result<Self, RigError> {
        let (skeleton, binding) = match character {
            Some(def) => {
                let skeleton = def.skeleton.build()?;
                let binding = SkeletonBinding::resolve(&skeleton, &def.humanoid)?;
                (skeleton, binding)
            }
            None => humanoid::t_pose()?,
        };

        let rig = BodyRig::initialize(&skeleton, &binding, config)?;
        let movements = rig.start(&skeleton, input)?;
        Ok(Self {
            skeleton,
            movements,
        })
    }

    pub fn step(&mut self, input: &FrameInput) {
        self.movements.step_frame(&mut self.skeleton, input);
    }

    pub fn recalibrate(&mut self, input: &FrameInput) -> Result<(), RigError> {
        self.movements.recalibrate(&self.skeleton, input)
    }

    pub fn grab(&mut self, side: Side) {
        self.movements.grab(side);
    }

    /// Current world transform of every bone, parents first
    pub fn bone_poses(&self) -> Vec<BonePose> {
        self.skeleton
            .bones()
            .map(|bone| BonePose {
                name: self.skeleton.name(bone).to_string(),
                position: self.skeleton.world_position(bone).to_array(),
                rotation: self.skeleton.world_rotation(bone).to_array(),
            })
            .collect()
    }
}

/// Live sessions keyed by handle. Handles are never reused.
#[derive(Default)]
pub struct BodyRegistry {
    sessions: HashMap<BodyHandle, BodySession>,
    next_handle: BodyHandle,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: BodySession) -> BodyHandle {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.sessions.insert(handle, session);
        handle
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Option<BodySession> {
        self.sessions.remove(&handle)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&BodySession> {
        self.sessions.get(&handle)
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut BodySession> {
        self.sessions.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// Global registry, thin wrapper for WASM bindings only
thread_local! {
    static BODIES: RefCell<BodyRegistry> = RefCell::new(BodyRegistry::new());
}

/// Execute a closure with immutable access to the registry
pub fn with_bodies<F, R>(f: F) -> R
where
    F: FnOnce(&BodyRegistry) -> R,
{
    BODIES.with(|bodies| f(&bodies.borrow()))
}

/// Execute a closure with mutable access to the registry
pub fn with_bodies_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut BodyRegistry) -> R,
{
    BODIES.with(|bodies| f(&mut bodies.borrow_mut()))
}
