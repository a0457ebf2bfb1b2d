//! Body Movements - Wasm Core
//!
//! Drives a humanoid skeleton from tracked head, hand, hip and foot targets:
//! analytic two-bone limbs, a torso that follows the head or bends toward
//! out-of-reach hands, and curling digits.

#[cfg(target_arch = "wasm32")]
mod bindings;
pub mod body;
pub mod calibration;
pub mod config;
pub mod digits;
pub mod error;
pub mod ik;
pub mod math;
pub mod rig;
pub mod state;
pub mod target;
pub mod torso;

#[cfg(target_arch = "wasm32")]
pub use bindings::{
    body_bone_rotations, create_body, destroy_body, grab_hand, init, recalibrate_body, step_body,
};

pub use body::{BodyMovements, BodyRig};
pub use calibration::{Calibration, CalibrationPlan, PoseKind};
pub use config::BodyConfig;
pub use error::RigError;
pub use glam::{Quat, Vec3};
pub use rig::{BoneHandle, BoneRole, Digit, SceneGraph, Side, Skeleton, SkeletonBinding};
pub use target::{FrameInput, TargetPose};
