use crate::rig::{BoneRole, Digit, Side};
use thiserror::Error;

/// Structural misconfiguration discovered while binding or calibrating a
/// rig. Nothing past initialization returns these; a frame step always
/// produces usable rotations.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("required bone {0:?} is not bound")]
    MissingBone(BoneRole),

    #[error("bone '{name}' mapped to {role:?} does not exist in the skeleton")]
    UnknownBone { role: BoneRole, name: String },

    #[error("{side:?} {digit:?} is bound to a bone outside the skeleton")]
    UnknownDigitBone { side: Side, digit: Digit },

    #[error("bone '{0}' is defined twice")]
    DuplicateBone(String),

    #[error("parent of bone '{0}' is not defined before it")]
    UnknownParent(String),

    #[error("{side:?} {limb} has a zero-length segment (upper {upper:.4}, lower {lower:.4})")]
    ZeroLengthSegment {
        side: Side,
        limb: &'static str,
        upper: f32,
        lower: f32,
    },

    #[error("torso has zero length between spine and shoulders")]
    ZeroLengthTorso,

    #[error("failed to parse definition: {0}")]
    Parse(#[from] serde_json::Error),
}
