//! Character skeleton: bone roles, the scene graph, JSON definitions and the
//! role binding table.

pub mod binding;
pub mod cache;
pub mod def;
pub mod humanoid;
pub mod id;
pub mod skeleton;

pub use binding::*;
pub use def::*;
pub use id::*;
pub use skeleton::*;
