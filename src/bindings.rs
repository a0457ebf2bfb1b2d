//! Handle-based wasm API.
//!
//! Frame inputs and bone poses cross the boundary as plain JS objects via
//! `serde-wasm-bindgen`; definitions and configuration as JSON strings.

use wasm_bindgen::prelude::*;

use crate::config::BodyConfig;
use crate::rig::{CharacterDef, Side};
use crate::state::{with_bodies, with_bodies_mut, BodyHandle, BodySession};
use crate::target::FrameInput;

fn to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn no_session(handle: BodyHandle) -> JsValue {
    JsValue::from_str(&format!("No body with handle {}", handle))
}

/// Install the panic hook and console logger. Safe to call more than once.
#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();
    cfg_if::cfg_if! {
        if #[cfg(debug_assertions)] {
            console_log::init_with_level(log::Level::Debug).ok();
        } else {
            console_log::init_with_level(log::Level::Info).ok();
        }
    }
}

/// Create a body and calibrate it against the first frame.
///
/// `character_json` is a character definition (skeleton plus humanoid map);
/// without one the reference humanoid is used. `config_json` may be empty.
#[wasm_bindgen]
pub fn create_body(
    character_json: Option<String>,
    config_json: Option<String>,
    input: JsValue,
) -> Result<BodyHandle, JsValue> {
    let character = character_json
        .as_deref()
        .map(CharacterDef::from_json)
        .transpose()
        .map_err(to_js)?;
    let config = match config_json.as_deref() {
        Some(json) if !json.trim().is_empty() => BodyConfig::from_json(json).map_err(to_js)?,
        _ => BodyConfig::default(),
    };
    let input: FrameInput = serde_wasm_bindgen::from_value(input)?;

    let session = BodySession::new(character.as_ref(), config, &input).map_err(to_js)?;
    let handle = with_bodies_mut(|bodies| bodies.insert(session));
    log::info!("Created body {}", handle);
    Ok(handle)
}

/// Drive a body for one frame
#[wasm_bindgen]
pub fn step_body(handle: BodyHandle, input: JsValue) -> Result<(), JsValue> {
    let input: FrameInput = serde_wasm_bindgen::from_value(input)?;
    with_bodies_mut(|bodies| {
        let session = bodies.get_mut(handle).ok_or_else(|| no_session(handle))?;
        session.step(&input);
        Ok(())
    })
}

/// Recalibrate a body against its current pose
#[wasm_bindgen]
pub fn recalibrate_body(handle: BodyHandle, input: JsValue) -> Result<(), JsValue> {
    let input: FrameInput = serde_wasm_bindgen::from_value(input)?;
    with_bodies_mut(|bodies| {
        let session = bodies.get_mut(handle).ok_or_else(|| no_session(handle))?;
        session.recalibrate(&input).map_err(to_js)
    })
}

/// Latch the digits of one hand (`"left"` or `"right"`)
#[wasm_bindgen]
pub fn grab_hand(handle: BodyHandle, side: JsValue) -> Result<(), JsValue> {
    let side: Side = serde_wasm_bindgen::from_value(side)?;
    with_bodies_mut(|bodies| {
        let session = bodies.get_mut(handle).ok_or_else(|| no_session(handle))?;
        session.grab(side);
        Ok(())
    })
}

/// World position and rotation of every bone as `{ name, position, rotation }`
#[wasm_bindgen]
pub fn body_bone_rotations(handle: BodyHandle) -> Result<JsValue, JsValue> {
    let poses = with_bodies(|bodies| bodies.get(handle).map(BodySession::bone_poses))
        .ok_or_else(|| no_session(handle))?;
    Ok(serde_wasm_bindgen::to_value(&poses)?)
}

/// Drop a body. Returns false for an unknown handle.
#[wasm_bindgen]
pub fn destroy_body(handle: BodyHandle) -> bool {
    let removed = with_bodies_mut(|bodies| bodies.remove(handle)).is_some();
    if removed {
        log::info!("Destroyed body {}", handle);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::humanoid;
    use crate::target::TargetPose;
    use wasm_bindgen_test::*;

    fn input() -> JsValue {
        let input = FrameInput::new(TargetPose::at(humanoid::HIPS));
        serde_wasm_bindgen::to_value(&input).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_body_lifecycle() {
        let handle = create_body(None, None, input()).unwrap();
        step_body(handle, input()).unwrap();
        grab_hand(handle, JsValue::from_str("left")).unwrap();

        let poses = body_bone_rotations(handle).unwrap();
        assert!(pose_count(&poses) > 0);

        assert!(destroy_body(handle));
        assert!(!destroy_body(handle));
        assert!(step_body(handle, input()).is_err());
    }

    #[wasm_bindgen_test]
    fn test_bad_config_is_rejected() {
        assert!(create_body(None, Some("{ not json".to_string()), input()).is_err());
    }

    fn pose_count(value: &JsValue) -> usize {
        let poses: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(value.clone()).unwrap();
        poses.len()
    }
}
