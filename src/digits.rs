//! Finger and thumb curling from scalar inputs.

use crate::math::{angle_axis, QuatAxes};
use crate::rig::{BoneHandle, BoneRole, Digit, SceneGraph, Side, SkeletonBinding};
use glam::{Quat, Vec3};

/// Longest phalanx chain followed from a digit root
pub const MAX_PHALANGES: usize = 3;

/// Curl of the thumb at full input, degrees
const THUMB_CURL: f32 = 50.0;
/// Thumb rest pose pre-rotation, degrees
const THUMB_REST: f32 = -20.0;

/// Smoothed curl value with an optional grab latch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurlState {
    value: f32,
    input: f32,
    grab_amount: f32,
}

impl CurlState {
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn input(&self) -> f32 {
        self.input
    }

    #[inline]
    pub fn has_grabbed(&self) -> bool {
        self.grab_amount > 0.0
    }

    /// Hold the current value until the input drops below it
    pub fn grab(&mut self) {
        self.grab_amount = self.value;
    }

    /// Advance one frame. While latched the value holds; otherwise it moves
    /// toward `input` by at most `speed`.
    pub fn update(&mut self, input: f32, speed: f32) -> f32 {
        self.input = if input.is_finite() { input.clamp(0.0, 1.0) } else { 0.0 };

        if self.has_grabbed() {
            self.value = self.grab_amount;
        } else {
            let speed = speed.max(0.0);
            let d = self.input - self.value;
            self.value = (self.value + d.clamp(-speed, speed)).clamp(0.0, 1.0);
        }

        if self.has_grabbed() && self.input < self.grab_amount {
            self.grab_amount = 0.0;
        }
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Phalanx {
    bone: BoneHandle,
    rest: Quat,
    /// Curl axis in the phalanx's rest frame
    curl_axis: Vec3,
    /// Spread axis in the phalanx's rest frame
    spread_axis: Vec3,
}

impl Phalanx {
    fn bend<G: SceneGraph>(&self, graph: &mut G, curl: f32, spread: f32) {
        let rotation =
            self.rest * angle_axis(curl, self.curl_axis) * angle_axis(spread, self.spread_axis);
        graph.set_local_rotation(self.bone, rotation);
    }
}

/// Follow single-child links from `root`, up to [`MAX_PHALANGES`] bones
pub fn phalanx_chain<G: SceneGraph>(graph: &G, root: BoneHandle) -> Vec<BoneHandle> {
    let mut chain = vec![root];
    while chain.len() < MAX_PHALANGES {
        match graph.children(chain[chain.len() - 1]) {
            [only] => chain.push(*only),
            _ => break,
        }
    }
    chain
}

/// Index, middle, ring or little finger
#[derive(Debug, Clone, PartialEq)]
pub struct Finger {
    digit: Digit,
    phalanges: Vec<Phalanx>,
    pub curl: CurlState,
}

impl Finger {
    /// `curl_axis` and `spread_axis` are world directions in the bind pose
    pub fn bind<G: SceneGraph>(
        graph: &G,
        digit: Digit,
        root: BoneHandle,
        curl_axis: Vec3,
        spread_axis: Vec3,
    ) -> Self {
        let phalanges = phalanx_chain(graph, root)
            .into_iter()
            .map(|bone| {
                let to_rest = graph.world_rotation(bone).inverse();
                Phalanx {
                    bone,
                    rest: graph.local_rotation(bone),
                    curl_axis: to_rest * curl_axis,
                    spread_axis: to_rest * spread_axis,
                }
            })
            .collect();

        Self {
            digit,
            phalanges,
            curl: CurlState::default(),
        }
    }

    pub fn phalanx_count(&self) -> usize {
        self.phalanges.len()
    }

    pub fn update<G: SceneGraph>(&mut self, graph: &mut G, input: f32, speed: f32) {
        let value = self.curl.update(input, speed);
        let spread = (0.1 - value).max(0.0) * 20.0 * (self.digit.index() as f32 - 2.0);

        let curls: &[f32] = match self.phalanges.len() {
            3 => &[45.0, 90.0, 90.0],
            2 => &[90.0, 90.0],
            _ => &[135.0],
        };
        for (phalanx, curl) in self.phalanges.iter().zip(curls) {
            phalanx.bend(graph, value * curl, spread);
        }
    }
}

/// Thumb: a single rotation of its root bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thumb {
    bone: BoneHandle,
    rest: Quat,
    axis: Vec3,
    pub curl: CurlState,
}

impl Thumb {
    /// `axis` is the world curl direction in the bind pose
    pub fn bind<G: SceneGraph>(graph: &G, bone: BoneHandle, axis: Vec3) -> Self {
        let axis = graph.world_rotation(bone).inverse() * axis;
        Self {
            bone,
            rest: graph.local_rotation(bone) * angle_axis(THUMB_REST, axis),
            axis,
            curl: CurlState::default(),
        }
    }

    pub fn update<G: SceneGraph>(&mut self, graph: &mut G, input: f32, speed: f32) {
        let value = self.curl.update(input, speed);
        graph.set_local_rotation(self.bone, self.rest * angle_axis(value * THUMB_CURL, self.axis));
    }
}

/// All digits of one hand. Unbound digits are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct HandDigits {
    pub side: Side,
    thumb: Option<Thumb>,
    fingers: [Option<Finger>; 4],
}

impl HandDigits {
    /// Bind the digits of `side` in the bind pose. Fingers curl about the
    /// axis opposite the hips' forward on the right hand (and along it on the
    /// left); spread and thumb axes are derived with the forearm direction.
    pub fn bind<G: SceneGraph>(graph: &G, binding: &SkeletonBinding, side: Side) -> Self {
        let [_, forearm_role, hand_role] = BoneRole::arm(side);
        let forearm_axis = match (binding.get(forearm_role), binding.get(hand_role)) {
            (Some(forearm), Some(hand)) => {
                (graph.world_position(hand) - graph.world_position(forearm)).normalize_or_zero()
            }
            _ => Vec3::ZERO,
        };
        let hips_forward = binding
            .get(BoneRole::Hips)
            .map(|hips| graph.world_rotation(hips).forward())
            .unwrap_or(Vec3::Z);

        let curl_axis = -side.sign() * hips_forward;
        let spread_axis = curl_axis.cross(forearm_axis);
        let thumb_axis = match side {
            Side::Left => -curl_axis.cross(forearm_axis),
            Side::Right => curl_axis.cross(forearm_axis),
        };

        let thumb = binding
            .digit(side, Digit::Thumb)
            .map(|bone| Thumb::bind(graph, bone, thumb_axis));
        let fingers = [Digit::Index, Digit::Middle, Digit::Ring, Digit::Little].map(|digit| {
            binding
                .digit(side, digit)
                .map(|root| Finger::bind(graph, digit, root, curl_axis, spread_axis))
        });

        let bound = fingers.iter().flatten().count() + thumb.iter().count();
        log::debug!("{:?} hand: {} of {} digits bound", side, bound, Digit::COUNT);

        Self {
            side,
            thumb,
            fingers,
        }
    }

    /// Inputs are ordered thumb first
    pub fn update<G: SceneGraph>(
        &mut self,
        graph: &mut G,
        inputs: &[f32; Digit::COUNT],
        speed: f32,
    ) {
        if let Some(thumb) = &mut self.thumb {
            thumb.update(graph, inputs[Digit::Thumb.index()], speed);
        }
        for finger in self.fingers.iter_mut().flatten() {
            let input = inputs[finger.digit.index()];
            finger.update(graph, input, speed);
        }
    }

    /// Latch every digit at its current curl
    pub fn grab(&mut self) {
        if let Some(thumb) = &mut self.thumb {
            thumb.curl.grab();
        }
        for finger in self.fingers.iter_mut().flatten() {
            finger.curl.grab();
        }
    }

    pub fn has_grabbed(&self) -> bool {
        self.fingers.iter().flatten().any(|f| f.curl.has_grabbed())
    }

    pub fn finger(&self, digit: Digit) -> Option<&Finger> {
        match digit {
            Digit::Thumb => None,
            _ => self.fingers[digit.index() - 1].as_ref(),
        }
    }

    pub fn thumb(&self) -> Option<&Thumb> {
        self.thumb.as_ref()
    }
}
