use static_assertions::const_assert_eq;

/// Body side of a limb or hand.
///
/// Right is the +X side of the character, which faces +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// +1 for right, -1 for left. Every mirrored formula goes through this.
    #[inline]
    pub const fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Humanoid bone roles the solver needs bound to a skeleton node.
/// Ordered for topological traversal (parents before children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BoneRole {
    // Root
    Hips = 0,

    // Spine chain
    Spine = 1,
    Neck = 2,
    Head = 3,

    // Left arm chain
    LeftUpperArm = 4,
    LeftForearm = 5,
    LeftHand = 6,

    // Right arm chain
    RightUpperArm = 7,
    RightForearm = 8,
    RightHand = 9,

    // Left leg chain
    LeftUpperLeg = 10,
    LeftLowerLeg = 11,
    LeftFoot = 12,

    // Right leg chain
    RightUpperLeg = 13,
    RightLowerLeg = 14,
    RightFoot = 15,
}

impl BoneRole {
    /// Total number of roles
    pub const COUNT: usize = 16;

    /// Convert to array index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// All roles in topological order
    pub const ALL: [BoneRole; Self::COUNT] = [
        BoneRole::Hips,
        BoneRole::Spine,
        BoneRole::Neck,
        BoneRole::Head,
        BoneRole::LeftUpperArm,
        BoneRole::LeftForearm,
        BoneRole::LeftHand,
        BoneRole::RightUpperArm,
        BoneRole::RightForearm,
        BoneRole::RightHand,
        BoneRole::LeftUpperLeg,
        BoneRole::LeftLowerLeg,
        BoneRole::LeftFoot,
        BoneRole::RightUpperLeg,
        BoneRole::RightLowerLeg,
        BoneRole::RightFoot,
    ];

    /// Roles that may be left unbound. A missing neck falls back to the head.
    #[inline]
    pub const fn is_optional(self) -> bool {
        matches!(self, BoneRole::Neck | BoneRole::Head)
    }

    /// Upper arm, forearm and hand for a side
    pub const fn arm(side: Side) -> [BoneRole; 3] {
        match side {
            Side::Left => [BoneRole::LeftUpperArm, BoneRole::LeftForearm, BoneRole::LeftHand],
            Side::Right => [
                BoneRole::RightUpperArm,
                BoneRole::RightForearm,
                BoneRole::RightHand,
            ],
        }
    }

    /// Upper leg, lower leg and foot for a side
    pub const fn leg(side: Side) -> [BoneRole; 3] {
        match side {
            Side::Left => [BoneRole::LeftUpperLeg, BoneRole::LeftLowerLeg, BoneRole::LeftFoot],
            Side::Right => [
                BoneRole::RightUpperLeg,
                BoneRole::RightLowerLeg,
                BoneRole::RightFoot,
            ],
        }
    }
}

const_assert_eq!(BoneRole::COUNT, BoneRole::RightFoot as usize + 1);

/// Digits of one hand, thumb first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Digit {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Little = 4,
}

impl Digit {
    pub const COUNT: usize = 5;

    pub const ALL: [Digit; Self::COUNT] = [
        Digit::Thumb,
        Digit::Index,
        Digit::Middle,
        Digit::Ring,
        Digit::Little,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

const_assert_eq!(Digit::COUNT, Digit::Little as usize + 1);
