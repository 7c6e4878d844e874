//! Robot identity and configuration types shared by every crate.
//!
//! A robot is identified on the mesh by a 64-bit address.  Two external
//! renderings of that address exist:
//!
//! | Rendering | Used by |
//! |---|---|
//! | 16 lowercase hex digits, high word first ([`RobotAddress::shadow_key`]) | Shadow documents exchanged with the cloud |
//! | low 16 bits ([`RobotAddress::mesh_address`]) | Outbound link commands (`SetMovementConfig`, `SetLightConfig`) |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of a shadow document robot key.
pub const SHADOW_KEY_LEN: usize = 16;

/// 64-bit mesh identifier of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotAddress(pub u64);

impl RobotAddress {
    /// Render as the shadow document key: 8 hex digits of the high word
    /// followed by 8 hex digits of the low word.
    pub fn shadow_key(self) -> String {
        format!("{:08x}{:08x}", self.0 >> 32, self.0 & 0xffff_ffff)
    }

    /// Parse a shadow document key.
    ///
    /// Only exactly 16 lowercase hex digits are accepted; anything else
    /// (uppercase, `0x` prefix, sign, whitespace, short keys) returns `None`.
    pub fn parse_shadow_key(key: &str) -> Option<Self> {
        if key.len() != SHADOW_KEY_LEN {
            return None;
        }
        if !key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        let high = u32::from_str_radix(&key[..8], 16).ok()?;
        let low = u32::from_str_radix(&key[8..], 16).ok()?;
        Some(Self((u64::from(high) << 32) | u64::from(low)))
    }

    /// Address used in outbound link frames.
    pub fn mesh_address(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Display for RobotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shadow_key())
    }
}

impl From<u64> for RobotAddress {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Per-robot configuration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RobotState {
    /// Idle; no configuration in flight.
    #[default]
    Ready,
    /// A movement configuration was sent and is awaiting acceptance.
    Configuring,
    /// Configuration accepted; the robot waits for the fleet-wide go-ahead.
    Configured,
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotState::Ready => write!(f, "ready"),
            RobotState::Configuring => write!(f, "configuring"),
            RobotState::Configured => write!(f, "configured"),
        }
    }
}

/// LED animation: colour plus duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedConfig {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub time_ms: u32,
}

/// Everything the fleet knows about one robot's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RobotConfig {
    pub drive_time_ms: u32,
    /// Signed rotation in degrees.
    pub rotation_deg: i32,
    /// 0..=100.
    pub speed_pct: u8,
    pub led: LedConfig,
    /// Last observed revolution count.
    pub revolutions: i32,
}
