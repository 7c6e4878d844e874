//! Link wire format.
//!
//! Every frame is one tag byte followed by a fixed, kind-specific payload.
//! There is no length field; the tag alone determines the frame length.
//! Multi-byte fields are big-endian.
//!
//! | Tag | Kind | Payload | Frame length |
//! |---|---|---|---|
//! | `0x00` | [`MessageKind::Hello`] | `echo: u16` | 3 |
//! | `0x01` | [`MessageKind::SetMovementConfig`] | `addr: u16, time_ms: u32, angle_deg: i32` | 11 |
//! | `0x02` | [`MessageKind::SetLightConfig`] | `addr: u16, r: u8, g: u8, b: u8, time_ms: u32` | 10 |
//! | `0x03` | [`MessageKind::RobotAdded`] | `addr: u64` | 9 |
//! | `0x04` | [`MessageKind::Status`] | `status: i16` | 3 |
//! | `0x05` | [`MessageKind::MovementReported`] | `addr: u64, x: i32, y: i32, yaw: i32` | 21 |
//! | `0x06` | [`MessageKind::ClearToMove`] | none | 1 |
//! | `0x07` | [`MessageKind::ConfigAck`] | `seq: i32` | 5 |

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::FramingError;
use crate::robot::RobotAddress;

/// Size of the frame header (the tag byte).
pub const HEADER_LEN: usize = 1;

/// Closed set of frame kinds understood on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    Hello = 0x00,
    SetMovementConfig = 0x01,
    SetLightConfig = 0x02,
    RobotAdded = 0x03,
    Status = 0x04,
    MovementReported = 0x05,
    ClearToMove = 0x06,
    ConfigAck = 0x07,
}

impl MessageKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x00 => Self::Hello,
            0x01 => Self::SetMovementConfig,
            0x02 => Self::SetLightConfig,
            0x03 => Self::RobotAdded,
            0x04 => Self::Status,
            0x05 => Self::MovementReported,
            0x06 => Self::ClearToMove,
            0x07 => Self::ConfigAck,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Total frame length, header included.
    pub fn frame_len(self) -> usize {
        match self {
            Self::Hello => 3,
            Self::SetMovementConfig => 11,
            Self::SetLightConfig => 10,
            Self::RobotAdded => 9,
            Self::Status => 3,
            Self::MovementReported => 21,
            Self::ClearToMove => 1,
            Self::ConfigAck => 5,
        }
    }

    pub fn payload_len(self) -> usize {
        self.frame_len() - HEADER_LEN
    }
}

/// One complete frame.
///
/// Fields are private: a `LinkMessage` always carries exactly
/// `kind.payload_len()` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Bytes", into = "Bytes")]
pub struct LinkMessage {
    kind: MessageKind,
    payload: Bytes,
}

impl LinkMessage {
    /// Build a message from a kind and its payload (header excluded).
    pub fn new(kind: MessageKind, payload: Bytes) -> Result<Self, FramingError> {
        if payload.len() != kind.payload_len() {
            return Err(FramingError::LengthMismatch {
                kind,
                expected: kind.payload_len(),
                actual: payload.len(),
            });
        }
        Ok(Self { kind, payload })
    }

    /// Build a message from a complete frame (header included).
    pub fn from_frame(mut frame: Bytes) -> Result<Self, FramingError> {
        if frame.is_empty() {
            return Err(FramingError::UnknownKind(0xff));
        }
        let tag = frame.get_u8();
        let kind = MessageKind::from_tag(tag).ok_or(FramingError::UnknownKind(tag))?;
        Self::new(kind, frame)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to wire bytes (header followed by payload).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.kind.frame_len());
        buf.put_u8(self.kind.tag());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Typed view of this frame.
    pub fn decode(&self) -> WireMessage {
        let mut p = self.payload.clone();
        match self.kind {
            MessageKind::Hello => WireMessage::Hello { echo: p.get_u16() },
            MessageKind::SetMovementConfig => WireMessage::SetMovementConfig {
                addr: p.get_u16(),
                time_ms: p.get_u32(),
                angle_deg: p.get_i32(),
            },
            MessageKind::SetLightConfig => WireMessage::SetLightConfig {
                addr: p.get_u16(),
                r: p.get_u8(),
                g: p.get_u8(),
                b: p.get_u8(),
                time_ms: p.get_u32(),
            },
            MessageKind::RobotAdded => WireMessage::RobotAdded {
                address: RobotAddress(p.get_u64()),
            },
            MessageKind::Status => WireMessage::Status { status: p.get_i16() },
            MessageKind::MovementReported => WireMessage::MovementReported {
                address: RobotAddress(p.get_u64()),
                x: p.get_i32(),
                y: p.get_i32(),
                yaw: p.get_i32(),
            },
            MessageKind::ClearToMove => WireMessage::ClearToMove,
            MessageKind::ConfigAck => WireMessage::ConfigAck { seq: p.get_i32() },
        }
    }
}

impl From<LinkMessage> for Bytes {
    fn from(msg: LinkMessage) -> Self {
        msg.to_bytes()
    }
}

impl TryFrom<Bytes> for LinkMessage {
    type Error = FramingError;

    fn try_from(frame: Bytes) -> Result<Self, Self::Error> {
        Self::from_frame(frame)
    }
}

/// Decoded contents of a [`LinkMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    Hello {
        echo: u16,
    },
    SetMovementConfig {
        addr: u16,
        time_ms: u32,
        angle_deg: i32,
    },
    SetLightConfig {
        addr: u16,
        r: u8,
        g: u8,
        b: u8,
        time_ms: u32,
    },
    RobotAdded {
        address: RobotAddress,
    },
    Status {
        status: i16,
    },
    MovementReported {
        address: RobotAddress,
        x: i32,
        y: i32,
        yaw: i32,
    },
    ClearToMove,
    ConfigAck {
        seq: i32,
    },
}

impl WireMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Hello { .. } => MessageKind::Hello,
            Self::SetMovementConfig { .. } => MessageKind::SetMovementConfig,
            Self::SetLightConfig { .. } => MessageKind::SetLightConfig,
            Self::RobotAdded { .. } => MessageKind::RobotAdded,
            Self::Status { .. } => MessageKind::Status,
            Self::MovementReported { .. } => MessageKind::MovementReported,
            Self::ClearToMove => MessageKind::ClearToMove,
            Self::ConfigAck { .. } => MessageKind::ConfigAck,
        }
    }

    pub fn encode(&self) -> LinkMessage {
        let kind = self.kind();
        let mut p = BytesMut::with_capacity(kind.payload_len());
        match *self {
            Self::Hello { echo } => p.put_u16(echo),
            Self::SetMovementConfig {
                addr,
                time_ms,
                angle_deg,
            } => {
                p.put_u16(addr);
                p.put_u32(time_ms);
                p.put_i32(angle_deg);
            }
            Self::SetLightConfig {
                addr,
                r,
                g,
                b,
                time_ms,
            } => {
                p.put_u16(addr);
                p.put_u8(r);
                p.put_u8(g);
                p.put_u8(b);
                p.put_u32(time_ms);
            }
            Self::RobotAdded { address } => p.put_u64(address.0),
            Self::Status { status } => p.put_i16(status),
            Self::MovementReported { address, x, y, yaw } => {
                p.put_u64(address.0);
                p.put_i32(x);
                p.put_i32(y);
                p.put_i32(yaw);
            }
            Self::ClearToMove => {}
            Self::ConfigAck { seq } => p.put_i32(seq),
        }
        LinkMessage {
            kind,
            payload: p.freeze(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [MessageKind; 8] = [
        MessageKind::Hello,
        MessageKind::SetMovementConfig,
        MessageKind::SetLightConfig,
        MessageKind::RobotAdded,
        MessageKind::Status,
        MessageKind::MovementReported,
        MessageKind::ClearToMove,
        MessageKind::ConfigAck,
    ];

    #[test]
    fn tags_are_dense_and_unique() {
        for (i, kind) in ALL_KINDS.iter().enumerate() {
            assert_eq!(kind.tag() as usize, i);
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(*kind));
        }
        assert_eq!(MessageKind::from_tag(0x08), None);
        assert_eq!(MessageKind::from_tag(0xff), None);
    }

    #[test]
    fn encoded_length_matches_table() {
        let samples = [
            WireMessage::Hello { echo: 0x1010 },
            WireMessage::SetMovementConfig { addr: 1, time_ms: 500, angle_deg: -90 },
            WireMessage::SetLightConfig { addr: 1, r: 255, g: 0, b: 10, time_ms: 100 },
            WireMessage::RobotAdded { address: RobotAddress(7) },
            WireMessage::Status { status: -3 },
            WireMessage::MovementReported { address: RobotAddress(7), x: 1, y: 2, yaw: 3 },
            WireMessage::ClearToMove,
            WireMessage::ConfigAck { seq: 42 },
        ];
        for msg in samples {
            let frame = msg.encode().to_bytes();
            assert_eq!(frame.len(), msg.kind().frame_len(), "{msg:?}");
            assert_eq!(frame[0], msg.kind().tag());
        }
    }

    #[test]
    fn movement_config_is_big_endian() {
        let frame = WireMessage::SetMovementConfig {
            addr: 0x0102,
            time_ms: 500,
            angle_deg: -1,
        }
        .encode()
        .to_bytes();
        assert_eq!(
            frame.as_ref(),
            &[0x01, 0x01, 0x02, 0x00, 0x00, 0x01, 0xf4, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn movement_reported_decodes_fields() {
        let raw = Bytes::from_static(&[
            0x05, 0, 0, 0, 0, 0, 0, 0, 0x2a, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xfe, 0, 0, 0, 9,
        ]);
        let msg = LinkMessage::from_frame(raw).unwrap();
        assert_eq!(
            msg.decode(),
            WireMessage::MovementReported {
                address: RobotAddress(0x2a),
                x: 1,
                y: -2,
                yaw: 9,
            }
        );
    }

    #[test]
    fn new_rejects_wrong_payload_length() {
        let err = LinkMessage::new(MessageKind::Hello, Bytes::from_static(&[1])).unwrap_err();
        assert_eq!(
            err,
            FramingError::LengthMismatch {
                kind: MessageKind::Hello,
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn from_frame_rejects_unknown_tag() {
        let err = LinkMessage::from_frame(Bytes::from_static(&[0x42, 0, 0])).unwrap_err();
        assert_eq!(err, FramingError::UnknownKind(0x42));
    }

    #[test]
    fn link_message_serde_uses_frame_bytes() {
        let msg = WireMessage::ConfigAck { seq: 5 }.encode();
        let json = serde_json::to_string(&msg).unwrap();
        let back: LinkMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
