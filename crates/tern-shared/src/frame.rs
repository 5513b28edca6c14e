use serde::{Deserialize, Serialize};

/// Frame type tags, carried in the low 7 bits of the first byte of every
/// frame. The MSB is the encoding flag (see [`jtp`]), not part of the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameType {
    Register = 1,
    Token = 2,
    Auth = 3,
    Ack = 4,
    Ping = 5,
    Message = 6,
    RevokeMessage = 7,
    BurnMessage = 8,
    Presence = 9,
    Stream = 10,
    OfflineMsg = 11,
    PullMessage = 12,
    BroadPresence = 13,
    Business = 14,
    VRoom = 15,
    Nodes = 16,
}

impl FrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x7f {
            1 => Some(Self::Register),
            2 => Some(Self::Token),
            3 => Some(Self::Auth),
            4 => Some(Self::Ack),
            5 => Some(Self::Ping),
            6 => Some(Self::Message),
            7 => Some(Self::RevokeMessage),
            8 => Some(Self::BurnMessage),
            9 => Some(Self::Presence),
            10 => Some(Self::Stream),
            11 => Some(Self::OfflineMsg),
            12 => Some(Self::PullMessage),
            13 => Some(Self::BroadPresence),
            14 => Some(Self::Business),
            15 => Some(Self::VRoom),
            16 => Some(Self::Nodes),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Data-plane frames are gated by admission control; everything else is
    /// control-plane and dispatched unconditionally.
    pub fn is_data_plane(self) -> bool {
        matches!(
            self,
            Self::Message | Self::RevokeMessage | Self::BurnMessage | Self::Presence | Self::Stream
        )
    }
}

/// Whether the frame requests the text-oriented encoding (MSB set).
pub fn jtp(b: u8) -> bool {
    b & 0x80 == 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte_roundtrip() {
        for tag in 1u8..=16 {
            let t = FrameType::from_byte(tag).unwrap();
            assert_eq!(t.tag(), tag);
            // Encoding flag must not change the tag.
            assert_eq!(FrameType::from_byte(tag | 0x80), Some(t));
        }
    }

    #[test]
    fn test_unknown_tags_rejected() {
        assert_eq!(FrameType::from_byte(0), None);
        assert_eq!(FrameType::from_byte(17), None);
        assert_eq!(FrameType::from_byte(0x7f), None);
    }

    #[test]
    fn test_jtp_flag() {
        assert!(jtp(0x80));
        assert!(jtp(FrameType::Register.tag() | 0x80));
        assert!(!jtp(FrameType::Register.tag()));
        assert!(!jtp(0x7f));
    }

    #[test]
    fn test_data_plane_classes() {
        assert!(FrameType::Message.is_data_plane());
        assert!(FrameType::RevokeMessage.is_data_plane());
        assert!(FrameType::BurnMessage.is_data_plane());
        assert!(FrameType::Presence.is_data_plane());
        assert!(FrameType::Stream.is_data_plane());

        assert!(!FrameType::Auth.is_data_plane());
        assert!(!FrameType::Ping.is_data_plane());
        assert!(!FrameType::Nodes.is_data_plane());
    }
}
