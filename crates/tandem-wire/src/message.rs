//! The control message.
//!
//! Payload on the control channel is unstructured bytes. A chunk is a control
//! message only if, once trailing NUL padding is removed, it equals
//! `ROLE_SWITCH` ignoring ASCII case.

/// Wire token requesting a role exchange.
pub const ROLE_SWITCH: &str = "ROLE_SWITCH";

/// The only message ever sent on a control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    RoleSwitch,
}

impl ControlMessage {
    /// Bytes written to the wire.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            ControlMessage::RoleSwitch => ROLE_SWITCH.as_bytes(),
        }
    }

    /// Interpret one read chunk. Returns `None` for anything that is not a
    /// control message.
    pub fn parse(chunk: &[u8]) -> Option<Self> {
        let mut end = chunk.len();
        while end > 0 && chunk[end - 1] == 0 {
            end -= 1;
        }
        let text = std::str::from_utf8(&chunk[..end]).ok()?;
        if text.eq_ignore_ascii_case(ROLE_SWITCH) {
            Some(ControlMessage::RoleSwitch)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_token() {
        assert_eq!(
            ControlMessage::parse(b"ROLE_SWITCH"),
            Some(ControlMessage::RoleSwitch)
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            ControlMessage::parse(b"role_switch"),
            Some(ControlMessage::RoleSwitch)
        );
        assert_eq!(
            ControlMessage::parse(b"Role_Switch"),
            Some(ControlMessage::RoleSwitch)
        );
    }

    #[test]
    fn test_parse_strips_trailing_nul_padding() {
        let mut padded = b"ROLE_SWITCH".to_vec();
        padded.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            ControlMessage::parse(&padded),
            Some(ControlMessage::RoleSwitch)
        );
    }

    #[test]
    fn test_parse_ignores_other_content() {
        assert_eq!(ControlMessage::parse(b""), None);
        assert_eq!(ControlMessage::parse(b"hello"), None);
        assert_eq!(ControlMessage::parse(b"ROLE_SWITCHX"), None);
        assert_eq!(ControlMessage::parse(b" ROLE_SWITCH"), None);
        assert_eq!(ControlMessage::parse(&[0xff, 0xfe, 0x00]), None);
    }

    #[test]
    fn test_as_bytes_parses_back() {
        let bytes = ControlMessage::RoleSwitch.as_bytes();
        assert_eq!(bytes, b"ROLE_SWITCH");
        assert_eq!(ControlMessage::parse(bytes), Some(ControlMessage::RoleSwitch));
    }
}
