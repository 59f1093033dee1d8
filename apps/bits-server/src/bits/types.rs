//! Protocol constants and packet types

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Request method token BITS clients use
pub const DEFAULT_METHOD: &str = "BITS_POST";

/// BITS 1.5 Upload Protocol
pub const DEFAULT_PROTOCOL: &str = "{7df0354d-249b-430f-820d-3d2a9bef4931}";

/// Name of the temp directory created under the system temp dir
pub const DEFAULT_TEMP_DIR_NAME: &str = "bits-server";

/// Catch-all allow pattern used when none is configured
pub const DEFAULT_ALLOW_PATTERN: &str = ".*";

/// Value of `BITS-Packet-Type` on every response
pub const ACK: &str = "Ack";

// ============================================================================
// Header Names
// ============================================================================

pub mod headers {
    pub const PACKET_TYPE: &str = "BITS-Packet-Type";
    pub const SESSION_ID: &str = "BITS-Session-Id";
    pub const SUPPORTED_PROTOCOLS: &str = "BITS-Supported-Protocols";
    pub const PROTOCOL: &str = "BITS-Protocol";
    pub const ERROR_CODE: &str = "BITS-Error-Code";
    pub const ERROR_CONTEXT: &str = "BITS-Error-Context";
    pub const RECEIVED_CONTENT_RANGE: &str = "BITS-Received-Content-Range";
    pub const CONTENT_RANGE: &str = "Content-Range";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
}

// ============================================================================
// Packet Type
// ============================================================================

/// Declared operation of an inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ping,
    CreateSession,
    CancelSession,
    CloseSession,
    Fragment,
}

impl PacketType {
    /// Parse the `BITS-Packet-Type` header value, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ping" => Some(Self::Ping),
            "create-session" => Some(Self::CreateSession),
            "cancel-session" => Some(Self::CancelSession),
            "close-session" => Some(Self::CloseSession),
            "fragment" => Some(Self::Fragment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::CreateSession => "create-session",
            Self::CancelSession => "cancel-session",
            Self::CloseSession => "close-session",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_is_case_insensitive() {
        assert_eq!(PacketType::parse("Create-Session"), Some(PacketType::CreateSession));
        assert_eq!(PacketType::parse("FRAGMENT"), Some(PacketType::Fragment));
        assert_eq!(PacketType::parse("ping"), Some(PacketType::Ping));
        assert_eq!(PacketType::parse("close-session"), Some(PacketType::CloseSession));
        assert_eq!(PacketType::parse("Cancel-Session"), Some(PacketType::CancelSession));
    }

    #[test]
    fn test_unknown_packet_type() {
        assert_eq!(PacketType::parse(""), None);
        assert_eq!(PacketType::parse("upload-reply"), None);
        assert_eq!(PacketType::parse("fragment "), None);
    }
}
