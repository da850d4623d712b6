use serde::Serialize;

/// Control operation: check the server speaks AGDirect. Takes the client
/// protocol level, answers with a version string.
pub const OP_VERIFY: &str = ":verify";
/// Control operation: orderly goodbye, sent one-way.
pub const OP_DISCONNECT: &str = ":disconnect";

/// Every valid `:verify` answer starts with this.
pub const VERIFY_PREFIX: &str = "AGDirect Version";

const SERVER_LEVEL_MARKER: &str = "server level";

/// What the server reported in answer to `:verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// The full version string.
    pub version: String,
    /// Protocol level announced as `server level N`, if present.
    pub server_level: Option<u32>,
}

impl ServerInfo {
    /// Parse a `:verify` answer; `None` unless it starts with [`VERIFY_PREFIX`].
    pub fn parse(answer: &str) -> Option<Self> {
        if !answer.starts_with(VERIFY_PREFIX) {
            return None;
        }
        let server_level = answer.find(SERVER_LEVEL_MARKER).and_then(|at| {
            let rest = answer[at + SERVER_LEVEL_MARKER.len()..].trim_start();
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        });
        Some(Self {
            version: answer.to_string(),
            server_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_and_level() {
        let info = ServerInfo::parse("AGDirect Version 3.2 server level 2").unwrap();
        assert_eq!(info.server_level, Some(2));
        assert_eq!(info.version, "AGDirect Version 3.2 server level 2");
    }

    #[test]
    fn level_is_optional() {
        let info = ServerInfo::parse("AGDirect Version 1.0").unwrap();
        assert_eq!(info.server_level, None);
        let info = ServerInfo::parse("AGDirect Version 1.0 server level ?").unwrap();
        assert_eq!(info.server_level, None);
    }

    #[test]
    fn rejects_foreign_answers() {
        assert!(ServerInfo::parse("HTTP/1.1 400 Bad Request").is_none());
        assert!(ServerInfo::parse("").is_none());
    }
}
