//! Source address extraction from free-text log messages

use regex::Regex;
use std::sync::LazyLock;

/// Four groups of one to three digits separated by dots
static RE_DOTTED_QUAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("regex")
});

/// Return the first dotted-quad in `message`, if any
///
/// Octets are not range checked: `999.1.1.1` matches, and so does a
/// four-part version string such as `6.49.10.1`. RouterOS login messages
/// put the peer address after `from`, so in practice the first match is the
/// source, but a message carrying a version number ahead of the address
/// yields the version.
pub fn extract_ip(message: &str) -> Option<&str> {
    RE_DOTTED_QUAD.find(message).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_address_from_login_failure() {
        assert_eq!(
            extract_ip("login failure from 192.168.1.50 port 22"),
            Some("192.168.1.50")
        );
    }

    #[test]
    fn test_routeros_message_formats() {
        assert_eq!(
            extract_ip("login failure for user admin from 10.0.0.5 via ssh"),
            Some("10.0.0.5")
        );
        assert_eq!(
            extract_ip("user root logged in from 172.16.4.2 via winbox"),
            Some("172.16.4.2")
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_ip("login failure for user admin via web"), None);
        assert_eq!(extract_ip("10.0.0 is not a full address"), None);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(extract_ip("1.1.1.1 then 2.2.2.2"), Some("1.1.1.1"));
    }

    #[test]
    fn test_permissive_octets() {
        assert_eq!(extract_ip("denied 999.300.1.1"), Some("999.300.1.1"));
        assert_eq!(
            extract_ip("upgrade to 6.49.10.1 failed"),
            Some("6.49.10.1")
        );
    }

    #[test]
    fn test_word_boundary_rejects_long_groups() {
        assert_eq!(extract_ip("id 1234.1.1.1"), None);
    }
}
