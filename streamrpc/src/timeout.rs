//! Call timeouts.
//!
//! A call can be bounded from both ends: the caller's context deadline and
//! the server's configured timeout. The smaller one wins.

use std::time::Duration;

/// Parse a timeout given in milliseconds.
///
/// Returns `None` for invalid values and for `0`, which means no timeout.
pub fn parse_timeout_ms(value: &str) -> Option<Duration> {
    let ms: u64 = value.trim().parse().ok()?;
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Compute the effective timeout from server and client timeouts.
///
/// Returns `None` if neither timeout is set (unlimited).
pub fn compute_effective_timeout(
    server_timeout: Option<Duration>,
    client_timeout: Option<Duration>,
) -> Option<Duration> {
    match (server_timeout, client_timeout) {
        (Some(server), Some(client)) => Some(server.min(client)),
        (Some(server), None) => Some(server),
        (None, Some(client)) => Some(client),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout_ms_valid() {
        assert_eq!(parse_timeout_ms("1000"), Some(Duration::from_millis(1000)));
        assert_eq!(parse_timeout_ms(" 250 "), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_parse_timeout_ms_zero_means_unlimited() {
        assert_eq!(parse_timeout_ms("0"), None);
    }

    #[test]
    fn test_parse_timeout_ms_invalid() {
        assert_eq!(parse_timeout_ms("abc"), None);
        assert_eq!(parse_timeout_ms("-1"), None);
        assert_eq!(parse_timeout_ms(""), None);
    }

    #[test]
    fn test_compute_effective_timeout_server_smaller() {
        let server = Some(Duration::from_secs(5));
        let client = Some(Duration::from_secs(10));
        assert_eq!(
            compute_effective_timeout(server, client),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_compute_effective_timeout_client_smaller() {
        let server = Some(Duration::from_secs(10));
        let client = Some(Duration::from_secs(5));
        assert_eq!(
            compute_effective_timeout(server, client),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_compute_effective_timeout_one_side() {
        let five = Some(Duration::from_secs(5));
        assert_eq!(compute_effective_timeout(five, None), five);
        assert_eq!(compute_effective_timeout(None, five), five);
    }

    #[test]
    fn test_compute_effective_timeout_neither() {
        assert_eq!(compute_effective_timeout(None, None), None);
    }
}
