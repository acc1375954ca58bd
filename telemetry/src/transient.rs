/// Lower-case fragments that mark a store failure as worth retrying
pub const TRANSIENT_SIGNATURES: &[&str] = &[
    "timeout",
    "network",
    "temporarily unavailable",
    "service unavailable",
    "conflict",
    "failed to fetch",
    "econnreset",
    "econnrefused",
    "etimedout",
    "enotfound",
    "eai_again",
    "ehostunreach",
    "enetunreach",
    "epipe",
];

/// Case-insensitive substring match against [`TRANSIENT_SIGNATURES`]
pub fn is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_messages() {
        assert!(is_transient("Network request failed"));
        assert!(is_transient("TypeError: Failed to fetch"));
        assert!(is_transient("Gateway Timeout"));
        assert!(is_transient("503 Service Unavailable"));
        assert!(is_transient("resource temporarily unavailable"));
        assert!(is_transient("409 Conflict"));
        assert!(is_transient("connect ECONNREFUSED 10.0.0.1:443"));
        assert!(is_transient("getaddrinfo EAI_AGAIN api.example"));
    }

    #[test]
    fn test_permanent_messages() {
        assert!(!is_transient("permission denied for table device_links"));
        assert!(!is_transient("JWT expired"));
        assert!(!is_transient(""));
    }
}
