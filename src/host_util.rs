/// Splits a raw host value into its host part and an optional trailing
/// numeric port part.
///
/// The split happens at the last `:` outside a bracketed IPv6 literal, and
/// only when everything after that colon is one or more ASCII digits.
/// Anything else (non-numeric suffix, empty port, junk after a closing
/// bracket) leaves the whole value as the host part, so a malformed input
/// fails later comparisons instead of being silently repaired.
pub fn split_host_port(value: &str) -> (&str, Option<&str>) {
    if let Some(bracket_end) = value.find(']') {
        let rest = &value[bracket_end + 1..];
        if let Some(port) = rest.strip_prefix(':') {
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                return (&value[..bracket_end + 1], Some(port));
            }
        }
        return (value, None);
    }
    match value.rfind(':') {
        Some(colon) => {
            let port = &value[colon + 1..];
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                (&value[..colon], Some(port))
            } else {
                (value, None)
            }
        }
        None => (value, None),
    }
}

/// Validates the host portion of an incoming Host header or URL authority.
/// The port must already be split off with `split_host_port`.
///
/// Hostnames are held to basic DNS label syntax: no leading hyphen, no
/// leading/trailing dots, no empty labels, ASCII only, no whitespace or
/// control characters, and DNS length limits (253 total, 63 per label).
/// A bracketed IPv6 literal is accepted when it is a single well-formed
/// bracket pair with nothing after the closing bracket.
pub fn validate_candidate_host(host: &str) -> std::io::Result<()> {
    if host.is_empty() {
        return Err(std::io::Error::other("empty host"));
    }
    if host.len() > 253 {
        return Err(std::io::Error::other("host exceeds 253 bytes"));
    }
    if !host.is_ascii() {
        return Err(std::io::Error::other("host contains non-ASCII bytes"));
    }
    if host.bytes().any(|b| b.is_ascii_control() || b == b' ') {
        return Err(std::io::Error::other(
            "host contains whitespace or control characters",
        ));
    }
    if host.starts_with('[') {
        let inner = match host.strip_suffix(']') {
            Some(stripped) => &stripped[1..],
            None => {
                return Err(std::io::Error::other(
                    "bracketed host has no closing bracket",
                ));
            }
        };
        if inner.is_empty() {
            return Err(std::io::Error::other("bracketed host is empty"));
        }
        if !inner
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b':' || b == b'.')
        {
            return Err(std::io::Error::other(
                "bracketed host is not an IPv6 literal",
            ));
        }
        return Ok(());
    }
    if host.contains(':') {
        return Err(std::io::Error::other("unbracketed host contains a colon"));
    }
    if host.starts_with('-') {
        return Err(std::io::Error::other("host has a leading hyphen"));
    }
    if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(std::io::Error::other("host has an empty label"));
    }
    if host.split('.').any(|label| label.len() > 63) {
        return Err(std::io::Error::other("host label exceeds 63 bytes"));
    }
    Ok(())
}

/// Matches a candidate host value against one configured trusted-domain
/// pattern. Comparison is ASCII case-insensitive per RFC 4343.
///
/// Both sides may carry a trailing `:port`. A pattern port is required
/// verbatim; a pattern without a port accepts any candidate port or none.
/// A single `*` in the pattern host is an unanchored glob that may match
/// the empty string. Bracketed IPv6 pattern hosts compare verbatim,
/// brackets included. Patterns with more than one `*` never match.
pub fn matches_trusted_pattern(candidate: &str, pattern: &str) -> bool {
    let (pattern_host, pattern_port) = split_host_port(pattern);
    let (candidate_host, candidate_port) = split_host_port(candidate);

    if let Some(required_port) = pattern_port {
        if candidate_port != Some(required_port) {
            return false;
        }
    }

    if pattern_host.starts_with('[') {
        return candidate_host.eq_ignore_ascii_case(pattern_host);
    }

    match pattern_host.split_once('*') {
        None => candidate_host.eq_ignore_ascii_case(pattern_host),
        Some((prefix, suffix)) => {
            if suffix.contains('*') {
                return false;
            }
            // Byte-wise prefix/suffix comparison also keeps slicing safe for
            // non-ASCII candidates.
            let candidate_bytes = candidate_host.as_bytes();
            candidate_bytes.len() >= prefix.len() + suffix.len()
                && candidate_bytes[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
                && candidate_bytes[candidate_bytes.len() - suffix.len()..]
                    .eq_ignore_ascii_case(suffix.as_bytes())
        }
    }
}
