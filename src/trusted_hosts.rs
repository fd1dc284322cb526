use url::Url;

use crate::config::{GateConfig, TrustedDomainEntry};
use crate::host_util::{matches_trusted_pattern, split_host_port, validate_candidate_host};

/// Decides whether an incoming Host header value is allowed to reach the
/// upstream.
///
/// An instance is an immutable snapshot of the trust configuration; every
/// check is a pure function of the candidate and that snapshot. Freshness
/// after config edits is handled by swapping whole snapshots (see
/// `config_watch`), never by mutating one.
#[derive(Debug, Clone, Default)]
pub struct TrustedHosts {
    overwrite_host: Option<String>,
    patterns: Vec<String>,
}

impl TrustedHosts {
    /// An empty `overwrite_host` means no override is configured. Invalid
    /// (non-string) config entries are dropped here; an all-invalid or empty
    /// list trusts nothing beyond localhost.
    pub fn new(overwrite_host: Option<String>, entries: &[TrustedDomainEntry]) -> Self {
        let patterns = entries
            .iter()
            .filter_map(|entry| entry.as_pattern().map(str::to_string))
            .collect();
        Self {
            overwrite_host: overwrite_host.filter(|host| !host.is_empty()),
            patterns,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            Some(config.overwrite_host.clone()),
            &config.trusted_domains,
        )
    }

    /// Checks a raw Host header value. Never errors: malformed input simply
    /// fails to match and yields `false`.
    pub fn is_trusted_domain(&self, candidate: &str) -> bool {
        // An administrator-set overwrite host replaces whatever the client
        // presented, so every candidate is admitted once it is configured.
        if self.overwrite_host.is_some() {
            return true;
        }

        // Localhost fast path: at most one trailing numeric port group.
        // "localhost:1:2" splits to ("localhost:1", "2") and falls through.
        let (host, _) = split_host_port(candidate);
        if host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" {
            return true;
        }

        if validate_candidate_host(host).is_err() {
            return false;
        }

        self.patterns
            .iter()
            .any(|pattern| matches_trusted_pattern(candidate, pattern))
    }

    /// Extracts the authority (host plus explicit port) from a full URL and
    /// delegates to `is_trusted_domain`. URLs without a parseable host are
    /// never trusted.
    pub fn is_trusted_url(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return false,
        };
        match parsed.port().or_else(|| explicit_port(url)) {
            Some(port) => self.is_trusted_domain(&format!("{}:{}", host, port)),
            None => self.is_trusted_domain(host),
        }
    }
}

/// WHATWG parsing drops a scheme-default port, but an explicitly written
/// `:443` in an https URL must still be able to satisfy a port-carrying
/// entry. Recover the port from the raw authority text; a truly absent
/// port stays absent. Only called on URLs `Url::parse` already accepted.
fn explicit_port(url: &str) -> Option<u16> {
    let (_, after_scheme) = url.split_once(':')?;
    let authority = after_scheme.strip_prefix("//")?;
    let authority_end = authority.find(['/', '?', '#']).unwrap_or(authority.len());
    let host_port = authority[..authority_end]
        .rsplit_once('@')
        .map_or(&authority[..authority_end], |(_, host_port)| host_port);
    let (_, port) = split_host_port(host_port);
    port?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(patterns: &[&str]) -> Vec<TrustedDomainEntry> {
        patterns
            .iter()
            .map(|p| TrustedDomainEntry::Pattern(p.to_string()))
            .collect()
    }

    fn verifier(patterns: &[&str]) -> TrustedHosts {
        TrustedHosts::new(None, &entries(patterns))
    }

    // The full allowlist exercised by the domain matching tests below.
    fn trusted_list() -> TrustedHosts {
        verifier(&[
            "host.one.test",
            "host.two.test",
            "[1fff:0:a88:85a3::ac1f]",
            "host.three.test:443",
            "*.leading.host",
            "trailing.host*",
            "cen*ter",
            "*.leadingwith.port:123",
            "trailingwith.port*:456",
            "UPPERCASE.DOMAIN",
            "lowercase.domain",
        ])
    }

    mod empty_list_tests {
        use super::*;

        #[test]
        fn empty_list_trusts_nothing() {
            assert!(!verifier(&[]).is_trusted_domain("host.one.test:8080"));
        }

        #[test]
        fn default_is_empty() {
            assert!(!TrustedHosts::default().is_trusted_domain("host.one.test"));
        }

        #[test]
        fn all_invalid_entries_trust_nothing() {
            // A list like [1] must not trust the candidate "1".
            let list = vec![TrustedDomainEntry::Invalid];
            let hosts = TrustedHosts::new(None, &list);
            assert!(!hosts.is_trusted_domain("1"));
        }

        #[test]
        fn invalid_entries_are_skipped_not_fatal() {
            let list = vec![
                TrustedDomainEntry::Invalid,
                TrustedDomainEntry::Pattern("host.one.test".to_string()),
            ];
            let hosts = TrustedHosts::new(None, &list);
            assert!(hosts.is_trusted_domain("host.one.test"));
            assert!(!hosts.is_trusted_domain("1"));
        }
    }

    mod overwrite_host_tests {
        use super::*;

        #[test]
        fn overwrite_host_trusts_everything() {
            let hosts = TrustedHosts::new(Some("myproxyhost".to_string()), &[]);
            assert!(hosts.is_trusted_domain("myproxyhost"));
            assert!(hosts.is_trusted_domain("myotherhost"));
            assert!(hosts.is_trusted_domain("evil.example.com"));
            assert!(hosts.is_trusted_domain(""));
            assert!(hosts.is_trusted_domain("not even a hostname"));
        }

        #[test]
        fn empty_overwrite_host_is_no_override() {
            let hosts = TrustedHosts::new(Some(String::new()), &[]);
            assert!(!hosts.is_trusted_domain("myproxyhost"));
        }
    }

    mod localhost_tests {
        use super::*;

        #[test]
        fn localhost_always_trusted() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("localhost"));
            assert!(hosts.is_trusted_domain("localhost:8080"));
            assert!(hosts.is_trusted_domain("127.0.0.1"));
            assert!(hosts.is_trusted_domain("127.0.0.1:8080"));
        }

        #[test]
        fn localhost_trusted_with_empty_list() {
            let hosts = verifier(&[]);
            assert!(hosts.is_trusted_domain("localhost"));
            assert!(hosts.is_trusted_domain("127.0.0.1:8080"));
        }

        #[test]
        fn localhost_is_case_insensitive() {
            assert!(verifier(&[]).is_trusted_domain("LOCALHOST"));
            assert!(verifier(&[]).is_trusted_domain("LocalHost:443"));
        }

        #[test]
        fn invalid_localhost_forms_are_untrusted() {
            let hosts = trusted_list();
            assert!(!hosts.is_trusted_domain("localhost:1:2"));
            assert!(!hosts.is_trusted_domain("localhost: evil.host"));
            assert!(!hosts.is_trusted_domain("localhost.example.com"));
        }
    }

    mod domain_matching_tests {
        use super::*;

        #[test]
        fn exact_entries_ignore_ports() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("host.two.test:8080"));
            assert!(hosts.is_trusted_domain("host.two.test:9999"));
            assert!(!hosts.is_trusted_domain("host.three.test:8080"));
        }

        #[test]
        fn extra_colons_are_untrusted() {
            assert!(!trusted_list().is_trusted_domain("host.two.test:8080:aa:222"));
        }

        #[test]
        fn bracketed_ipv6() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("[1fff:0:a88:85a3::ac1f]"));
            assert!(hosts.is_trusted_domain("[1fff:0:a88:85a3::ac1f]:801"));
            assert!(!hosts.is_trusted_domain("[1fff:0:a88:85a3::ac1f]:801:34"));
        }

        #[test]
        fn exact_entry_with_port() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("host.three.test:443"));
            assert!(!hosts.is_trusted_domain("host.three.test:80"));
            assert!(!hosts.is_trusted_domain("host.three.test"));
        }

        #[test]
        fn leading_wildcard() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("abc.leading.host"));
            assert!(hosts.is_trusted_domain("abc.def.leading.host"));
            assert!(!hosts.is_trusted_domain("abc.def.leading.host.another"));
            assert!(hosts.is_trusted_domain("abc.def.leading.host:123"));
            assert!(!hosts.is_trusted_domain("leading.host"));
        }

        #[test]
        fn trailing_wildcard() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("trailing.host"));
            assert!(hosts.is_trusted_domain("trailing.host.abc"));
            assert!(hosts.is_trusted_domain("trailing.host.abc.def"));
            assert!(hosts.is_trusted_domain("trailing.host.abc:123"));
            assert!(!hosts.is_trusted_domain("another.trailing.host"));
        }

        #[test]
        fn center_wildcard() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("center"));
            assert!(hosts.is_trusted_domain("cenxxxter"));
            assert!(hosts.is_trusted_domain("cen.x.y.ter"));
        }

        #[test]
        fn wildcard_with_port() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("abc.leadingwith.port:123"));
            assert!(!hosts.is_trusted_domain("abc.leadingwith.port:1234"));
            assert!(hosts.is_trusted_domain("trailingwith.port.abc:456"));
            assert!(!hosts.is_trusted_domain("trailingwith.port.abc:123"));
        }

        #[test]
        fn bad_hostnames() {
            let hosts = trusted_list();
            assert!(!hosts.is_trusted_domain("-bad"));
            assert!(!hosts.is_trusted_domain("-bad.leading.host"));
            assert!(!hosts.is_trusted_domain("bad..der.leading.host"));
        }

        #[test]
        fn case_insensitive() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_domain("uppercase.domain"));
            assert!(hosts.is_trusted_domain("LOWERCASE.DOMAIN"));
        }

        #[test]
        fn empty_candidate() {
            assert!(!trusted_list().is_trusted_domain(""));
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn url_with_explicit_port() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_url("https://host.two.test:8080/index.php/something"));
            assert!(!hosts.is_trusted_url("https://host.three.test:80/index.php/something"));
            assert!(hosts.is_trusted_url("http://host.three.test:443/index.php/something"));
        }

        #[test]
        fn url_without_port() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_url("https://host.one.test/index.php/something"));
            // The entry requires port 443 but the URL carries no explicit port.
            assert!(!hosts.is_trusted_url("https://host.three.test/index.php/something"));
        }

        #[test]
        fn explicit_default_port_satisfies_port_entry() {
            // The url crate normalizes a scheme-default port away, but an
            // explicitly written ":443" must still count as a port.
            let hosts = trusted_list();
            assert!(hosts.is_trusted_url("https://host.three.test:443/index.php/something"));
            assert!(hosts.is_trusted_url("https://host.three.test:443"));
            assert!(hosts.is_trusted_url("https://user@host.three.test:443/login"));
        }

        #[test]
        fn explicit_ipv6_port_is_recovered() {
            let hosts = verifier(&["[2001:db8::1]:443"]);
            assert!(hosts.is_trusted_url("https://[2001:db8::1]:443/index.php"));
            assert!(!hosts.is_trusted_url("https://[2001:db8::1]:8443/index.php"));
        }

        #[test]
        fn url_with_wildcard_entry() {
            let hosts = trusted_list();
            assert!(hosts.is_trusted_url("http://abc.leading.host/login"));
            assert!(!hosts.is_trusted_url("http://leading.host/login"));
        }

        #[test]
        fn localhost_url() {
            assert!(verifier(&[]).is_trusted_url("http://localhost:8080/status.php"));
            assert!(verifier(&[]).is_trusted_url("http://127.0.0.1/status.php"));
        }

        #[test]
        fn unparseable_url_is_untrusted() {
            let hosts = trusted_list();
            assert!(!hosts.is_trusted_url("not a url"));
            assert!(!hosts.is_trusted_url(""));
            assert!(!hosts.is_trusted_url("host.one.test"));
        }

        #[test]
        fn url_without_host_is_untrusted() {
            assert!(!trusted_list().is_trusted_url("file:///etc/passwd"));
            assert!(!trusted_list().is_trusted_url("mailto:admin@host.one.test"));
        }

        #[test]
        fn url_host_is_case_insensitive() {
            assert!(trusted_list().is_trusted_url("https://HOST.ONE.TEST/"));
        }
    }
}
