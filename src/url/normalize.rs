use std::fmt;
use url::{Host, Url};

/// Maximum length of a DNS name (without the root dot)
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single DNS label
const MAX_LABEL_LEN: usize = 63;

/// Deduplication key for a discovered entity website
///
/// Every raw string maps to exactly one `CanonicalDomain`. Inputs that cannot be
/// turned into a resolvable host name map to [`CanonicalDomain::Invalid`], which
/// the dedup store never records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalDomain {
    /// A lowercase host name with `www.` prefixes and the root dot removed
    Valid(String),
    /// Empty or malformed input
    Invalid,
}

impl CanonicalDomain {
    /// Returns the host name, or an empty string for `Invalid`
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid(domain) => domain,
            Self::Invalid => "",
        }
    }

    /// Returns true if this is a usable domain
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl fmt::Display for CanonicalDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(domain) => f.write_str(domain),
            Self::Invalid => f.write_str("<invalid>"),
        }
    }
}

/// Normalizes a raw website string into its canonical domain
///
/// # Normalization Steps
///
/// 1. Trim whitespace and lowercase
/// 2. Strip a leading `http://` or `https://` (any other scheme is invalid)
/// 3. Parse the remainder as an HTTP authority; drop userinfo, port, path,
///    query and fragment
/// 4. Reject IP literals; remove a trailing root dot
/// 5. Strip leading `www.` labels while at least one dot remains
/// 6. Validate the labels
///
/// The function is total and idempotent: feeding the output back in returns
/// the same value.
///
/// # Examples
///
/// ```
/// use mx_harvest::url::{normalize_domain, CanonicalDomain};
///
/// let domain = normalize_domain("https://WWW.Example.com/about/");
/// assert_eq!(domain, CanonicalDomain::Valid("example.com".to_string()));
///
/// assert_eq!(normalize_domain(""), CanonicalDomain::Invalid);
/// ```
pub fn normalize_domain(raw: &str) -> CanonicalDomain {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return CanonicalDomain::Invalid;
    }

    let rest = match strip_http_scheme(&lowered) {
        Some(rest) => rest,
        None => return CanonicalDomain::Invalid,
    };

    let url = match Url::parse(&format!("http://{}", rest)) {
        Ok(url) => url,
        Err(_) => return CanonicalDomain::Invalid,
    };

    let host = match url.host() {
        Some(Host::Domain(host)) => host.trim_end_matches('.').to_string(),
        _ => return CanonicalDomain::Invalid,
    };

    let host = strip_www(&host);

    if is_valid_hostname(host) {
        CanonicalDomain::Valid(host.to_string())
    } else {
        CanonicalDomain::Invalid
    }
}

/// Removes an `http://` or `https://` prefix
///
/// Returns None when the input carries some other scheme, either explicit
/// (`ftp://...`) or opaque (`mailto:...`, `javascript:...`).
fn strip_http_scheme(input: &str) -> Option<&str> {
    if let Some(rest) = input.strip_prefix("https://") {
        return Some(rest);
    }
    if let Some(rest) = input.strip_prefix("http://") {
        return Some(rest);
    }
    if input.contains("://") || has_opaque_scheme(input) {
        return None;
    }
    Some(input)
}

/// Detects `scheme:rest` where the colon is not a port separator
fn has_opaque_scheme(input: &str) -> bool {
    let Some((prefix, rest)) = input.split_once(':') else {
        return false;
    };

    let looks_like_scheme = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
        && !prefix.contains('.');
    let port_follows = rest.chars().next().is_some_and(|c| c.is_ascii_digit());

    looks_like_scheme && !port_follows
}

/// Strips leading `www.` labels, keeping at least one dot in the host
fn strip_www(host: &str) -> &str {
    let mut current = host;
    while let Some(rest) = current.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        current = rest;
    }
    current
}

fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(domain: &str) -> CanonicalDomain {
        CanonicalDomain::Valid(domain.to_string())
    }

    #[test]
    fn test_strip_scheme_and_www() {
        assert_eq!(normalize_domain("https://www.foo.com"), valid("foo.com"));
        assert_eq!(normalize_domain("http://www.foo.com/"), valid("foo.com"));
    }

    #[test]
    fn test_lowercase() {
        assert_eq!(normalize_domain("FOO.COM"), valid("foo.com"));
        assert_eq!(normalize_domain("Http://Sub.Foo.Com"), valid("sub.foo.com"));
    }

    #[test]
    fn test_trailing_slash_and_path_dropped() {
        assert_eq!(normalize_domain("foo.com/"), valid("foo.com"));
        assert_eq!(normalize_domain("foo.com/about/us/"), valid("foo.com"));
        assert_eq!(normalize_domain("https://foo.com/?q=1#top"), valid("foo.com"));
    }

    #[test]
    fn test_port_and_userinfo_dropped() {
        assert_eq!(normalize_domain("foo.com:8080"), valid("foo.com"));
        assert_eq!(normalize_domain("https://user:pw@foo.com/x"), valid("foo.com"));
    }

    #[test]
    fn test_trailing_root_dot() {
        assert_eq!(normalize_domain("foo.com."), valid("foo.com"));
    }

    #[test]
    fn test_same_entity() {
        let a = normalize_domain("https://www.Foo.com/");
        let b = normalize_domain("foo.com");
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(normalize_domain(""), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("   "), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("not a domain"), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("localhost"), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("ftp://foo.com"), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("mailto:someone@foo.com"), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("https://"), CanonicalDomain::Invalid);
        assert_eq!(normalize_domain("192.168.1.10"), CanonicalDomain::Invalid);
    }

    #[test]
    fn test_www_only_host_kept() {
        assert_eq!(normalize_domain("www.com"), valid("www.com"));
        assert_eq!(normalize_domain("www.www.com"), valid("www.com"));
        assert_eq!(normalize_domain("www.www.foo.com"), valid("foo.com"));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://www.Foo.com/",
            "www.www.foo.com",
            "www.com",
            "foo.com.",
            "http://user@Bar.co.uk:443/path?x=1",
            "",
            "garbage input",
            "münchen.de",
            "-bad-.com",
        ];

        for input in inputs {
            let once = normalize_domain(input);
            let twice = normalize_domain(once.as_str());
            assert_eq!(once, twice, "normalization not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(valid("foo.com").to_string(), "foo.com");
        assert_eq!(CanonicalDomain::Invalid.to_string(), "<invalid>");
    }
}
