use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

const BLOCKED_HOSTNAMES: [&str; 5] = [
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "::1",
    // GCP metadata service
    "metadata.google.internal",
];

const BLOCKED_PREFIXES: [&str; 4] = ["10.", "172.16.", "192.168.", "169.254."];

/// Limits applied by [`UrlGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Maximum accepted length of the raw URL, in characters.
    pub max_length: usize,
    /// Exact hostnames that are always rejected (compared lower-cased).
    pub blocked_hostnames: Vec<String>,
    /// Hostname prefixes that are always rejected.
    pub blocked_prefixes: Vec<String>,
    /// Also reject IP literals in loopback, private, link-local, shared and
    /// unique-local ranges, including IPv4-mapped IPv6 forms.
    ///
    /// The prefix list alone misses most of 172.16.0.0/12 and every IPv6
    /// private range except `::1`.
    pub block_ip_ranges: bool,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_URL_LENGTH,
            blocked_hostnames: BLOCKED_HOSTNAMES.iter().map(|h| h.to_string()).collect(),
            blocked_prefixes: BLOCKED_PREFIXES.iter().map(|p| p.to_string()).collect(),
            block_ip_ranges: true,
        }
    }
}

/// Why a candidate URL was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("URL is too long (max {max} characters)")]
    TooLong { max: usize },
    #[error("Invalid URL format")]
    Malformed,
    #[error("Only HTTP and HTTPS protocols are allowed")]
    SchemeNotAllowed,
    #[error("Access to private IP addresses is not allowed")]
    PrivateAddressBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn from_url(url: &Url) -> Option<Self> {
        match url.scheme() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A URL that is safe to dereference.
///
/// Caller-supplied URLs can only become an `AcceptedUrl` through
/// [`UrlGuard::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUrl {
    url: Url,
    scheme: Scheme,
    hostname: String,
}

impl AcceptedUrl {
    /// Wraps an operator-configured URL without running the guard.
    ///
    /// Never use this for input that came from a request.
    pub fn trusted(url: Url) -> Self {
        let scheme = Scheme::from_url(&url).unwrap_or(Scheme::Http);
        let hostname = url.host_str().map(normalize_host).unwrap_or_default();
        Self {
            url,
            scheme,
            hostname,
        }
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Lower-cased hostname, without IPv6 brackets.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl fmt::Display for AcceptedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// SSRF gate for caller-supplied URLs.
///
/// Only the literal hostname is inspected: no DNS lookups happen here.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    policy: GuardPolicy,
}

impl UrlGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Runs the checks in order: length, parse, scheme, host. The first
    /// failing check decides the rejection.
    pub fn validate(&self, raw: &str) -> Result<AcceptedUrl, Rejection> {
        if raw.chars().count() > self.policy.max_length {
            return Err(Rejection::TooLong {
                max: self.policy.max_length,
            });
        }
        let url = Url::parse(raw).map_err(|_| Rejection::Malformed)?;
        self.check_parsed(url)
    }

    /// Applies the scheme and host checks to an already parsed URL, e.g. a
    /// redirect target.
    pub fn check_url(&self, url: Url) -> Result<AcceptedUrl, Rejection> {
        if url.as_str().chars().count() > self.policy.max_length {
            return Err(Rejection::TooLong {
                max: self.policy.max_length,
            });
        }
        self.check_parsed(url)
    }

    fn check_parsed(&self, url: Url) -> Result<AcceptedUrl, Rejection> {
        let scheme = Scheme::from_url(&url).ok_or(Rejection::SchemeNotAllowed)?;
        let hostname = match url.host_str() {
            Some(host) if !host.is_empty() => normalize_host(host),
            _ => return Err(Rejection::Malformed),
        };

        if self.is_blocked_name(&hostname) {
            return Err(Rejection::PrivateAddressBlocked);
        }
        if self.policy.block_ip_ranges {
            if let Some(ip) = host_ip(&url) {
                if is_internal_ip(ip) {
                    return Err(Rejection::PrivateAddressBlocked);
                }
            }
        }

        Ok(AcceptedUrl {
            url,
            scheme,
            hostname,
        })
    }

    fn is_blocked_name(&self, hostname: &str) -> bool {
        let bare = hostname.strip_suffix('.').unwrap_or(hostname);
        self.policy
            .blocked_hostnames
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(bare))
            || self
                .policy
                .blocked_prefixes
                .iter()
                .any(|prefix| hostname.starts_with(prefix.as_str()))
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

fn host_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    }
}

pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 0.0.0.0/8 "this network"
        || octets[0] == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_internal_v4(mapped);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}
