use fetchgate_core::{GuardPolicy, Rejection, Scheme, UrlGuard};

fn guard() -> UrlGuard {
    UrlGuard::default()
}

#[test]
fn accepts_public_http_and_https() {
    let accepted = guard().validate("https://Example.COM/path?q=1").unwrap();
    assert_eq!(accepted.scheme(), Scheme::Https);
    assert_eq!(accepted.hostname(), "example.com");

    let accepted = guard().validate("http://93.184.216.34/").unwrap();
    assert_eq!(accepted.scheme(), Scheme::Http);
}

#[test]
fn blocklisted_hosts_are_rejected_for_any_scheme_and_path() {
    let hosts = [
        "localhost",
        "LOCALHOST",
        "127.0.0.1",
        "0.0.0.0",
        "[::1]",
        "metadata.google.internal",
        "10.0.0.5",
        "172.16.4.4",
        "192.168.1.1",
        "169.254.169.254",
    ];
    for host in hosts {
        for scheme in ["http", "https"] {
            for path in ["", "/", "/deep/path?x=1#frag"] {
                let raw = format!("{scheme}://{host}{path}");
                assert_eq!(
                    guard().validate(&raw),
                    Err(Rejection::PrivateAddressBlocked),
                    "{raw} should be blocked"
                );
            }
        }
    }
}

#[test]
fn prefix_rule_applies_to_names_too() {
    assert_eq!(
        guard().validate("http://10.example.com/"),
        Err(Rejection::PrivateAddressBlocked)
    );
}

#[test]
fn non_http_schemes_are_rejected() {
    for raw in [
        "file:///etc/passwd",
        "ftp://example.com/file",
        "gopher://example.com/",
        "javascript:alert(1)",
        "mailto:someone@example.com",
    ] {
        assert_eq!(
            guard().validate(raw),
            Err(Rejection::SchemeNotAllowed),
            "{raw}"
        );
    }
}

#[test]
fn scheme_check_wins_over_host_check() {
    assert_eq!(
        guard().validate("ftp://127.0.0.1/"),
        Err(Rejection::SchemeNotAllowed)
    );
}

#[test]
fn overlong_input_is_rejected_before_parsing() {
    let raw = "x".repeat(2049);
    assert_eq!(guard().validate(&raw), Err(Rejection::TooLong { max: 2048 }));

    let raw = format!("ftp://127.0.0.1/{}", "a".repeat(2048));
    assert_eq!(guard().validate(&raw), Err(Rejection::TooLong { max: 2048 }));
}

#[test]
fn exactly_max_length_is_accepted() {
    let prefix = "https://example.com/";
    let raw = format!("{prefix}{}", "a".repeat(2048 - prefix.len()));
    assert_eq!(raw.len(), 2048);
    assert!(guard().validate(&raw).is_ok());
}

#[test]
fn garbage_is_malformed() {
    for raw in ["", "not a url", "http://", "://missing-scheme.com"] {
        assert_eq!(guard().validate(raw), Err(Rejection::Malformed), "{raw:?}");
    }
}

#[test]
fn ip_range_hardening_covers_gaps_in_prefix_list() {
    for raw in [
        "http://172.20.0.1/",
        "http://172.31.255.255/",
        "http://[fc00::1]/",
        "http://[fe80::1]/",
        "http://[::ffff:127.0.0.1]/",
        "http://100.64.0.1/",
        "http://127.1.2.3/",
    ] {
        assert_eq!(
            guard().validate(raw),
            Err(Rejection::PrivateAddressBlocked),
            "{raw}"
        );
    }
}

#[test]
fn prefix_only_policy_keeps_literal_behaviour() {
    let guard = UrlGuard::new(GuardPolicy {
        block_ip_ranges: false,
        ..GuardPolicy::default()
    });
    assert!(guard.validate("http://172.20.0.1/").is_ok());
    assert_eq!(
        guard.validate("http://172.16.0.1/"),
        Err(Rejection::PrivateAddressBlocked)
    );
}

#[test]
fn custom_max_length_is_reported() {
    let guard = UrlGuard::new(GuardPolicy {
        max_length: 20,
        ..GuardPolicy::default()
    });
    let err = guard
        .validate("https://example.com/too-long")
        .unwrap_err();
    assert_eq!(err, Rejection::TooLong { max: 20 });
    assert_eq!(err.to_string(), "URL is too long (max 20 characters)");
}

#[test]
fn rejection_messages_match_api_contract() {
    assert_eq!(
        Rejection::PrivateAddressBlocked.to_string(),
        "Access to private IP addresses is not allowed"
    );
    assert_eq!(
        Rejection::SchemeNotAllowed.to_string(),
        "Only HTTP and HTTPS protocols are allowed"
    );
    assert_eq!(Rejection::Malformed.to_string(), "Invalid URL format");
}
