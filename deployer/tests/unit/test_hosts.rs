//! Host spec parsing tests

use secrecy::ExposeSecret;

use reldeploy::hosts::{parse_host_spec, split_host_list, Credential, DEFAULT_SSH_PORT};

fn password_of(credential: &Credential) -> Option<String> {
    match credential {
        Credential::Password(secret) => Some(secret.expose_secret().to_string()),
        Credential::KeyBased => None,
    }
}

#[test]
fn test_all_four_forms() {
    let cases = [
        ("alice:secret@10.0.0.1:2222", "alice", Some("secret"), "10.0.0.1", 2222),
        ("alice:secret@10.0.0.1", "alice", Some("secret"), "10.0.0.1", DEFAULT_SSH_PORT),
        ("bob@host.example:2200", "bob", None, "host.example", 2200),
        ("bob@host.example", "bob", None, "host.example", DEFAULT_SSH_PORT),
    ];

    for (token, user, password, host, port) in cases {
        let target = parse_host_spec(token).unwrap();
        assert_eq!(target.user, user, "{}", token);
        assert_eq!(password_of(&target.credential).as_deref(), password, "{}", token);
        assert_eq!(target.host, host, "{}", token);
        assert_eq!(target.port, port, "{}", token);
    }
}

#[test]
fn test_password_may_contain_colons() {
    let target = parse_host_spec("deploy:a:b:c@web1").unwrap();
    assert_eq!(password_of(&target.credential).as_deref(), Some("a:b:c"));
    assert_eq!(target.host, "web1");
}

#[test]
fn test_invalid_tokens_are_errors_not_panics() {
    for token in [
        "not-a-valid-spec",
        "",
        "@host",
        "user@",
        "user:@host",
        "user@host:",
        "user@host:port",
        "user@host:0",
        "user@host:65536",
        "a@b@c",
    ] {
        assert!(parse_host_spec(token).is_err(), "{:?} should not parse", token);
    }
}

#[test]
fn test_display_never_shows_password_or_port() {
    let target = parse_host_spec("alice:hunter2@10.20.30.40:2222").unwrap();
    let shown = format!("{} {:?}", target, target);
    assert!(!shown.contains("hunter2"));
    assert!(!shown.contains("2222"));
    assert!(!shown.contains("30.40"));
    assert_eq!(target.label(), "alice@10.20.*.*");
}

#[test]
fn test_split_host_list_on_spaces_only() {
    assert_eq!(
        split_host_list("a@h1  b:pw@h2:2222 c@h3"),
        vec!["a@h1", "b:pw@h2:2222", "c@h3"]
    );
    assert_eq!(split_host_list("a@h1\tb@h2"), vec!["a@h1\tb@h2"]);
    assert!(split_host_list("   ").is_empty());
}
