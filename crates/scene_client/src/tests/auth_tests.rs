use super::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};

fn challenge(challenge: &str, salt: &str) -> AuthChallenge {
    AuthChallenge {
        challenge: challenge.into(),
        salt: salt.into(),
    }
}

#[test]
fn authentication_string_is_base64_sha256() {
    let auth = authentication_string("supersecret", &challenge("c1", "s1"));
    assert_eq!(auth.len(), 44);
    assert!(auth.ends_with('='));
    assert!(STANDARD.decode(&auth).expect("base64").len() == 32);
}

#[test]
fn authentication_string_is_deterministic() {
    let a = authentication_string("pw", &challenge("c1", "s1"));
    let b = authentication_string("pw", &challenge("c1", "s1"));
    assert_eq!(a, b);
}

#[test]
fn authentication_string_depends_on_every_input() {
    let base = authentication_string("pw", &challenge("c1", "s1"));
    assert_ne!(base, authentication_string("pw2", &challenge("c1", "s1")));
    assert_ne!(base, authentication_string("pw", &challenge("c2", "s1")));
    assert_ne!(base, authentication_string("pw", &challenge("c1", "s2")));
}
