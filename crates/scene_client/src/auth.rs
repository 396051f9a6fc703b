use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use shared::protocol::AuthChallenge;

/// obs-websocket v5 `Identify.authentication` value:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn authentication_string(password: &str, challenge: &AuthChallenge) -> String {
    let secret = STANDARD.encode(Sha256::digest(
        format!("{password}{}", challenge.salt).as_bytes(),
    ));
    STANDARD.encode(Sha256::digest(
        format!("{secret}{}", challenge.challenge).as_bytes(),
    ))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
