use super::*;

fn info(scopes: &[&str]) -> TokenInfo {
    TokenInfo {
        client_id: "app-123".into(),
        login: "virtuabot".into(),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        user_id: Some("42".into()),
        expires_in: 3600,
    }
}

#[test]
fn token_with_chat_read_passes() {
    info(&["chat:read", "chat:edit"]).check(Some("app-123")).expect("valid");
    info(&["chat:read"]).check(None).expect("valid without app id");
    info(&["chat:read"]).check(Some("")).expect("empty app id is ignored");
}

#[test]
fn token_without_chat_read_is_rejected() {
    assert!(matches!(
        info(&["chat:edit"]).check(None),
        Err(ChatError::MissingScope { scope }) if scope == CHAT_READ_SCOPE
    ));
}

#[test]
fn token_for_another_app_is_rejected() {
    assert!(matches!(
        info(&["chat:read"]).check(Some("other-app")),
        Err(ChatError::ClientIdMismatch { expected, actual })
            if expected == "other-app" && actual == "app-123"
    ));
}

#[test]
fn oauth_prefix_is_stripped() {
    assert_eq!(bare_token("oauth:abc123"), "abc123");
    assert_eq!(bare_token(" abc123 "), "abc123");
}

#[test]
fn validate_response_deserializes() {
    let info: TokenInfo = serde_json::from_str(
        r#"{"client_id":"app-123","login":"virtuabot","scopes":["chat:read"],"user_id":"42","expires_in":5520}"#,
    )
    .expect("token info");
    assert_eq!(info.login, "virtuabot");
    assert_eq!(info.expires_in, 5520);
}
