use super::*;

#[test]
fn anonymous_login_uses_justinfan() {
    let login = ChatLogin::anonymous();
    let nick = login.nick();
    assert!(nick.starts_with("justinfan"));
    assert!(nick["justinfan".len()..].parse::<u32>().is_ok());
    assert_eq!(
        login.registration(),
        vec![
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
            format!("NICK {nick}"),
        ]
    );
}

#[test]
fn token_login_sends_pass_before_nick() {
    let login = ChatLogin::Token {
        login: "VirtuaBot".into(),
        token: "abc123".into(),
    };
    let lines = login.registration();
    assert_eq!(lines[1], "PASS oauth:abc123");
    assert_eq!(lines[2], "NICK virtuabot");
}

#[test]
fn only_websocket_urls_are_accepted() {
    assert!(validate_url(TWITCH_IRC_URL).is_ok());
    assert!(matches!(
        validate_url("https://irc-ws.chat.twitch.tv"),
        Err(ChatError::InvalidUrl { .. })
    ));
}

#[test]
fn ping_is_answered_with_pong() {
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(4);
    let line = IrcLine::parse("PING :tmi.twitch.tv").expect("ping");
    assert!(handle_line(&line, &outbound, &events, "justinfan1").is_none());
    assert_eq!(
        outbound_rx.try_recv().expect("pong"),
        Message::Text("PONG :tmi.twitch.tv".into())
    );
}

#[test]
fn failed_login_notice_ends_the_session() {
    let (outbound, _outbound_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(4);
    let line = IrcLine::parse(":tmi.twitch.tv NOTICE * :Login authentication failed")
        .expect("notice");
    assert_eq!(
        handle_line(&line, &outbound, &events, "virtuabot").as_deref(),
        Some("Login authentication failed")
    );
}

#[test]
fn welcome_numeric_reports_ready() {
    let (outbound, _outbound_rx) = mpsc::unbounded_channel();
    let (events, mut rx) = broadcast::channel(4);
    let line = IrcLine::parse(":tmi.twitch.tv 001 virtuabot :Welcome, GLHF!").expect("001");
    assert!(handle_line(&line, &outbound, &events, "virtuabot").is_none());
    assert_eq!(rx.try_recv().expect("event"), ChatEvent::Ready);
}
