use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown op code {0}")]
    UnknownOpCode(u8),
    #[error("invalid {what}: {source}")]
    InvalidPayload {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("op code {0} is never sent by this client")]
    NotSendable(u8),
}

/// Close codes obs-websocket uses when it drops a session.
pub fn describe_close_code(code: u16) -> Option<&'static str> {
    match code {
        4000 => Some("unknown reason"),
        4002 => Some("message decode error"),
        4003 => Some("missing data field"),
        4004 => Some("invalid data field type"),
        4005 => Some("invalid data field value"),
        4006 => Some("unknown op code"),
        4007 => Some("not identified"),
        4008 => Some("already identified"),
        4009 => Some("authentication failed"),
        4010 => Some("unsupported rpc version"),
        4011 => Some("session invalidated"),
        4012 => Some("unsupported feature"),
        _ => None,
    }
}
