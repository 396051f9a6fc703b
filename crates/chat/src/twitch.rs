use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use reqwest::Client;
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    irc::IrcLine,
    normalize_channel,
    token::{bare_token, validate_token},
    ChatError, ChatEvent, ChatTransport,
};

pub const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
const EVENT_CHANNEL_CAPACITY: usize = 256;
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLogin {
    /// Read-only `justinfan` login; needs no credentials.
    Anonymous { nick: String },
    Token { login: String, token: String },
}

impl ChatLogin {
    pub fn anonymous() -> Self {
        let suffix = Uuid::new_v4().as_u128() % 90_000 + 10_000;
        Self::Anonymous {
            nick: format!("justinfan{suffix}"),
        }
    }

    /// Validate `token` and log in as the account it belongs to.
    pub async fn from_token(
        http: &Client,
        validate_url: &str,
        token: &str,
        app_id: Option<&str>,
    ) -> Result<Self, ChatError> {
        let info = validate_token(http, validate_url, token).await?;
        info.check(app_id)?;
        Ok(Self::Token {
            login: info.login,
            token: bare_token(token).to_string(),
        })
    }

    pub fn nick(&self) -> &str {
        match self {
            Self::Anonymous { nick } => nick,
            Self::Token { login, .. } => login,
        }
    }

    fn registration(&self) -> Vec<String> {
        let mut lines = vec!["CAP REQ :twitch.tv/tags twitch.tv/commands".to_string()];
        match self {
            Self::Anonymous { nick } => lines.push(format!("NICK {nick}")),
            Self::Token { login, token } => {
                lines.push(format!("PASS oauth:{token}"));
                lines.push(format!("NICK {}", login.to_ascii_lowercase()));
            }
        }
        lines
    }
}

#[derive(Debug, Clone)]
pub struct TwitchChatOptions {
    pub url: String,
    pub login: ChatLogin,
}

impl TwitchChatOptions {
    pub fn new(login: ChatLogin) -> Self {
        Self {
            url: TWITCH_IRC_URL.to_string(),
            login,
        }
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

/// Twitch chat over the IRC websocket gateway.
pub struct TwitchChat {
    options: TwitchChatOptions,
    events: broadcast::Sender<ChatEvent>,
    connection: Mutex<Option<Connection>>,
}

impl TwitchChat {
    pub fn new(options: TwitchChatOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            options,
            events,
            connection: Mutex::new(None),
        }
    }

    pub fn nick(&self) -> &str {
        self.options.login.nick()
    }
}

impl Drop for TwitchChat {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.reader_task.abort();
            connection.writer_task.abort();
        }
    }
}

#[async_trait]
impl ChatTransport for TwitchChat {
    /// Connect and log in; resolves once the server accepted the login.
    async fn start(&self) -> Result<(), ChatError> {
        let mut login_events = self.events.subscribe();
        {
            let mut connection = self.connection.lock().await;
            if connection.is_some() {
                debug!("chat: already started");
                return Ok(());
            }

            let url = validate_url(&self.options.url)?;
            info!(url = %url, nick = %self.nick(), "chat: connecting");
            let (ws_stream, _) = connect_async(url.as_str()).await?;
            let (sink, stream) = ws_stream.split();

            let (outbound, outbound_rx) = mpsc::unbounded_channel();
            let writer_task = tokio::spawn(run_writer(sink, outbound_rx));
            let reader_task = tokio::spawn(run_reader(
                stream,
                outbound.clone(),
                self.events.clone(),
                self.nick().to_string(),
            ));
            for line in self.options.login.registration() {
                let _ = outbound.send(Message::Text(line));
            }
            *connection = Some(Connection {
                outbound,
                reader_task,
                writer_task,
            });
        }

        let outcome = tokio::time::timeout(LOGIN_TIMEOUT, async {
            loop {
                match login_events.recv().await {
                    Ok(ChatEvent::Ready) => return Ok(()),
                    Ok(ChatEvent::Disconnected { reason }) => {
                        return Err(ChatError::LoginRejected(reason))
                    }
                    Ok(ChatEvent::Message(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ChatError::NotConnected)
                    }
                }
            }
        })
        .await
        .unwrap_or_else(|_| Err(ChatError::LoginRejected("timed out".to_string())));

        if outcome.is_err() {
            self.stop().await;
        }
        outcome
    }

    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        let channel = normalize_channel(channel);
        let connection = self.connection.lock().await;
        let connection = connection.as_ref().ok_or(ChatError::NotConnected)?;
        info!(channel = %channel, "chat: joining channel");
        connection
            .outbound
            .send(Message::Text(format!("JOIN #{channel}")))
            .map_err(|_| ChatError::NotConnected)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    async fn stop(&self) {
        let Some(connection) = self.connection.lock().await.take() else {
            return;
        };
        info!("chat: stopping");
        let _ = connection.outbound.send(Message::Close(None));
        connection.reader_task.abort();
        let _ = self.events.send(ChatEvent::Disconnected {
            reason: "stopped".to_string(),
        });
    }
}

fn validate_url(raw: &str) -> Result<Url, ChatError> {
    let url = Url::parse(raw).map_err(|err| ChatError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ChatError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}', expected ws or wss"),
        }),
    }
}

async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            warn!(error = %err, "chat: websocket send failed");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn run_reader(
    mut stream: SplitStream<WsStream>,
    outbound: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<ChatEvent>,
    nick: String,
) {
    let reason = 'session: loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break "connection closed".to_string(),
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                warn!(error = %err, "chat: websocket receive failed");
                break err.to_string();
            }
        };

        for raw in text.split("\r\n").filter(|raw| !raw.is_empty()) {
            let Some(line) = IrcLine::parse(raw) else {
                debug!(line = raw, "chat: unparsable line");
                continue;
            };
            if let Some(reason) = handle_line(&line, &outbound, &events, &nick) {
                break 'session reason;
            }
        }
    };

    info!(reason = %reason, "chat: disconnected");
    let _ = events.send(ChatEvent::Disconnected { reason });
}

/// Returns a reason when the line ends the session.
fn handle_line(
    line: &IrcLine,
    outbound: &mpsc::UnboundedSender<Message>,
    events: &broadcast::Sender<ChatEvent>,
    nick: &str,
) -> Option<String> {
    match line.command.as_str() {
        "001" => {
            info!(nick = %nick, "chat: logged in");
            let _ = events.send(ChatEvent::Ready);
        }
        "PING" => {
            let server = line.trailing().unwrap_or("tmi.twitch.tv");
            let _ = outbound.send(Message::Text(format!("PONG :{server}")));
        }
        "PRIVMSG" => {
            if let Some(message) = line.to_chat_message(Utc::now()) {
                debug!(
                    channel = %message.channel,
                    sender = %message.sender,
                    text = %message.text,
                    "chat: message"
                );
                let _ = events.send(ChatEvent::Message(message));
            }
        }
        "JOIN" => {
            if line.nick().is_some_and(|joined| joined.eq_ignore_ascii_case(nick)) {
                info!(channel = ?line.params.first(), "chat: joined channel");
            }
        }
        "NOTICE" => {
            let notice = line.trailing().unwrap_or_default();
            if notice.contains("Login authentication failed")
                || notice.contains("Improperly formatted auth")
            {
                warn!(notice = %notice, "chat: login rejected");
                return Some(notice.to_string());
            }
            info!(notice = %notice, "chat: notice");
        }
        "RECONNECT" => return Some("server requested reconnect".to_string()),
        _ => {}
    }
    None
}

#[cfg(test)]
#[path = "tests/twitch_tests.rs"]
mod tests;
