use std::{collections::HashMap, io::ErrorKind, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::{
    error::describe_close_code,
    protocol::{
        event_subscription, Identify, ObsMessage, RequestBatch, RequestResponse, SceneEvent,
        SceneRequest, RPC_VERSION,
    },
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::CloseFrame, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    auth::authentication_string, ensure_success, retry_connect, ConnectError, RetryPolicy,
    SceneClientError, SceneTransport,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ObsConnectOptions {
    pub url: String,
    pub password: Option<String>,
    pub event_subscriptions: u32,
    pub request_timeout: Duration,
}

impl ObsConnectOptions {
    pub fn new(url: impl Into<String>, password: Option<String>) -> Self {
        Self {
            url: url.into(),
            password,
            event_subscriptions: event_subscription::SCENES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

enum PendingReply {
    Single(oneshot::Sender<RequestResponse>),
    Batch(oneshot::Sender<Vec<RequestResponse>>),
}

type PendingReplies = Arc<Mutex<HashMap<String, PendingReply>>>;

/// obs-websocket v5 session.
///
/// One reader task routes responses to waiting callers by `requestId` and
/// fans events out on a broadcast channel; one writer task owns the sink.
pub struct ObsClient {
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    events: broadcast::Sender<SceneEvent>,
    request_timeout: Duration,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl ObsClient {
    pub async fn connect(options: ObsConnectOptions) -> Result<Self, ConnectError> {
        let url = validate_url(&options.url)?;
        info!(url = %url, "scene: connecting");
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(|err| match err {
            tungstenite::Error::Io(io) if io.kind() == ErrorKind::ConnectionRefused => {
                ConnectError::Refused {
                    url: options.url.clone(),
                }
            }
            other => ConnectError::WebSocket(other),
        })?;
        let (mut sink, mut stream) = ws_stream.split();

        info!("scene: waiting for identification handshake");
        tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            identify(&mut sink, &mut stream, &options),
        )
        .await
        .map_err(|_| ConnectError::Handshake("timed out".to_string()))??;
        info!(url = %url, "scene: identified");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let writer_task = tokio::spawn(run_writer(sink, outbound_rx));
        let reader_task = tokio::spawn(run_reader(
            stream,
            Arc::clone(&pending),
            events.clone(),
        ));

        Ok(Self {
            outbound,
            pending,
            events,
            request_timeout: options.request_timeout,
            reader_task,
            writer_task,
        })
    }

    pub async fn connect_with_retry(
        options: ObsConnectOptions,
        policy: RetryPolicy,
    ) -> Result<Self, ConnectError> {
        let url = options.url.clone();
        retry_connect(policy, &url, |attempt| {
            let options = options.clone();
            async move {
                debug!(attempt, "scene: connect attempt");
                Self::connect(options).await
            }
        })
        .await
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    fn send(&self, message: ObsMessage) -> Result<(), SceneClientError> {
        let text = message.to_json()?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| SceneClientError::ConnectionClosed)
    }

    async fn await_reply<T>(
        &self,
        request_id: &str,
        rx: oneshot::Receiver<T>,
        what: &str,
    ) -> Result<T, SceneClientError> {
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(SceneClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(request_id);
                Err(SceneClientError::Timeout(what.to_string()))
            }
        }
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[async_trait]
impl SceneTransport for ObsClient {
    async fn call(&self, request: SceneRequest) -> Result<RequestResponse, SceneClientError> {
        let request_id = Uuid::new_v4().to_string();
        let request_type = request.request_type();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(request_id.clone(), PendingReply::Single(tx));

        if let Err(err) = self.send(ObsMessage::Request(request.into_request(request_id.clone())))
        {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        let response = self.await_reply(&request_id, rx, request_type).await?;
        ensure_success(response)
    }

    async fn call_batch(
        &self,
        requests: Vec<SceneRequest>,
    ) -> Result<Vec<RequestResponse>, SceneClientError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let expected = requests.len();
        let batch_id = Uuid::new_v4().to_string();
        let batch = RequestBatch::new(
            batch_id.clone(),
            requests
                .into_iter()
                .map(|request| request.into_request(Uuid::new_v4().to_string()))
                .collect(),
        );
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(batch_id.clone(), PendingReply::Batch(tx));

        if let Err(err) = self.send(ObsMessage::RequestBatch(batch)) {
            self.pending.lock().await.remove(&batch_id);
            return Err(err);
        }

        let results = self.await_reply(&batch_id, rx, "request batch").await?;
        if results.len() != expected {
            return Err(SceneClientError::BatchLengthMismatch {
                expected,
                actual: results.len(),
            });
        }
        Ok(results)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent> {
        self.events.subscribe()
    }
}

fn validate_url(raw: &str) -> Result<Url, ConnectError> {
    let url = Url::parse(raw).map_err(|err| ConnectError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConnectError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}', expected ws or wss"),
        }),
    }
}

async fn identify(
    sink: &mut SplitSink<WsStream, Message>,
    stream: &mut SplitStream<WsStream>,
    options: &ObsConnectOptions,
) -> Result<(), ConnectError> {
    let hello = match next_handshake_message(stream).await? {
        ObsMessage::Hello(hello) => hello,
        other => {
            return Err(ConnectError::Handshake(format!(
                "expected Hello, got {:?}",
                other.op_code()
            )))
        }
    };
    debug!(
        server_version = %hello.obs_web_socket_version,
        rpc_version = hello.rpc_version,
        auth_required = hello.authentication.is_some(),
        "scene: received hello"
    );

    let authentication = match (&hello.authentication, &options.password) {
        (Some(challenge), Some(password)) => Some(authentication_string(password, challenge)),
        (Some(_), None) => return Err(ConnectError::PasswordRequired),
        (None, _) => None,
    };
    let identify = ObsMessage::Identify(Identify {
        rpc_version: RPC_VERSION,
        authentication,
        event_subscriptions: options.event_subscriptions,
    });
    sink.send(Message::Text(identify.to_json()?)).await?;

    match next_handshake_message(stream).await? {
        ObsMessage::Identified(identified) => {
            debug!(
                rpc_version = identified.negotiated_rpc_version,
                "scene: negotiated rpc version"
            );
            Ok(())
        }
        other => Err(ConnectError::Handshake(format!(
            "expected Identified, got {:?}",
            other.op_code()
        ))),
    }
}

async fn next_handshake_message(
    stream: &mut SplitStream<WsStream>,
) -> Result<ObsMessage, ConnectError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => return Ok(ObsMessage::from_json(&text)?),
            Message::Close(frame) => return Err(ConnectError::Closed(close_reason(frame.as_ref()))),
            _ => {}
        }
    }
    Err(ConnectError::Closed("stream ended".to_string()))
}

fn close_reason(frame: Option<&CloseFrame<'_>>) -> String {
    let Some(frame) = frame else {
        return "no close frame".to_string();
    };
    let code = u16::from(frame.code);
    match describe_close_code(code) {
        Some(description) => format!("{description} ({code})"),
        None if frame.reason.is_empty() => format!("code {code}"),
        None => format!("{} ({code})", frame.reason),
    }
}

async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            warn!(error = %err, "scene: websocket send failed");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn run_reader(
    mut stream: SplitStream<WsStream>,
    pending: PendingReplies,
    events: broadcast::Sender<SceneEvent>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                info!(reason = %close_reason(frame.as_ref()), "scene: server closed session");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "scene: websocket receive failed");
                break;
            }
        };

        match ObsMessage::from_json(&text) {
            Ok(ObsMessage::RequestResponse(response)) => {
                let reply = pending.lock().await.remove(&response.request_id);
                match reply {
                    Some(PendingReply::Single(tx)) => {
                        let _ = tx.send(response);
                    }
                    Some(PendingReply::Batch(_)) | None => {
                        debug!(request_id = %response.request_id, "scene: unmatched response");
                    }
                }
            }
            Ok(ObsMessage::RequestBatchResponse(batch)) => {
                let reply = pending.lock().await.remove(&batch.request_id);
                match reply {
                    Some(PendingReply::Batch(tx)) => {
                        let _ = tx.send(batch.results);
                    }
                    Some(PendingReply::Single(_)) | None => {
                        debug!(request_id = %batch.request_id, "scene: unmatched batch response");
                    }
                }
            }
            Ok(ObsMessage::Event(event)) => match SceneEvent::try_from(event) {
                Ok(event) => {
                    let _ = events.send(event);
                }
                Err(err) => warn!(error = %err, "scene: invalid event payload"),
            },
            Ok(other) => debug!(op = ?other.op_code(), "scene: ignoring message"),
            Err(err) => warn!(error = %err, "scene: invalid message"),
        }
    }

    // Dropping the senders wakes every waiting caller with ConnectionClosed.
    pending.lock().await.clear();
}
