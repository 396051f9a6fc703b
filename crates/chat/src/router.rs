use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tokio::{sync::broadcast, task::JoinHandle, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{ChatError, ChatEvent, ChatMessage, ChatTransport};

#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn handle(&self, message: &ChatMessage) -> anyhow::Result<()>;
}

/// A case-insensitive pattern bound to the handler it fires.
#[derive(Clone)]
pub struct Trigger {
    pattern: Regex,
    handler: Arc<dyn TriggerHandler>,
}

impl Trigger {
    pub fn new(pattern: &str, handler: Arc<dyn TriggerHandler>) -> Result<Self, ChatError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ChatError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { pattern, handler })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub matched: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct TriggerRouter {
    triggers: Vec<Trigger>,
}

impl TriggerRouter {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }

    pub fn push(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Run every matching handler concurrently and wait for all of them.
    pub async fn dispatch(&self, message: Arc<ChatMessage>) -> DispatchOutcome {
        let mut handlers = JoinSet::new();
        for trigger in self.triggers.iter().filter(|t| t.matches(&message.text)) {
            let handler = Arc::clone(&trigger.handler);
            let message = Arc::clone(&message);
            let pattern = trigger.pattern().to_string();
            handlers.spawn(async move {
                let result = handler.handle(&message).await;
                (pattern, result)
            });
        }

        let mut outcome = DispatchOutcome {
            matched: handlers.len(),
            failed: 0,
        };
        while let Some(joined) = handlers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((pattern, Err(err))) => {
                    outcome.failed += 1;
                    warn!(
                        pattern = %pattern,
                        sender = %message.sender,
                        error = %format!("{err:#}"),
                        "chat: trigger handler failed"
                    );
                }
                Err(err) => {
                    outcome.failed += 1;
                    warn!(error = %err, "chat: trigger handler panicked");
                }
            }
        }
        if outcome.matched > 0 {
            debug!(
                sender = %message.sender,
                matched = outcome.matched,
                failed = outcome.failed,
                "chat: message handled"
            );
        }
        outcome
    }
}

/// Feed chat events into `router` until the transport disconnects.
///
/// Joins `channel` whenever the transport reports it is ready. Each message
/// is dispatched on its own task so a slow handler never stalls intake.
pub fn spawn_intake(
    router: Arc<TriggerRouter>,
    transport: Arc<dyn ChatTransport>,
    channel: String,
) -> JoinHandle<()> {
    let mut events = transport.subscribe();
    if router.is_empty() {
        warn!(channel = %channel, "chat: no triggers configured; messages are ignored");
    }
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ChatEvent::Ready) => {
                    if let Err(err) = transport.join(&channel).await {
                        warn!(channel = %channel, error = %err, "chat: join failed");
                    }
                }
                Ok(ChatEvent::Message(message)) => {
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        router.dispatch(Arc::new(message)).await;
                    });
                }
                Ok(ChatEvent::Disconnected { reason }) => {
                    info!(reason = %reason, "chat: intake stopped");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "chat: intake lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
