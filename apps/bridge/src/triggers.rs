use std::sync::Arc;

use activation::ActivationController;
use anyhow::{bail, Context};
use async_trait::async_trait;
use chat::{ChatMessage, Trigger, TriggerHandler, TriggerRouter};
use tracing::info;

use crate::config::TriggerConfig;

/// Makes one managed object the visible one.
pub struct ActivateHandler {
    controller: Arc<ActivationController>,
    target: String,
}

impl ActivateHandler {
    pub fn new(controller: Arc<ActivationController>, target: impl Into<String>) -> Self {
        Self {
            controller,
            target: target.into(),
        }
    }
}

#[async_trait]
impl TriggerHandler for ActivateHandler {
    async fn handle(&self, message: &ChatMessage) -> anyhow::Result<()> {
        info!(
            sender = %message.sender,
            object = %self.target,
            "bridge: trigger matched"
        );
        let report = self
            .controller
            .activate(&self.target)
            .await
            .with_context(|| format!("failed to activate '{}'", self.target))?;
        if !report.is_complete() {
            bail!(
                "'{}' activated with {} failed filter write(s)",
                self.target,
                report.failed.len()
            );
        }
        Ok(())
    }
}

pub fn build_router(
    triggers: &[TriggerConfig],
    controller: &Arc<ActivationController>,
) -> anyhow::Result<TriggerRouter> {
    let mut router = TriggerRouter::default();
    for config in triggers {
        let handler = Arc::new(ActivateHandler::new(Arc::clone(controller), &config.target));
        router.push(
            Trigger::new(&config.pattern, handler)
                .with_context(|| format!("trigger for '{}'", config.target))?,
        );
    }
    Ok(router)
}

#[cfg(test)]
#[path = "tests/triggers_tests.rs"]
mod tests;
