use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tessera_auth::AuthResult;
use tessera_auth::error::AuthError;
use tessera_auth::mail::{MailDispatch, RenderedMessage};
use tokio::sync::Mutex;

/// Mail queue that keeps every enqueued message in memory.
#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    messages: Mutex<Vec<RenderedMessage>>,
    offline: AtomicBool,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline `enqueue` fails with `Dependency`.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Every message enqueued so far, oldest first.
    pub async fn messages(&self) -> Vec<RenderedMessage> {
        self.messages.lock().await.clone()
    }

    /// The newest message addressed to `to`.
    pub async fn last_for(&self, to: &str) -> Option<RenderedMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl MailDispatch for InMemoryMailbox {
    async fn enqueue(&self, message: &RenderedMessage) -> AuthResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::dependency("mail queue is offline"));
        }
        tracing::debug!(to = %message.to, subject = %message.subject, "mail enqueued");
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}
