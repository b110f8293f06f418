use async_trait::async_trait;

use crate::AuthResult;
use crate::config::MailSettings;

const TOKEN_PLACEHOLDER: &str = "{token}";

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail queue.
///
/// Delivery happens elsewhere; the core only enqueues.
#[async_trait]
pub trait MailDispatch: Send + Sync {
    /// Queue a message for delivery.
    async fn enqueue(&self, message: &RenderedMessage) -> AuthResult<()>;
}

/// Renders the email-verification message for `to`.
pub fn render_verification(settings: &MailSettings, to: &str, token: &str) -> RenderedMessage {
    let link = settings.verification_url.replace(TOKEN_PLACEHOLDER, token);
    RenderedMessage {
        to: to.to_string(),
        from: settings.from.clone(),
        subject: settings.verification_subject.clone(),
        body: format!(
            "Please confirm your email address by opening the link below.\n\n{link}\n\n\
             If you did not create an account, you can ignore this message.\n"
        ),
    }
}
