//! Confirmation-code delivery seam. Delivery is an external
//! collaborator; the default implementation just logs the code, which
//! is enough for local development.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation_code(
        &self,
        recipient: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError>;
}

/// Writes the code to the log instead of sending anything.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation_code(
        &self,
        recipient: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        info!(
            "Confirmation code for {} <{}>: {}",
            username, recipient, code
        );
        Ok(())
    }
}
