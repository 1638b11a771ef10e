//! Transactional email.
//!
//! Uses SMTP via lettre with Askama HTML and text templates. When SMTP is not
//! configured the service is disabled and sends are skipped with a log line.

use askama::Template;
use chrono::{DateTime, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, instrument};

use synclune_core::Price;

use crate::config::EmailConfig;
use crate::models::order::{Order, OrderItem};

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a Order,
    items: &'a [OrderItem],
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a Order,
    items: &'a [OrderItem],
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct OrderShippedHtml<'a> {
    order: &'a Order,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct OrderShippedText<'a> {
    order: &'a Order,
}

#[derive(Template)]
#[template(path = "email/refund_processed.html")]
struct RefundProcessedHtml<'a> {
    order: &'a Order,
    amount: Price,
}

#[derive(Template)]
#[template(path = "email/refund_processed.txt")]
struct RefundProcessedText<'a> {
    order: &'a Order,
    amount: Price,
}

#[derive(Template)]
#[template(path = "email/deletion_requested.html")]
struct DeletionRequestedHtml<'a> {
    name: &'a str,
    scheduled_for: &'a str,
}

#[derive(Template)]
#[template(path = "email/deletion_requested.txt")]
struct DeletionRequestedText<'a> {
    name: &'a str,
    scheduled_for: &'a str,
}

#[derive(Template)]
#[template(path = "email/account_deleted.html")]
struct AccountDeletedHtml<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/account_deleted.txt")]
struct AccountDeletedText<'a> {
    name: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for customer notifications.
#[derive(Clone, Default)]
pub struct EmailService {
    mailer: Option<Mailer>,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl EmailService {
    /// Create the service; `None` disables sending.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer: Some(Mailer {
                transport,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// A service that never sends.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { mailer: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Confirmation sent once the payment is captured.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let html = OrderConfirmationHtml { order, items }.render()?;
        let text = OrderConfirmationText { order, items }.render()?;
        let subject = format!("Confirmation de votre commande {}", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Tracking details once the parcel leaves the workshop.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn send_order_shipped(&self, order: &Order) -> Result<(), EmailError> {
        let html = OrderShippedHtml { order }.render()?;
        let text = OrderShippedText { order }.render()?;
        let subject = format!("Votre commande {} est en route", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Notice of a completed refund.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn send_refund_processed(&self, order: &Order, amount: Price) -> Result<(), EmailError> {
        let html = RefundProcessedHtml { order, amount }.render()?;
        let text = RefundProcessedText { order, amount }.render()?;
        let subject = format!("Remboursement de votre commande {}", order.order_number);

        self.send_multipart_email(&order.customer_email, &subject, &text, &html)
            .await
    }

    /// Acknowledge an account deletion request.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip_all)]
    pub async fn send_deletion_requested(
        &self,
        to: &str,
        name: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<(), EmailError> {
        let scheduled_for = scheduled_for.format("%d/%m/%Y").to_string();
        let html = DeletionRequestedHtml {
            name,
            scheduled_for: &scheduled_for,
        }
        .render()?;
        let text = DeletionRequestedText {
            name,
            scheduled_for: &scheduled_for,
        }
        .render()?;

        self.send_multipart_email(to, "Demande de suppression de votre compte", &text, &html)
            .await
    }

    /// Farewell sent right before personal data is scrubbed.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip_all)]
    pub async fn send_account_deleted(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let html = AccountDeletedHtml { name }.render()?;
        let text = AccountDeletedText { name }.render()?;

        self.send_multipart_email(to, "Votre compte Synclune a été supprimé", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            info!(subject = %subject, "SMTP not configured, email skipped");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                mailer
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(mailer.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        mailer.transport.send(email).await?;

        info!(subject = %subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_templates_render() {
        let html = DeletionRequestedHtml {
            name: "Claire",
            scheduled_for: "17/11/2026",
        }
        .render()
        .unwrap();
        assert!(html.contains("Claire"));
        assert!(html.contains("17/11/2026"));

        let text = AccountDeletedText { name: "Claire" }.render().unwrap();
        assert!(text.contains("Claire"));
    }

    #[tokio::test]
    async fn test_disabled_service_skips_sending() {
        let service = EmailService::disabled();
        assert!(!service.is_enabled());
        assert!(
            service
                .send_account_deleted("claire@example.fr", "Claire")
                .await
                .is_ok()
        );
    }
}
