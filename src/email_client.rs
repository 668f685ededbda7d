use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use secrecy::ExposeSecret;
use tera::Context;
use tera::Tera;

use crate::configuration::SmtpSettings;
use crate::domain::ContactLead;
use crate::domain::ResourceLead;
use crate::domain::ResourceType;
use crate::utils::error_chain_fmt;

/// One outgoing email. Built per request, sent once, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[derive(thiserror::Error)]
pub enum MailError {
    /// Missing SMTP credentials or operator recipient. This is a deployment
    /// defect, not a runtime condition.
    #[error("{0}")]
    Configuration(String),
    #[error("Failed to deliver email")]
    Delivery(#[source] anyhow::Error),
    #[error("Failed to render email template")]
    Template(#[from] tera::Error),
}

impl Debug for MailError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Anything that can put an `EmailMessage` on the wire. `SmtpMailer` in
/// production; tests swap in an in-memory recorder.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(
        &self,
        message: &EmailMessage,
    ) -> Result<(), MailError>;
}

type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

pub struct SmtpMailer {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    /// Returns `Ok(None)` if any of host/port/username/password (or a sender
    /// address) is missing; the caller decides what running without mail
    /// means. Port 465 uses implicit TLS, every other port STARTTLS.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Option<Self>, anyhow::Error> {
        let (Some((host, port, username, password)), Some(sender)) =
            (settings.connection(), settings.sender())
        else {
            return Ok(None);
        };

        let from: Mailbox = sender
            .parse()
            .with_context(|| format!("Invalid SMTP sender address: {sender:?}"))?;

        let builder = match port {
            465 => SmtpTransport::relay(host),
            _ => SmtpTransport::starttls_relay(host),
        }
        .with_context(|| format!("Failed to create SMTP relay for {host}"))?;

        let mailer = builder
            .port(port)
            .credentials(Credentials::new(
                username.to_string(),
                password.expose_secret().to_string(),
            ))
            .timeout(settings.timeout_milliseconds.map(Duration::from_millis))
            .build();

        Ok(Some(Self { mailer, from }))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    #[tracing::instrument(
        name = "Delivering email over SMTP",
        skip_all,
        fields(subject = %message.subject)
    )]
    async fn deliver(
        &self,
        message: &EmailMessage,
    ) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML);

        for recipient in &message.recipients {
            let to: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient address: {recipient:?}"))
                .map_err(MailError::Delivery)?;
            builder = builder.to(to);
        }

        let email = builder
            .body(message.html_body.clone())
            .context("Failed to build email")
            .map_err(MailError::Delivery)?;

        self.mailer
            .send(email)
            .await
            .context("SMTP server did not accept the message")
            .map_err(MailError::Delivery)?;
        Ok(())
    }
}

const CONTACT_NOTIFICATION: &str = "contact_notification.html";
const CONTACT_CONFIRMATION: &str = "contact_confirmation.html";
const RESOURCE_LEAD_NOTIFICATION: &str = "resource_lead_notification.html";
const RESOURCE_LEAD: &str = "resource_lead.html";

/// Composes templated lead emails on top of a `MailTransport`.
///
/// Both the transport and the operator recipient are optional; when absent,
/// the operations that need them fail with `MailError::Configuration` without
/// touching the network.
///
/// `EmailClient` is cheap to clone; it is shared across actix workers via
/// `web::Data`.
#[derive(Clone)]
pub struct EmailClient {
    transport: Option<Arc<dyn MailTransport>>,
    operator: Option<String>,
    templates: Arc<Tera>,
}

impl EmailClient {
    pub fn new(
        transport: Option<Arc<dyn MailTransport>>,
        operator: Option<String>,
    ) -> Result<Self, MailError> {
        let mut templates = Tera::default();
        // `.html` names enable autoescaping of every interpolated value
        templates.add_raw_templates(vec![
            (
                CONTACT_NOTIFICATION,
                include_str!("../templates/emails/contact_notification.html"),
            ),
            (
                CONTACT_CONFIRMATION,
                include_str!("../templates/emails/contact_confirmation.html"),
            ),
            (
                RESOURCE_LEAD_NOTIFICATION,
                include_str!("../templates/emails/resource_lead_notification.html"),
            ),
            (
                RESOURCE_LEAD,
                include_str!("../templates/emails/resource_lead.html"),
            ),
        ])?;

        Ok(Self {
            transport,
            operator: operator.filter(|o| !o.trim().is_empty()),
            templates: Arc::new(templates),
        })
    }

    /// The primitive all other operations are built on.
    pub async fn send(
        &self,
        to: &[&str],
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            MailError::Configuration("SMTP transport is not configured".to_string())
        })?;
        let message = EmailMessage {
            recipients: to.iter().map(|r| r.to_string()).collect(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        };
        transport.deliver(&message).await
    }

    fn operator(&self) -> Result<&str, MailError> {
        self.operator.as_deref().ok_or_else(|| {
            MailError::Configuration("Notification recipient is not configured".to_string())
        })
    }

    /// Tell the operator about a new contact form submission.
    #[tracing::instrument(name = "Notifying operator of contact submission", skip_all)]
    pub async fn notify_contact_submission(
        &self,
        lead: &ContactLead,
    ) -> Result<(), MailError> {
        let operator = self.operator()?;

        let mut ctx = Context::new();
        ctx.insert("name", lead.name.as_ref());
        ctx.insert("email", lead.email.as_ref());
        ctx.insert("company", &lead.company);
        ctx.insert("source", &lead.source);
        ctx.insert("message", lead.message.as_ref());
        let html = self.templates.render(CONTACT_NOTIFICATION, &ctx)?;

        self.send(
            &[operator],
            &format!("New contact form submission from {}", lead.name),
            &html,
        )
        .await
    }

    /// Acknowledge receipt to the person who filled in the contact form.
    #[tracing::instrument(name = "Confirming contact submission", skip_all)]
    pub async fn confirm_contact_received(
        &self,
        lead: &ContactLead,
    ) -> Result<(), MailError> {
        let mut ctx = Context::new();
        ctx.insert("name", lead.name.as_ref());
        ctx.insert("message", lead.message.as_ref());
        let html = self.templates.render(CONTACT_CONFIRMATION, &ctx)?;

        self.send(&[lead.email.as_ref()], "Thanks for reaching out", &html)
            .await
    }

    /// Sends exactly two emails: an internal notification, then the
    /// download/webinar email to the lead. The operator recipient is checked
    /// before either is sent.
    #[tracing::instrument(
        name = "Sending resource lead emails",
        skip_all,
        fields(resource_type = %lead.resource_type)
    )]
    pub async fn notify_resource_lead(
        &self,
        lead: &ResourceLead,
    ) -> Result<(), MailError> {
        let operator = self.operator()?;

        let mut ctx = Context::new();
        ctx.insert("email", lead.email.as_ref());
        ctx.insert("company_name", lead.company_name.as_ref());
        ctx.insert("resource_title", lead.resource_title.as_ref());
        ctx.insert("resource_type", lead.resource_type.as_str());
        // rendered with `| safe`
        ctx.insert("link", &lead.link().map(htmlescape::encode_attribute));

        let internal = self.templates.render(RESOURCE_LEAD_NOTIFICATION, &ctx)?;
        self.send(
            &[operator],
            &format!("New resource lead: {}", lead.resource_title),
            &internal,
        )
        .await?;

        let subject = match lead.resource_type {
            ResourceType::Download => format!("Your download: {}", lead.resource_title),
            ResourceType::Webinar => format!("Your webinar registration: {}", lead.resource_title),
        };
        let html = self.templates.render(RESOURCE_LEAD, &ctx)?;
        self.send(&[lead.email.as_ref()], &subject, &html).await
    }
}
