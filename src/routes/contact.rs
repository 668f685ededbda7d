use actix_web::web;
use actix_web::HttpResponse;
use anyhow::Context;
use serde::Deserialize;

use super::sync_lead;
use super::IntakeError;
use super::LeadResponse;
use super::SyncPolicy;
use crate::domain::optional_text;
use crate::domain::ContactLead;
use crate::domain::RequiredText;
use crate::email_client::EmailClient;
use crate::mailing_list::MailingListClient;
use crate::mailing_list::MailingListContact;

/// Every field is optional at the serde level so that a missing field ends up
/// as our own 400 envelope rather than a deserialization error.
#[derive(Deserialize)]
pub struct ContactForm {
    name: Option<String>,
    email: Option<String>,
    message: Option<String>,
    company: Option<String>,
    source: Option<String>,
}

impl TryFrom<ContactForm> for ContactLead {
    type Error = String;
    fn try_from(value: ContactForm) -> Result<Self, Self::Error> {
        Ok(ContactLead {
            name: RequiredText::parse(value.name, "name")?,
            email: RequiredText::parse(value.email, "email")?,
            message: RequiredText::parse(value.message, "message")?,
            company: optional_text(value.company),
            source: optional_text(value.source),
        })
    }
}

/// Tagged `contact_form` (plus the form's `source`, if any).
fn mailing_list_contact(lead: &ContactLead) -> MailingListContact {
    let (first_name, last_name) = lead.split_name();
    let mut contact = MailingListContact::new(lead.email.as_ref())
        .tag("contact_form")
        .merge_field("FNAME", first_name);
    if let Some(last_name) = last_name {
        contact = contact.merge_field("LNAME", last_name);
    }
    if let Some(company) = &lead.company {
        contact = contact.merge_field("COMPANY", company);
    }
    if let Some(source) = &lead.source {
        contact = contact.tag(source);
    }
    contact
}

/// `POST /api/contact`
///
/// 1. parse body (400 if name/email/message missing)
/// 2. notify the operator, then confirm to the submitter (either failing is
///    a 500)
/// 3. best-effort mailing-list sync
///
/// # Request example
///
/// ```sh
///     curl -v -H 'Content-Type: application/json' \
///         -d '{"name":"John","email":"john@foo.com","message":"hi"}' \
///         http://127.0.0.1:8000/api/contact
/// ```
#[tracing::instrument(
    name = "Handling contact form submission",
    skip(body, email_client, mailing_list),
    fields(
        lead_email = tracing::field::Empty,
        source = tracing::field::Empty,
    )
)]
pub async fn submit_contact(
    body: web::Json<ContactForm>,
    email_client: web::Data<EmailClient>,
    mailing_list: web::Data<MailingListClient>,
) -> Result<HttpResponse, IntakeError> {
    let lead: ContactLead = body.into_inner().try_into().map_err(IntakeError::Validation)?;

    tracing::Span::current().record("lead_email", tracing::field::display(&lead.email));
    if let Some(source) = &lead.source {
        tracing::Span::current().record("source", tracing::field::display(source));
    }

    email_client
        .notify_contact_submission(&lead)
        .await
        .context("Failed to notify operator of contact submission")?;
    email_client
        .confirm_contact_received(&lead)
        .await
        .context("Failed to send contact confirmation")?;

    sync_lead(
        &mailing_list,
        &mailing_list_contact(&lead),
        SyncPolicy::BestEffort,
    )
    .await?;

    Ok(LeadResponse::ok())
}
