use actix_web::web;
use actix_web::HttpResponse;
use serde::Deserialize;

use super::sync_lead;
use super::IntakeError;
use super::LeadResponse;
use super::SyncPolicy;
use crate::domain::optional_text;
use crate::domain::NewsletterLead;
use crate::domain::RequiredText;
use crate::mailing_list::MailingListClient;
use crate::mailing_list::MailingListContact;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterForm {
    email: Option<String>,
    source: Option<String>,
    resource_slug: Option<String>,
}

impl TryFrom<NewsletterForm> for NewsletterLead {
    type Error = String;
    fn try_from(value: NewsletterForm) -> Result<Self, Self::Error> {
        Ok(NewsletterLead {
            email: RequiredText::parse(value.email, "email")?,
            source: optional_text(value.source),
            resource_slug: optional_text(value.resource_slug),
        })
    }
}

/// Always `newsletter`, plus the source and `article:<slug>` when given.
fn mailing_list_contact(lead: &NewsletterLead) -> MailingListContact {
    let mut contact = MailingListContact::new(lead.email.as_ref()).tag("newsletter");
    if let Some(source) = &lead.source {
        contact = contact.tag(source);
    }
    if let Some(slug) = &lead.resource_slug {
        contact = contact.tag(format!("article:{slug}"));
    }
    contact
}

/// `POST /api/newsletter/subscribe`
///
/// No email is sent here, so the mailing-list sync is the whole request: a
/// provider rejection is reported back to the user (400, provider's
/// message), any other failure is a 500.
#[tracing::instrument(
    name = "Subscribing to newsletter",
    skip(body, mailing_list),
    fields(lead_email = tracing::field::Empty)
)]
pub async fn subscribe(
    body: web::Json<NewsletterForm>,
    mailing_list: web::Data<MailingListClient>,
) -> Result<HttpResponse, IntakeError> {
    let lead: NewsletterLead = body.into_inner().try_into().map_err(IntakeError::Validation)?;
    tracing::Span::current().record("lead_email", tracing::field::display(&lead.email));

    sync_lead(
        &mailing_list,
        &mailing_list_contact(&lead),
        SyncPolicy::Critical,
    )
    .await?;

    Ok(LeadResponse::ok())
}
