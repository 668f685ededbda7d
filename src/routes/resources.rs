use actix_web::web;
use actix_web::HttpResponse;
use anyhow::Context;
use serde::Deserialize;

use super::sync_lead;
use super::IntakeError;
use super::LeadResponse;
use super::SyncPolicy;
use crate::domain::optional_text;
use crate::domain::RequiredText;
use crate::domain::ResourceLead;
use crate::domain::ResourceType;
use crate::email_client::EmailClient;
use crate::mailing_list::MailingListClient;
use crate::mailing_list::MailingListContact;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLeadForm {
    email: Option<String>,
    company_name: Option<String>,
    resource_title: Option<String>,
    resource_type: Option<String>,
    download_url: Option<String>,
    webinar_url: Option<String>,
}

/// All four required fields are checked before the resource type, so a body
/// missing fields and carrying a bad type reports the missing fields.
impl TryFrom<ResourceLeadForm> for ResourceLead {
    type Error = String;
    fn try_from(value: ResourceLeadForm) -> Result<Self, Self::Error> {
        let email = RequiredText::parse(value.email, "email")?;
        let company_name = RequiredText::parse(value.company_name, "companyName")?;
        let resource_title = RequiredText::parse(value.resource_title, "resourceTitle")?;
        RequiredText::parse(value.resource_type.clone(), "resourceType")?;
        // exact match, no trimming
        let resource_type =
            ResourceType::try_from(value.resource_type.as_deref().unwrap_or_default())?;

        Ok(ResourceLead {
            email,
            company_name,
            resource_title,
            resource_type,
            download_url: optional_text(value.download_url),
            webinar_url: optional_text(value.webinar_url),
        })
    }
}

fn mailing_list_contact(lead: &ResourceLead) -> MailingListContact {
    MailingListContact::new(lead.email.as_ref())
        .tag("resource_lead")
        .tag(format!("resource:{}", lead.resource_type))
        .merge_field("COMPANY", lead.company_name.as_ref())
}

/// `POST /api/resources/lead`
///
/// Gated downloads and webinar sign-ups. Emails (internal + to the lead)
/// are the critical path; the mailing-list sync is best-effort.
#[tracing::instrument(
    name = "Handling resource lead",
    skip(body, email_client, mailing_list),
    fields(
        lead_email = tracing::field::Empty,
        resource_type = tracing::field::Empty,
    )
)]
pub async fn submit_resource_lead(
    body: web::Json<ResourceLeadForm>,
    email_client: web::Data<EmailClient>,
    mailing_list: web::Data<MailingListClient>,
) -> Result<HttpResponse, IntakeError> {
    let lead: ResourceLead = body.into_inner().try_into().map_err(IntakeError::Validation)?;

    tracing::Span::current()
        .record("lead_email", tracing::field::display(&lead.email))
        .record("resource_type", tracing::field::display(lead.resource_type));

    email_client
        .notify_resource_lead(&lead)
        .await
        .with_context(|| format!("Failed to send {} lead emails", lead.resource_type))?;

    sync_lead(
        &mailing_list,
        &mailing_list_contact(&lead),
        SyncPolicy::BestEffort,
    )
    .await?;

    Ok(LeadResponse::ok())
}
