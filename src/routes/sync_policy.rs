use super::IntakeError;
use crate::mailing_list::MailingListClient;
use crate::mailing_list::MailingListContact;

/// How a handler treats failure of the mailing-list step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Log and carry on; the request has already done its real work.
    BestEffort,
    /// The sync is the request. Provider rejections (4xx) become a 400 with
    /// the provider's detail, anything else a 500.
    Critical,
}

#[tracing::instrument(name = "Syncing lead to mailing list", skip(client, contact))]
pub async fn sync_lead(
    client: &MailingListClient,
    contact: &MailingListContact,
    policy: SyncPolicy,
) -> Result<(), IntakeError> {
    let Err(e) = client.upsert_contact(contact).await else {
        return Ok(());
    };

    match policy {
        SyncPolicy::BestEffort => {
            tracing::warn!(
                error.cause_chain=?e,
                error.message=%e,
                "mailing-list sync failed; continuing"
            );
            Ok(())
        }
        SyncPolicy::Critical => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "mailing-list sync failed"
            );
            match e.into_rejection() {
                Ok(detail) => Err(IntakeError::Rejected(detail)),
                Err(e) => Err(anyhow::Error::new(e)
                    .context("Mailing-list sync failed")
                    .into()),
            }
        }
    }
}
