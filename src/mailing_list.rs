use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Debug;

use md5::Digest;
use md5::Md5;
use reqwest::Client;
use reqwest::Response;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use crate::configuration::MailingListSettings;
use crate::utils::error_chain_fmt;

/// The provider's identity for a contact: hex MD5 of the lowercased address.
/// Repeated syncs for the same address (in any letter case) always address
/// the same remote record.
pub fn subscriber_hash(email: &str) -> String { hex::encode(Md5::digest(email.to_lowercase().as_bytes())) }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
    Transactional,
}

/// What we want the provider to know about a lead. We only ever write this;
/// provider state is never read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailingListContact {
    pub email: String,
    /// Only applied when the provider creates the record; existing members
    /// keep their status.
    pub status_if_new: SubscriptionStatus,
    pub merge_fields: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

impl MailingListContact {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status_if_new: SubscriptionStatus::Subscribed,
            merge_fields: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn tag(
        mut self,
        tag: impl Into<String>,
    ) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn merge_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.merge_fields.insert(name.into(), value.into());
        self
    }

    pub fn subscriber_hash(&self) -> String { subscriber_hash(&self.email) }
}

#[derive(thiserror::Error)]
pub enum MailingListError {
    #[error("{0}")]
    Configuration(String),
    /// The provider answered with a non-2xx status. `detail` is the
    /// provider's own explanation, suitable for showing to users on 4xx.
    #[error("{detail}")]
    Api { status: u16, detail: String },
    #[error("Failed to reach the mailing-list provider")]
    Network(#[from] reqwest::Error),
}

impl MailingListError {
    /// The provider refused the input itself (e.g. an invalid address), as
    /// opposed to being unavailable.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }

    /// The provider's detail if this is a rejection, otherwise the error
    /// itself.
    pub fn into_rejection(self) -> Result<String, Self> {
        if !self.is_rejection() {
            return Err(self);
        }
        match self {
            Self::Api { detail, .. } => Ok(detail),
            e => Err(e),
        }
    }
}

impl Debug for MailingListError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(Serialize)]
struct UpsertMember<'a> {
    email_address: &'a str,
    status_if_new: SubscriptionStatus,
    merge_fields: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct MemberTags<'a> {
    tags: Vec<MemberTag<'a>>,
}

#[derive(Serialize)]
struct MemberTag<'a> {
    name: &'a str,
    status: &'static str,
}

/// Problem-details body returned by the provider on errors
#[derive(Deserialize)]
struct ProviderError {
    title: Option<String>,
    detail: Option<String>,
}

struct ProviderApi {
    base_url: String,
    api_key: Secret<String>,
    audience_id: String,
}

/// Client for the mailing-list provider's members API.
///
/// Establishing a HTTP connection is expensive, so a single `reqwest::Client`
/// is kept here and shared (via `web::Data`) by every request.
pub struct MailingListClient {
    http_client: Client,
    api: Option<ProviderApi>,
}

impl MailingListClient {
    /// Missing api key, audience or server prefix leaves the client
    /// unconfigured: every call then fails with `Configuration`.
    pub fn from_settings(settings: &MailingListSettings) -> Result<Self, MailingListError> {
        let http_client = Client::builder().timeout(settings.timeout()).build()?;

        let api = match (
            &settings.api_key,
            &settings.audience_id,
            settings.api_base_url(),
        ) {
            (Some(api_key), Some(audience_id), Some(base_url)) if !audience_id.trim().is_empty() => {
                Some(ProviderApi {
                    base_url,
                    api_key: api_key.clone(),
                    audience_id: audience_id.trim().to_string(),
                })
            }
            _ => None,
        };

        Ok(Self { http_client, api })
    }

    pub fn is_configured(&self) -> bool { self.api.is_some() }

    /// Create or update the member, then attach tags.
    ///
    /// The upsert is the only call whose failure is returned. Tags are only
    /// sent after a successful upsert, and a failure there is logged and
    /// swallowed: the member record itself is already saved.
    #[tracing::instrument(
        name = "Upserting mailing-list contact",
        skip_all,
        fields(subscriber_hash = tracing::field::Empty)
    )]
    pub async fn upsert_contact(
        &self,
        contact: &MailingListContact,
    ) -> Result<(), MailingListError> {
        let api = self.api.as_ref().ok_or_else(|| {
            MailingListError::Configuration("Mailing-list provider is not configured".to_string())
        })?;

        let hash = contact.subscriber_hash();
        tracing::Span::current().record("subscriber_hash", tracing::field::display(&hash));

        let resp = self
            .http_client
            .put(format!(
                "{}/lists/{}/members/{hash}",
                api.base_url, api.audience_id
            ))
            .basic_auth("anystring", Some(api.api_key.expose_secret()))
            .json(&UpsertMember {
                email_address: &contact.email,
                status_if_new: contact.status_if_new,
                merge_fields: &contact.merge_fields,
            })
            .send()
            .await?;
        error_for_status(resp).await?;

        if contact.tags.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.attach_tags(api, &hash, &contact.tags).await {
            tracing::warn!(
                error.cause_chain=?e,
                error.message=%e,
                "could not attach tags to mailing-list contact"
            );
        }
        Ok(())
    }

    async fn attach_tags(
        &self,
        api: &ProviderApi,
        hash: &str,
        tags: &BTreeSet<String>,
    ) -> Result<(), MailingListError> {
        let body = MemberTags {
            tags: tags
                .iter()
                .map(|name| MemberTag {
                    name,
                    status: "active",
                })
                .collect(),
        };
        let resp = self
            .http_client
            .post(format!(
                "{}/lists/{}/members/{hash}/tags",
                api.base_url, api.audience_id
            ))
            .basic_auth("anystring", Some(api.api_key.expose_secret()))
            .json(&body)
            .send()
            .await?;
        error_for_status(resp).await?;
        Ok(())
    }
}

/// Like `Response::error_for_status`, but keeps the provider's explanation.
async fn error_for_status(resp: Response) -> Result<Response, MailingListError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let fallback = status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string();
    let detail = resp
        .json::<ProviderError>()
        .await
        .ok()
        .and_then(|e| e.detail.or(e.title))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(fallback);
    Err(MailingListError::Api {
        status: status.as_u16(),
        detail,
    })
}
