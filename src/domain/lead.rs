use super::RequiredText;
use super::ResourceType;

/// Parsed `POST /api/contact` body
#[derive(Debug, Clone)]
pub struct ContactLead {
    pub name: RequiredText,
    pub email: RequiredText,
    pub message: RequiredText,
    pub company: Option<String>,
    pub source: Option<String>,
}

impl ContactLead {
    /// First word of `name`, and everything after it (if anything)
    pub fn split_name(&self) -> (&str, Option<String>) {
        let mut words = self.name.as_ref().split_whitespace();
        let first = words.next().unwrap_or_default();
        let rest = words.collect::<Vec<_>>().join(" ");
        (first, (!rest.is_empty()).then_some(rest))
    }
}

/// Parsed `POST /api/newsletter/subscribe` body
#[derive(Debug, Clone)]
pub struct NewsletterLead {
    pub email: RequiredText,
    pub source: Option<String>,
    pub resource_slug: Option<String>,
}

/// Parsed `POST /api/resources/lead` body
#[derive(Debug, Clone)]
pub struct ResourceLead {
    pub email: RequiredText,
    pub company_name: RequiredText,
    pub resource_title: RequiredText,
    pub resource_type: ResourceType,
    pub download_url: Option<String>,
    pub webinar_url: Option<String>,
}

impl ResourceLead {
    /// The link relevant to `resource_type`, if one was supplied. Anything
    /// that is not an http(s) URL counts as absent.
    pub fn link(&self) -> Option<&str> {
        let link = match self.resource_type {
            ResourceType::Download => self.download_url.as_deref(),
            ResourceType::Webinar => self.webinar_url.as_deref(),
        }?;
        is_web_link(link).then_some(link)
    }
}

fn is_web_link(link: &str) -> bool {
    let link = link.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| link.len() > scheme.len() && link.starts_with(scheme))
}

/// Optional fields are trimmed; blank counts as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
