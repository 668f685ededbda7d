use std::fmt::Display;

/// What a resource lead asked for. Decides which link goes into the email
/// sent back to the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Download,
    Webinar,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Download => "download",
            ResourceType::Webinar => "webinar",
        }
    }
}

impl Display for ResourceType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exact, case-sensitive match
impl TryFrom<&str> for ResourceType {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "download" => Ok(Self::Download),
            "webinar" => Ok(Self::Webinar),
            other => Err(format!("Invalid resource type: {other:?}")),
        }
    }
}
