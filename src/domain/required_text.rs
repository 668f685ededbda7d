/// A user-submitted string that must be present and non-blank. Surrounding
/// whitespace is stripped on parse.
///
/// Must be instantiated with `RequiredText::parse`; the field is left private
/// so that an empty value can never be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredText(String);

impl RequiredText {
    /// `field` is only used for the error message.
    pub fn parse(
        value: Option<String>,
        field: &str,
    ) -> Result<Self, String> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Ok(Self(v)),
            _ => Err(format!("Missing required field: {field}")),
        }
    }
}

impl AsRef<str> for RequiredText {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for RequiredText {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
