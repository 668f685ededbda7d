mod lead;
mod required_text;
mod resource_type;
// allow external `use` statements to skip `lead` etc
pub use lead::optional_text;
pub use lead::ContactLead;
pub use lead::NewsletterLead;
pub use lead::ResourceLead;
pub use required_text::RequiredText;
pub use resource_type::ResourceType;
