//! Lead intake for the agency website: contact form, newsletter sign-up and
//! gated resource requests.
//!
//! Each endpoint validates its JSON body, sends whatever emails it owes
//! (`email_client`), then pushes the lead to the mailing-list provider
//! (`mailing_list`). See `routes` for which of those steps may fail the
//! request.

pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod mailing_list;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod utils;
