mod contact;
mod health_check;
mod newsletter;
mod resources;
mod response;
mod sync_policy;
pub use contact::*;
pub use health_check::*;
pub use newsletter::*;
pub use resources::*;
pub use response::*;
pub use sync_policy::*;
