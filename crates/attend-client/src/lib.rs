//! attend-client — HTTP clients for the recognition service and the
//! identity provider.

pub mod admin;
pub mod identity;
pub mod report;
pub mod submission;

pub use admin::{AdminClient, AdminError};
pub use identity::IdentityToolkitAuth;
pub use report::{build_report, format_date, format_time, ReportRow};
pub use submission::{classify, HttpSubmitter};
