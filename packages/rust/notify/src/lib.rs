//! Delivery of confirmed leads: Markdown reports, email, and CRM submission.

mod crm;
mod mail;
mod report;

pub use crm::{CrmClient, LeadSink, LeadSubmission};
pub use mail::{GraphCredentials, GraphMailer, MailMessage, Mailer};
pub use report::{
    Attachment, MARKDOWN_CONTENT_TYPE, analysis_report, email_body, email_subject, sources_report,
};
