//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Typed events and the payload parser

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{IssueAction, IssueDetails, IssuesEvent, OpenedIssue, WebhookEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{
    SignatureError, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
