//! Outbound webhook delivery.
//!
//! [`WebhookSender`] is the seam the delivery worker calls through;
//! [`HttpWebhookSender`] is the production implementation. Transport-level
//! retries (connection failures, 429, most 5xx) happen inside a single
//! `send`; the worker's queue-level retries are a separate, outer layer.

pub mod error;
pub mod retry;
pub mod sender;

pub use error::{SendError, SendErrorKind};
pub use retry::{RetryConfig, RetryResult, retry_with_backoff};
pub use sender::{HttpWebhookSender, WebhookSender};
