//! Link mutation surface: batch validation and transactional edge writes.

pub mod mutate;
pub mod validate;

pub use mutate::{LinkOutcome, add_peer, create_links, remove_link, remove_peer};
pub use validate::{RejectReason, RejectedLink, Validation, validate_links};
