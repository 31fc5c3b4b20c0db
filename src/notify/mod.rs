//! Outbound notification plumbing
//!
//! Everything between "an event happened" and "a subscriber's callback got
//! a POST": filter matching, payload envelopes, and the retried HTTP
//! delivery itself. The dispatch and aggregation loops that drive this
//! live in `crate::actors`.

pub mod delivery;
pub mod filter;
pub mod payload;

pub use delivery::{DeliveryError, NotificationSender};
