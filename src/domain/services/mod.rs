//! Domain Services
//!
//! Business rules that span more than one entity.

mod posting_policy;

pub use posting_policy::{PostDenied, PostingPolicy};
