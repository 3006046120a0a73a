//! Shared helpers.
//!
//! - **URL validation**: feed URLs are checked before any request is made so
//!   a misconfigured collection cannot be pointed at internal services.

mod url_validator;

pub use url_validator::{validate_feed_url, HostPolicy, UrlValidationError};
