//! URL handling module for MX-Harvest
//!
//! This module provides the canonical-domain normalization used as the dedup
//! key, plus the helpers that turn a directory URL into numbered page URLs.

mod normalize;
mod pagination;

// Re-export main functions
pub use normalize::{normalize_domain, CanonicalDomain};
pub use pagination::{directory_base, page_param, page_url, PAGE_PARAM};
