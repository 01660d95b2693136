//! Rewrites Konnektor responses before they reach the client: the
//! MIME/XOP document-retrieval body (scan and sanitize attachments) and
//! the `connector.sds` service directory (point endpoints back at this
//! proxy).

pub mod mime_xop;
pub mod sds;
pub mod soap;

pub use mime_xop::{rewrite_response, MutationPolicy};
pub use sds::rewrite_endpoints;
