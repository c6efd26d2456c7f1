pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{
    canonicalize_url, document_id, document_id_for_url, extract_domain, is_valid_url,
};
