pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{safe_truncate_chars, slugify, timestamped_dir_name};
pub use url_utils::{
    is_external_reference, is_local_output_reference, is_skippable_scheme, normalize_url,
    registered_domain, resolve_reference, same_registered_domain,
};
