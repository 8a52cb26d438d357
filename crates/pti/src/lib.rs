//! PTI - Pass The Image
//!
//! Shared pieces of the PTI image host: public hexcode identifiers,
//! filename derivation for stored uploads, and content type helpers.

pub mod hexcode;
pub mod media;
pub mod naming;

pub use hexcode::{HEXCODE_LEN, Hexcode, HexcodeError};
pub use media::{DEFAULT_ALLOWED_CONTENT_TYPES, content_type_for_name, extension_for_content_type};
pub use naming::{FALLBACK_NAME, numbered_name, sanitize_file_name, split_extension};
