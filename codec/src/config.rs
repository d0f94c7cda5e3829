//! Limits applied while decoding untrusted input.

/// Default maximum length (in bytes) of a string or binary value.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 16 * 1024 * 1024;

/// Default maximum number of elements in a list, set, or map.
pub const DEFAULT_MAX_CONTAINER_LENGTH: usize = 16 * 1024 * 1024;

/// Default maximum nesting depth of structs and containers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for a [crate::Reader].
///
/// Every declared length is checked against these limits before any bytes are requested
/// from the underlying [crate::Input], so a corrupt header cannot trigger an oversized
/// allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum length (in bytes) of a string or binary value.
    pub max_string_length: usize,

    /// Maximum number of elements in a list, set, or map.
    pub max_container_length: usize,

    /// Maximum nesting depth of structs and containers.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_container_length: DEFAULT_MAX_CONTAINER_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
