//! HTTP security utilities.

/// Maximum body preview size for error messages (8KB).
///
/// When a request returns a non-2xx status, the response body is included
/// in the error for diagnosis. This constant bounds how much of it is read.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;
