//! Linux-safe filename sanitization.

use crate::storage::TEMP_SUFFIX;

const NAME_MAX: usize = 255;

/// Longest artifact name whose part file still fits in NAME_MAX.
const MAX_ARTIFACT_NAME: usize = NAME_MAX - TEMP_SUFFIX.len();

/// Makes a URL path segment safe to use as a file name on Linux.
///
/// - NUL, `/`, `\`, whitespace and control characters become `_`
/// - Leading dots are stripped so artifacts never become hidden files
/// - The result is capped on a char boundary so that `<name>.part` fits in NAME_MAX
pub fn sanitize_filename(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_start_matches('.');
    let mut take = trimmed.len().min(MAX_ARTIFACT_NAME);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
