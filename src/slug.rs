//! Slug helpers shared by the parser, the store and the endpoint.

use regex::Regex;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-]+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]").unwrap());
static VALID_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\-]+$").unwrap());

/// Converts text into a lowercase identifier safe for file names and URLs.
///
/// Whitespace and dash runs become a single underscore, every other
/// non-word character is dropped.
///
/// # Example
/// ```
/// assert_eq!(docpipe::slug::slugify("Document Review & Approval"), "document_review__approval");
/// assert_eq!(docpipe::slug::slugify("Hello, World!"), "hello_world");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let joined = SEPARATORS.replace_all(&lowered, "_");
    NON_WORD.replace_all(&joined, "").into_owned()
}

/// Returns true when `id` can be used as a document identifier without
/// escaping its directory.
pub fn is_valid_identifier(id: &str) -> bool {
    VALID_SLUG.is_match(id)
}
