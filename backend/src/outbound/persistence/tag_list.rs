//! Decoding of aggregated tag lists.
//!
//! Listing queries fold each revision's tags into one text column. The text is
//! a comma-separated list of integers, optionally wrapped in parentheses or
//! braces. An empty list (or one holding only the wrapper) decodes to no
//! tags, and a single element needs no separator.

use thiserror::Error;

use crate::domain::{TagId, TagIds};

/// Raised when aggregated tag text cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tag list {raw:?}: {reason}")]
pub struct TagListError {
    raw: String,
    reason: String,
}

/// Parse an aggregated tag list into a tag set.
pub fn parse_tag_list(raw: &str) -> Result<TagIds, TagListError> {
    let trimmed = raw.trim();
    let inner = strip_wrapper(trimmed, '(', ')')
        .or_else(|| strip_wrapper(trimmed, '{', '}'))
        .unwrap_or(trimmed)
        .trim();

    if inner.is_empty() {
        return Ok(TagIds::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map(TagId::new)
                .map_err(|err| TagListError {
                    raw: raw.to_owned(),
                    reason: format!("{:?}: {err}", part.trim()),
                })
        })
        .collect()
}

fn strip_wrapper(value: &str, open: char, close: char) -> Option<&str> {
    value.strip_prefix(open)?.strip_suffix(close)
}
