//! Cache key addressing the live content of a `(tag, feature)` pair.
use thiserror::Error;

use crate::domain::{FeatureId, TagId};

const KEY_PREFIX: &str = "banner";

/// Cache key rendered as `banner:{tag_id}:{feature_id}`.
///
/// # Examples
/// ```
/// use banners::domain::ports::LiveContentCacheKey;
/// use banners::domain::{FeatureId, TagId};
///
/// let key = LiveContentCacheKey::new(TagId::new(4), FeatureId::new(3));
/// assert_eq!(key.as_str(), "banner:4:3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveContentCacheKey {
    tag_id: TagId,
    feature_id: FeatureId,
    rendered: String,
}

impl LiveContentCacheKey {
    /// Build the key for a tag and feature.
    pub fn new(tag_id: TagId, feature_id: FeatureId) -> Self {
        Self {
            tag_id,
            feature_id,
            rendered: format!("{KEY_PREFIX}:{tag_id}:{feature_id}"),
        }
    }

    /// Parse a rendered key back into its parts.
    pub fn parse(raw: &str) -> Result<Self, LiveContentCacheKeyError> {
        let mut parts = raw.split(':');
        let (Some(prefix), Some(tag), Some(feature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(LiveContentCacheKeyError::Malformed {
                raw: raw.to_owned(),
            });
        };
        if prefix != KEY_PREFIX {
            return Err(LiveContentCacheKeyError::Malformed {
                raw: raw.to_owned(),
            });
        }
        let parse_part = |part: &str| {
            part.parse::<i64>()
                .map_err(|_| LiveContentCacheKeyError::Malformed {
                    raw: raw.to_owned(),
                })
        };
        Ok(Self::new(
            TagId::new(parse_part(tag)?),
            FeatureId::new(parse_part(feature)?),
        ))
    }

    /// Tag component of the key.
    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    /// Feature component of the key.
    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    /// Borrow the rendered key.
    pub fn as_str(&self) -> &str {
        self.rendered.as_str()
    }
}

impl std::fmt::Display for LiveContentCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for LiveContentCacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Errors returned when parsing a [`LiveContentCacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveContentCacheKeyError {
    /// Key does not follow the `banner:{tag}:{feature}` layout.
    #[error("malformed live content cache key: {raw:?}")]
    Malformed { raw: String },
}
