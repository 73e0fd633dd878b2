//! Banner aggregate types shared by the revision store, cache and service.
//!
//! Purpose: describe banners, their revisions and the live projection served
//! to callers. Identifiers are thin `i64` newtypes so feature, tag, banner and
//! revision ids cannot be swapped by accident at call sites.
//!
//! Content payloads are opaque JSON documents. They are stored and returned
//! verbatim and never interpreted by the domain.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw integer identifier.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Return the raw integer identifier.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id! {
    /// Surrogate key of a banner, generated by the store on creation.
    BannerId
}

integer_id! {
    /// Surrogate key of a stored revision.
    RevisionId
}

integer_id! {
    /// Integer classifier used to select live content.
    FeatureId
}

integer_id! {
    /// External tag identifier; there is no tag entity, only the integer.
    TagId
}

/// Set of tag identifiers attached to a revision.
///
/// Duplicates are collapsed and iteration is always in ascending order, so
/// two `TagIds` built from the same ids in a different order compare equal.
///
/// # Examples
/// ```
/// use banners::domain::{TagId, TagIds};
///
/// let tags = TagIds::from_iter([3, 1, 3].map(TagId::new));
/// assert_eq!(tags.to_vec(), vec![TagId::new(1), TagId::new(3)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagIds(BTreeSet<TagId>);

impl TagIds {
    /// Build an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the set holds no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `tag_id` is part of the set.
    pub fn contains(&self, tag_id: TagId) -> bool {
        self.0.contains(&tag_id)
    }

    /// Iterate tags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TagId> + '_ {
        self.0.iter().copied()
    }

    /// Collect the tags into an ascending vector.
    pub fn to_vec(&self) -> Vec<TagId> {
        self.iter().collect()
    }
}

impl FromIterator<TagId> for TagIds {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Payload for creating a banner together with its first revision.
///
/// # Example
///
/// ```
/// use banners::domain::{FeatureId, NewBanner, TagId};
/// use serde_json::json;
///
/// let banner = NewBanner {
///     feature_id: FeatureId::new(3),
///     tag_ids: [TagId::new(1), TagId::new(4)].into_iter().collect(),
///     content: json!({"title": "spring sale"}),
///     is_active: true,
/// };
/// assert_eq!(banner.tag_ids.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewBanner {
    /// Feature the first revision targets.
    pub feature_id: FeatureId,
    /// Tags the first revision is served for; may be empty.
    pub tag_ids: TagIds,
    /// Opaque JSON body.
    pub content: Value,
    /// Whether clients should display the content.
    pub is_active: bool,
}

/// Content currently served for a `(tag, feature)` pair.
///
/// This is also the value stored in the lookaside cache, so its serde shape
/// is the cache wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveContent {
    /// JSON body of the chosen revision.
    pub content: Value,
    /// Active flag of the chosen revision.
    pub is_active: bool,
}

/// A stored revision annotated with its tag associations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Revision {
    /// Store-assigned identifier, increasing in insertion order.
    pub revision_id: RevisionId,
    /// Owning banner.
    pub banner_id: BannerId,
    /// Feature this revision targets.
    pub feature_id: FeatureId,
    /// Tags this revision is served for.
    pub tag_ids: TagIds,
    /// Opaque JSON body.
    pub content: Value,
    /// Whether clients should display the content.
    pub is_active: bool,
    /// Set once on insert.
    pub created_at: DateTime<Utc>,
    /// Refreshed by every applied patch.
    pub updated_at: DateTime<Utc>,
}

/// A banner paired with its chosen revision, as returned by live listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveBanner {
    /// The banner being served.
    pub banner_id: BannerId,
    /// Its chosen revision.
    pub revision: Revision,
}

/// Partial update applied in place to a banner's chosen revision.
///
/// Every field is presence aware: `None` leaves the stored value untouched,
/// `Some` overwrites it, including zero values such as `false` or an empty
/// tag set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerPatch {
    /// Replacement active flag.
    pub is_active: Option<bool>,
    /// Replacement feature.
    pub feature_id: Option<FeatureId>,
    /// Replacement JSON body.
    pub content: Option<Value>,
    /// Replacement tag set; an empty set clears every association.
    pub tag_ids: Option<TagIds>,
}

impl BannerPatch {
    /// Whether the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none()
            && self.feature_id.is_none()
            && self.content.is_none()
            && self.tag_ids.is_none()
    }
}

/// Acknowledgement that a criteria-based delete was queued, not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionAccepted {
    /// Feature criterion of the queued delete.
    pub feature_id: FeatureId,
    /// Tag criterion of the queued delete.
    pub tag_id: TagId,
}
