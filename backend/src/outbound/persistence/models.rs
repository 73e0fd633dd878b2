//! Internal Diesel row structs for the revision store.
//!
//! These types never leave the persistence layer; the repository converts
//! them into domain values before returning.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Jsonb, Text, Timestamptz};
use serde_json::Value;

use super::schema::{banner_revisions, revision_tags};

/// Insertable revision owned by a freshly created banner.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = banner_revisions)]
pub(crate) struct NewRevisionRow<'a> {
    pub banner_id: i64,
    pub feature_id: i64,
    pub content: &'a Value,
    pub is_active: bool,
}

/// One tag association.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = revision_tags)]
pub(crate) struct NewRevisionTagRow {
    pub revision_id: i64,
    pub tag_id: i64,
}

/// In-place update of a chosen revision. `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = banner_revisions)]
pub(crate) struct RevisionChangeset<'a> {
    pub feature_id: Option<i64>,
    pub content: Option<&'a Value>,
    pub is_active: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

/// Revision joined with its tag ids aggregated as comma-separated text.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct RevisionWithTagsRow {
    #[diesel(sql_type = BigInt)]
    pub revision_id: i64,
    #[diesel(sql_type = BigInt)]
    pub banner_id: i64,
    #[diesel(sql_type = BigInt)]
    pub feature_id: i64,
    #[diesel(sql_type = Jsonb)]
    pub content: Value,
    #[diesel(sql_type = Bool)]
    pub is_active: bool,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Text)]
    pub tag_ids: String,
}
