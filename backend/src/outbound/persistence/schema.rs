//! Diesel table definitions for the revision store.
//!
//! Mirrors `migrations/2024-04-10-000000_create_banners/up.sql`.

diesel::table! {
    /// Banners and the revision each one currently serves.
    banners (banner_id) {
        banner_id -> Int8,
        chosen_revision_id -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Content snapshots owned by a banner.
    banner_revisions (revision_id) {
        revision_id -> Int8,
        banner_id -> Int8,
        feature_id -> Int8,
        content -> Jsonb,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Tag associations of a revision.
    revision_tags (revision_id, tag_id) {
        revision_id -> Int8,
        tag_id -> Int8,
    }
}

diesel::joinable!(banner_revisions -> banners (banner_id));
diesel::joinable!(revision_tags -> banner_revisions (revision_id));

diesel::allow_tables_to_appear_in_same_query!(banners, banner_revisions, revision_tags);
