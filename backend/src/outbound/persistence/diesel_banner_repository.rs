//! PostgreSQL-backed `BannerRepository` implementation using Diesel.
//!
//! Multi-statement writes run inside one transaction; a failure at any step
//! rolls back every earlier step. Listing queries aggregate tag ids with
//! `string_agg` and decode them through [`parse_tag_list`].

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde_json::Value;

use crate::domain::ports::{BannerRepository, BannerRepositoryError};
use crate::domain::{
    BannerId, BannerPatch, FeatureId, LiveBanner, LiveContent, NewBanner, PageRequest, Revision,
    RevisionId, TagId, TagIds,
};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewRevisionRow, NewRevisionTagRow, RevisionChangeset, RevisionWithTagsRow};
use super::pool::DbPool;
use super::schema::{banner_revisions, banners, revision_tags};
use super::tag_list::parse_tag_list;

const LIST_REVISIONS_SQL: &str = r#"
SELECT br.revision_id, br.banner_id, br.feature_id, br.content, br.is_active,
       br.created_at, br.updated_at,
       COALESCE(string_agg(rt.tag_id::text, ',' ORDER BY rt.tag_id), '') AS tag_ids
FROM banner_revisions br
LEFT JOIN revision_tags rt ON rt.revision_id = br.revision_id
WHERE br.banner_id = $1
GROUP BY br.revision_id
ORDER BY br.revision_id
LIMIT $2 OFFSET $3
"#;

const LIST_LIVE_SQL: &str = r#"
SELECT br.revision_id, br.banner_id, br.feature_id, br.content, br.is_active,
       br.created_at, br.updated_at,
       COALESCE(string_agg(rt.tag_id::text, ',' ORDER BY rt.tag_id), '') AS tag_ids
FROM banners b
JOIN banner_revisions br ON br.revision_id = b.chosen_revision_id
LEFT JOIN revision_tags rt ON rt.revision_id = br.revision_id
WHERE br.feature_id = $1
  AND EXISTS (
      SELECT 1 FROM revision_tags wanted
      WHERE wanted.revision_id = br.revision_id AND wanted.tag_id = $2
  )
GROUP BY br.revision_id
ORDER BY br.banner_id
LIMIT $3 OFFSET $4
"#;

const DELETE_BY_FEATURE_TAG_SQL: &str = r#"
DELETE FROM banners
WHERE chosen_revision_id IN (
    SELECT br.revision_id
    FROM banner_revisions br
    JOIN revision_tags rt ON rt.revision_id = br.revision_id
    WHERE br.feature_id = $1 AND rt.tag_id = $2
)
"#;

/// Outcome of a transaction body: either a driver failure (rolled back and
/// mapped later) or a domain rejection detected mid-transaction.
#[derive(Debug)]
enum TransactionError {
    Diesel(diesel::result::Error),
    Rejected(BannerRepositoryError),
}

impl From<diesel::result::Error> for TransactionError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Diesel(value)
    }
}

impl From<TransactionError> for BannerRepositoryError {
    fn from(value: TransactionError) -> Self {
        match value {
            TransactionError::Diesel(err) => map_diesel_error(err),
            TransactionError::Rejected(err) => err,
        }
    }
}

/// Diesel-backed implementation of the revision store port.
#[derive(Clone)]
pub struct DieselBannerRepository {
    pool: DbPool,
}

impl DieselBannerRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn insert_tags(
    conn: &mut AsyncPgConnection,
    revision_id: i64,
    tag_ids: &TagIds,
) -> Result<(), diesel::result::Error> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewRevisionTagRow> = tag_ids
        .iter()
        .map(|tag_id| NewRevisionTagRow {
            revision_id,
            tag_id: tag_id.get(),
        })
        .collect();
    diesel::insert_into(revision_tags::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

fn revision_from_row(row: RevisionWithTagsRow) -> Result<Revision, BannerRepositoryError> {
    let tag_ids = parse_tag_list(&row.tag_ids)
        .map_err(|err| BannerRepositoryError::query(err.to_string()))?;
    Ok(Revision {
        revision_id: RevisionId::new(row.revision_id),
        banner_id: BannerId::new(row.banner_id),
        feature_id: FeatureId::new(row.feature_id),
        tag_ids,
        content: row.content,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl BannerRepository for DieselBannerRepository {
    async fn create_banner(&self, banner: &NewBanner) -> Result<BannerId, BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let created: Result<i64, TransactionError> = conn
            .transaction(|conn| {
                async move {
                    let banner_id: i64 = diesel::insert_into(banners::table)
                        .default_values()
                        .returning(banners::banner_id)
                        .get_result(conn)
                        .await?;

                    let revision_id: i64 = diesel::insert_into(banner_revisions::table)
                        .values(&NewRevisionRow {
                            banner_id,
                            feature_id: banner.feature_id.get(),
                            content: &banner.content,
                            is_active: banner.is_active,
                        })
                        .returning(banner_revisions::revision_id)
                        .get_result(conn)
                        .await?;

                    insert_tags(conn, revision_id, &banner.tag_ids).await?;

                    diesel::update(banners::table.find(banner_id))
                        .set(banners::chosen_revision_id.eq(revision_id))
                        .execute(conn)
                        .await?;

                    Ok(banner_id)
                }
                .scope_boxed()
            })
            .await;

        created.map(BannerId::new).map_err(Into::into)
    }

    async fn resolve_live_content(
        &self,
        tag_id: TagId,
        feature_id: FeatureId,
    ) -> Result<Option<LiveContent>, BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = banner_revisions::table
            .inner_join(
                banners::table
                    .on(banners::chosen_revision_id.eq(banner_revisions::revision_id.nullable())),
            )
            .inner_join(
                revision_tags::table
                    .on(revision_tags::revision_id.eq(banner_revisions::revision_id)),
            )
            .filter(banner_revisions::feature_id.eq(feature_id.get()))
            .filter(revision_tags::tag_id.eq(tag_id.get()))
            .order(banners::banner_id.asc())
            .select((banner_revisions::content, banner_revisions::is_active))
            .first::<(Value, bool)>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(|(content, is_active)| LiveContent { content, is_active }))
    }

    async fn select_revision(
        &self,
        banner_id: BannerId,
        revision_id: RevisionId,
    ) -> Result<(), BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome: Result<(), TransactionError> = conn
            .transaction(|conn| {
                async move {
                    let owned = banner_revisions::table
                        .filter(banner_revisions::banner_id.eq(banner_id.get()))
                        .filter(banner_revisions::revision_id.eq(revision_id.get()))
                        .select(banner_revisions::revision_id)
                        .first::<i64>(conn)
                        .await
                        .optional()?;
                    if owned.is_none() {
                        return Err(TransactionError::Rejected(
                            BannerRepositoryError::RevisionNotFound {
                                banner_id,
                                revision_id,
                            },
                        ));
                    }

                    diesel::update(banners::table.find(banner_id.get()))
                        .set(banners::chosen_revision_id.eq(revision_id.get()))
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        outcome.map_err(Into::into)
    }

    async fn list_revisions(
        &self,
        banner_id: BannerId,
        page: PageRequest,
    ) -> Result<Vec<Revision>, BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<RevisionWithTagsRow> = sql_query(LIST_REVISIONS_SQL)
            .bind::<BigInt, _>(banner_id.get())
            .bind::<BigInt, _>(page.limit())
            .bind::<BigInt, _>(page.offset())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(revision_from_row).collect()
    }

    async fn list_live(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
        page: PageRequest,
    ) -> Result<Vec<LiveBanner>, BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<RevisionWithTagsRow> = sql_query(LIST_LIVE_SQL)
            .bind::<BigInt, _>(feature_id.get())
            .bind::<BigInt, _>(tag_id.get())
            .bind::<BigInt, _>(page.limit())
            .bind::<BigInt, _>(page.offset())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|row| {
                let revision = revision_from_row(row)?;
                Ok(LiveBanner {
                    banner_id: revision.banner_id,
                    revision,
                })
            })
            .collect()
    }

    async fn patch_chosen_revision(
        &self,
        banner_id: BannerId,
        patch: &BannerPatch,
    ) -> Result<(), BannerRepositoryError> {
        let changeset = RevisionChangeset {
            feature_id: patch.feature_id.map(FeatureId::get),
            content: patch.content.as_ref(),
            is_active: patch.is_active,
            updated_at: Utc::now(),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome: Result<(), TransactionError> = conn
            .transaction(|conn| {
                async move {
                    let chosen = banners::table
                        .find(banner_id.get())
                        .select(banners::chosen_revision_id)
                        .for_update()
                        .first::<Option<i64>>(conn)
                        .await
                        .optional()?;
                    let revision_id = match chosen {
                        None => {
                            return Err(TransactionError::Rejected(
                                BannerRepositoryError::BannerNotFound { banner_id },
                            ));
                        }
                        Some(None) => {
                            return Err(TransactionError::Rejected(
                                BannerRepositoryError::NoChosenRevision { banner_id },
                            ));
                        }
                        Some(Some(revision_id)) => revision_id,
                    };

                    if let Some(tag_ids) = &patch.tag_ids {
                        diesel::delete(
                            revision_tags::table
                                .filter(revision_tags::revision_id.eq(revision_id)),
                        )
                        .execute(conn)
                        .await?;
                        insert_tags(conn, revision_id, tag_ids).await?;
                    }

                    diesel::update(banner_revisions::table.find(revision_id))
                        .set(&changeset)
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        outcome.map_err(Into::into)
    }

    async fn delete_banner(&self, banner_id: BannerId) -> Result<(), BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome: Result<(), TransactionError> = conn
            .transaction(|conn| {
                async move {
                    let deleted = diesel::delete(banners::table.find(banner_id.get()))
                        .execute(conn)
                        .await?;
                    if deleted == 0 {
                        return Err(TransactionError::Rejected(
                            BannerRepositoryError::BannerNotFound { banner_id },
                        ));
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await;

        outcome.map_err(Into::into)
    }

    async fn delete_by_feature_tag(
        &self,
        feature_id: FeatureId,
        tag_id: TagId,
    ) -> Result<u64, BannerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let outcome: Result<usize, TransactionError> = conn
            .transaction(|conn| {
                async move {
                    let deleted = sql_query(DELETE_BY_FEATURE_TAG_SQL)
                        .bind::<BigInt, _>(feature_id.get())
                        .bind::<BigInt, _>(tag_id.get())
                        .execute(conn)
                        .await?;
                    Ok(deleted)
                }
                .scope_boxed()
            })
            .await;

        outcome.map(|deleted| deleted as u64).map_err(Into::into)
    }
}
