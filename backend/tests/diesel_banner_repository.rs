//! Integration tests for `DieselBannerRepository` against embedded PostgreSQL.
//!
//! Each test clones a freshly migrated template database. When the cluster
//! cannot be provisioned the fixture yields `None` and the test returns early
//! after printing the skip marker.

use std::time::Duration;

use banners::domain::ports::{BannerRepository, BannerRepositoryError};
use banners::domain::{
    BannerId, BannerPatch, FeatureId, NewBanner, PageRequest, RevisionId, TagId, TagIds,
};
use banners::outbound::persistence::{DbPool, DieselBannerRepository, PoolConfig};
use pg_embedded_setup_unpriv::TemporaryDatabase;
use postgres::{Client, NoTls};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

mod support;

use support::embedded_postgres::{count_rows, drop_table, execute_batch};
use support::{
    format_postgres_error, handle_cluster_setup_failure, provision_template_database,
    shared_cluster,
};

struct TestContext {
    runtime: Runtime,
    repository: DieselBannerRepository,
    database_url: String,
    _database: TemporaryDatabase,
}

impl TestContext {
    fn create(&self, feature: i64, tags: &[i64], content: Value) -> BannerId {
        let banner = new_banner(feature, tags, content);
        self.runtime
            .block_on(self.repository.create_banner(&banner))
            .expect("banner should be created")
    }

    fn revisions_of(&self, banner_id: BannerId) -> Vec<banners::domain::Revision> {
        let page = PageRequest::new(100, 0).expect("valid page");
        self.runtime
            .block_on(self.repository.list_revisions(banner_id, page))
            .expect("revisions should list")
    }

    /// Append an unchosen revision directly in SQL, returning its id.
    fn add_revision(&self, banner_id: BannerId, feature: i64, tags: &[i64], content: &Value) -> i64 {
        let mut client =
            Client::connect(&self.database_url, NoTls).expect("postgres client should connect");
        let body = content.to_string();
        let row = client
            .query_one(
                concat!(
                    "INSERT INTO banner_revisions (banner_id, feature_id, content, is_active) ",
                    "VALUES ($1, $2, $3::text::jsonb, true) RETURNING revision_id"
                ),
                &[&banner_id.get(), &feature, &body],
            )
            .unwrap_or_else(|err| panic!("insert revision: {}", format_postgres_error(&err)));
        let revision_id: i64 = row.get(0);
        for tag in tags {
            client
                .execute(
                    "INSERT INTO revision_tags (revision_id, tag_id) VALUES ($1, $2)",
                    &[&revision_id, tag],
                )
                .unwrap_or_else(|err| panic!("insert tag: {}", format_postgres_error(&err)));
        }
        revision_id
    }
}

fn new_banner(feature: i64, tags: &[i64], content: Value) -> NewBanner {
    NewBanner {
        feature_id: FeatureId::new(feature),
        tag_ids: tags.iter().copied().map(TagId::new).collect(),
        content,
        is_active: true,
    }
}

fn setup_context(max_size: u32) -> Result<TestContext, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = shared_cluster()?;
    let temp_db = provision_template_database(cluster)?;
    let database_url = temp_db.url().to_string();

    let config = PoolConfig::new(database_url.as_str())
        .with_max_size(max_size)
        .with_min_idle(Some(1))
        .with_connection_timeout(Duration::from_secs(5));
    let pool = runtime
        .block_on(async { DbPool::new(config).await })
        .map_err(|err| err.to_string())?;

    Ok(TestContext {
        runtime,
        repository: DieselBannerRepository::new(pool),
        database_url,
        _database: temp_db,
    })
}

#[fixture]
fn repo_context() -> Option<TestContext> {
    match setup_context(2) {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

/// Pool limited to one connection, so a leaked checkout stalls the next call.
#[fixture]
fn single_connection_context() -> Option<TestContext> {
    match setup_context(1) {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

#[rstest]
fn created_banner_is_resolvable_by_each_tag(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let content = json!({"title": "x"});
    ctx.create(3, &[1, 2, 3, 4], content.clone());

    for tag in [1, 4] {
        let live = ctx
            .runtime
            .block_on(
                ctx.repository
                    .resolve_live_content(TagId::new(tag), FeatureId::new(3)),
            )
            .expect("resolve should succeed")
            .expect("content should be live");
        assert_eq!(live.content, content);
        assert!(live.is_active);
    }

    let missing = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(5), FeatureId::new(3)),
        )
        .expect("resolve should succeed");
    assert_eq!(missing, None);
}

#[rstest]
fn create_leaves_no_rows_when_tag_insert_fails(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    drop_table(&ctx.database_url, "revision_tags").expect("drop revision_tags");

    let banner = new_banner(3, &[1, 2], json!({"title": "x"}));
    let err = ctx
        .runtime
        .block_on(ctx.repository.create_banner(&banner))
        .expect_err("create should fail without revision_tags");
    assert!(matches!(err, BannerRepositoryError::Query { .. }));

    assert_eq!(count_rows(&ctx.database_url, "banners").expect("count"), 0);
    assert_eq!(
        count_rows(&ctx.database_url, "banner_revisions").expect("count"),
        0
    );
}

const REJECT_REVISION_INSERT: &str = "
    CREATE FUNCTION reject_write() RETURNS trigger LANGUAGE plpgsql AS $$
    BEGIN RAISE EXCEPTION 'write rejected'; END $$;
    CREATE TRIGGER reject_revision_insert BEFORE INSERT ON banner_revisions
        FOR EACH ROW EXECUTE FUNCTION reject_write();
";

const REJECT_CHOSEN_REVISION_UPDATE: &str = "
    CREATE FUNCTION reject_write() RETURNS trigger LANGUAGE plpgsql AS $$
    BEGIN RAISE EXCEPTION 'write rejected'; END $$;
    CREATE TRIGGER reject_chosen_revision_update BEFORE UPDATE ON banners
        FOR EACH ROW EXECUTE FUNCTION reject_write();
";

#[rstest]
#[case::revision_insert(REJECT_REVISION_INSERT)]
#[case::chosen_revision_update(REJECT_CHOSEN_REVISION_UPDATE)]
fn create_leaves_no_rows_when_a_later_step_fails(
    repo_context: Option<TestContext>,
    #[case] failure: &str,
) {
    let Some(ctx) = repo_context else { return };
    execute_batch(&ctx.database_url, failure).expect("install failing trigger");

    let banner = new_banner(3, &[1, 2], json!({"title": "x"}));
    let err = ctx
        .runtime
        .block_on(ctx.repository.create_banner(&banner))
        .expect_err("create should fail when the trigger fires");
    assert!(matches!(err, BannerRepositoryError::Query { .. }));

    for table in ["banners", "banner_revisions", "revision_tags"] {
        assert_eq!(count_rows(&ctx.database_url, table).expect("count"), 0, "{table}");
    }
}

#[rstest]
fn cancelled_create_rolls_back_and_releases_its_connection(
    single_connection_context: Option<TestContext>,
) {
    let Some(ctx) = single_connection_context else { return };
    let mut blocker =
        Client::connect(&ctx.database_url, NoTls).expect("postgres client should connect");
    let mut lock = blocker.transaction().expect("begin lock transaction");
    lock.batch_execute("LOCK TABLE revision_tags IN ACCESS EXCLUSIVE MODE")
        .expect("lock revision_tags");

    let banner = new_banner(3, &[1, 2], json!({"title": "x"}));
    let outcome = ctx.runtime.block_on(tokio::time::timeout(
        Duration::from_millis(300),
        ctx.repository.create_banner(&banner),
    ));
    assert!(outcome.is_err(), "create should stall behind the table lock");

    lock.commit().expect("release lock");
    drop(blocker);

    assert_eq!(count_rows(&ctx.database_url, "banners").expect("count"), 0);
    assert_eq!(
        count_rows(&ctx.database_url, "banner_revisions").expect("count"),
        0
    );

    let next = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(1), FeatureId::new(3)),
        )
        .expect("the pool should hand out a usable connection");
    assert_eq!(next, None);
}

#[rstest]
fn create_with_no_tags_still_chooses_its_revision(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(9, &[], json!({"title": "untagged"}));

    let revisions = ctx.revisions_of(banner_id);
    assert_eq!(revisions.len(), 1);
    let revision = revisions.first().expect("one revision");
    assert!(revision.tag_ids.is_empty());
    assert_eq!(revision.banner_id, banner_id);
}

#[rstest]
fn selecting_foreign_revision_is_rejected(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let content = json!({"title": "original"});
    let banner_id = ctx.create(3, &[4], content.clone());

    let err = ctx
        .runtime
        .block_on(
            ctx.repository
                .select_revision(banner_id, RevisionId::new(999)),
        )
        .expect_err("revision 999 does not belong to the banner");
    assert!(err.is_not_found());

    let live = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(4), FeatureId::new(3)),
        )
        .expect("resolve")
        .expect("still live");
    assert_eq!(live.content, content);
}

#[rstest]
fn selecting_owned_revision_switches_live_content(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(3, &[4], json!({"title": "v1"}));
    let replacement = json!({"title": "v2"});
    let revision_id = ctx.add_revision(banner_id, 3, &[4], &replacement);

    ctx.runtime
        .block_on(
            ctx.repository
                .select_revision(banner_id, RevisionId::new(revision_id)),
        )
        .expect("owned revision should be selectable");

    let live = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(4), FeatureId::new(3)),
        )
        .expect("resolve")
        .expect("live");
    assert_eq!(live.content, replacement);
}

#[rstest]
fn selecting_another_banners_revision_is_rejected(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let first = ctx.create(3, &[4], json!({"title": "first"}));
    let second = ctx.create(3, &[5], json!({"title": "second"}));
    let foreign = ctx
        .revisions_of(second)
        .first()
        .map(|revision| revision.revision_id)
        .expect("second banner has a revision");

    let err = ctx
        .runtime
        .block_on(ctx.repository.select_revision(first, foreign))
        .expect_err("cross-banner selection must fail");
    assert_eq!(
        err,
        BannerRepositoryError::RevisionNotFound {
            banner_id: first,
            revision_id: foreign,
        }
    );
}

#[rstest]
fn patch_updates_chosen_revision_in_place(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(3, &[1, 2], json!({"title": "before"}));
    let before = ctx.revisions_of(banner_id);

    let patch = BannerPatch {
        is_active: Some(false),
        tag_ids: Some(TagIds::from_iter([TagId::new(7)])),
        ..BannerPatch::default()
    };
    ctx.runtime
        .block_on(ctx.repository.patch_chosen_revision(banner_id, &patch))
        .expect("patch should apply");

    let after = ctx.revisions_of(banner_id);
    assert_eq!(after.len(), before.len());
    let (old, new) = (before.first().expect("row"), after.first().expect("row"));
    assert_eq!(new.revision_id, old.revision_id);
    assert_eq!(new.content, old.content);
    assert_eq!(new.feature_id, old.feature_id);
    assert!(!new.is_active);
    assert_eq!(new.tag_ids.to_vec(), vec![TagId::new(7)]);
    assert!(new.updated_at >= old.updated_at);
}

#[rstest]
fn patch_with_empty_tag_set_clears_associations(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(3, &[1, 2], json!({"title": "tagged"}));

    let patch = BannerPatch {
        tag_ids: Some(TagIds::default()),
        ..BannerPatch::default()
    };
    ctx.runtime
        .block_on(ctx.repository.patch_chosen_revision(banner_id, &patch))
        .expect("patch should apply");

    let revision = ctx.revisions_of(banner_id).remove(0);
    assert!(revision.tag_ids.is_empty());
    let live = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(1), FeatureId::new(3)),
        )
        .expect("resolve");
    assert_eq!(live, None);
}

#[rstest]
fn patch_of_missing_banner_is_not_found(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let patch = BannerPatch {
        is_active: Some(true),
        ..BannerPatch::default()
    };
    let err = ctx
        .runtime
        .block_on(
            ctx.repository
                .patch_chosen_revision(BannerId::new(404), &patch),
        )
        .expect_err("missing banner");
    assert_eq!(
        err,
        BannerRepositoryError::BannerNotFound {
            banner_id: BannerId::new(404)
        }
    );
}

#[rstest]
#[case(0, 0, 0)]
#[case(2, 0, 2)]
#[case(5, 1, 2)]
#[case(5, 3, 0)]
#[case(5, 50, 0)]
fn list_live_honours_page_window(
    repo_context: Option<TestContext>,
    #[case] limit: i64,
    #[case] offset: i64,
    #[case] expected: usize,
) {
    let Some(ctx) = repo_context else { return };
    let ids: Vec<BannerId> = (0..3)
        .map(|n| ctx.create(3, &[4, n + 10], json!({ "n": n })))
        .collect();
    ctx.create(8, &[4], json!({"other": "feature"}));

    let page = PageRequest::new(limit, offset).expect("valid page");
    let live = ctx
        .runtime
        .block_on(
            ctx.repository
                .list_live(FeatureId::new(3), TagId::new(4), page),
        )
        .expect("list should succeed");

    assert_eq!(live.len(), expected);
    let expected_ids: Vec<BannerId> = ids
        .iter()
        .copied()
        .skip(usize::try_from(offset).expect("offset fits"))
        .take(expected)
        .collect();
    let got_ids: Vec<BannerId> = live.iter().map(|banner| banner.banner_id).collect();
    assert_eq!(got_ids, expected_ids);
    for banner in &live {
        assert!(banner.revision.tag_ids.contains(TagId::new(4)));
        assert_eq!(banner.revision.tag_ids.len(), 2);
    }
}

#[rstest]
fn list_revisions_orders_by_revision_and_pages(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(3, &[4], json!({"v": 1}));
    let second = ctx.add_revision(banner_id, 3, &[4], &json!({"v": 2}));
    let third = ctx.add_revision(banner_id, 3, &[], &json!({"v": 3}));

    let page = PageRequest::new(2, 1).expect("valid page");
    let revisions = ctx
        .runtime
        .block_on(ctx.repository.list_revisions(banner_id, page))
        .expect("list should succeed");
    let ids: Vec<i64> = revisions
        .iter()
        .map(|revision| revision.revision_id.get())
        .collect();
    assert_eq!(ids, vec![second, third]);
    assert!(revisions.last().expect("third").tag_ids.is_empty());
}

#[rstest]
fn delete_banner_removes_every_revision(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    let banner_id = ctx.create(3, &[4], json!({"v": 1}));
    ctx.add_revision(banner_id, 3, &[4], &json!({"v": 2}));

    ctx.runtime
        .block_on(ctx.repository.delete_banner(banner_id))
        .expect("delete should succeed");

    assert_eq!(count_rows(&ctx.database_url, "banners").expect("count"), 0);
    assert_eq!(
        count_rows(&ctx.database_url, "banner_revisions").expect("count"),
        0
    );
    assert_eq!(
        count_rows(&ctx.database_url, "revision_tags").expect("count"),
        0
    );

    let err = ctx
        .runtime
        .block_on(ctx.repository.delete_banner(banner_id))
        .expect_err("second delete finds nothing");
    assert!(err.is_not_found());
}

#[rstest]
fn delete_by_feature_tag_only_touches_matching_banners(repo_context: Option<TestContext>) {
    let Some(ctx) = repo_context else { return };
    ctx.create(3, &[1, 4], json!({"match": 1}));
    ctx.create(3, &[4], json!({"match": 2}));
    let survivor = ctx.create(3, &[5], json!({"match": false}));

    let deleted = ctx
        .runtime
        .block_on(
            ctx.repository
                .delete_by_feature_tag(FeatureId::new(3), TagId::new(4)),
        )
        .expect("delete should succeed");
    assert_eq!(deleted, 2);

    let gone = ctx
        .runtime
        .block_on(
            ctx.repository
                .resolve_live_content(TagId::new(4), FeatureId::new(3)),
        )
        .expect("resolve");
    assert_eq!(gone, None);
    assert_eq!(ctx.revisions_of(survivor).len(), 1);
}
