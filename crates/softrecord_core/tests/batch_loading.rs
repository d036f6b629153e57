use rusqlite::Connection;
use softrecord_core::db::open_db_in_memory;
use softrecord_core::{
    Attributes, Condition, EntityCache, EntityId, EntityLoader, EntitySchema, Identifiable,
    PersistenceQuery, Record, RepoError, RepoResult, SoftDeleteController, SoftDeletable,
    SqliteQueryLayer, SqliteTransactionManager,
};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

/// Delegating query layer that records every bulk fetch.
struct CountingQuery<'conn> {
    inner: SqliteQueryLayer<'conn>,
    bulk_requests: RefCell<Vec<Vec<EntityId>>>,
}

impl<'conn> CountingQuery<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteQueryLayer::new(conn),
            bulk_requests: RefCell::new(Vec::new()),
        }
    }

    fn bulk_requests(&self) -> Vec<Vec<EntityId>> {
        self.bulk_requests.borrow().clone()
    }
}

impl PersistenceQuery for CountingQuery<'_> {
    fn find_all_by_ids(
        &self,
        schema: &Arc<EntitySchema>,
        ids: &[EntityId],
    ) -> RepoResult<Vec<Record>> {
        self.bulk_requests.borrow_mut().push(ids.to_vec());
        self.inner.find_all_by_ids(schema, ids)
    }

    fn update_by_condition(
        &self,
        schema: &EntitySchema,
        condition: &Condition,
        values: &Attributes,
    ) -> RepoResult<usize> {
        self.inner.update_by_condition(schema, condition, values)
    }

    fn hard_delete(&self, record: &Record) -> RepoResult<usize> {
        self.inner.hard_delete(record)
    }

    fn insert(&self, record: &mut Record) -> RepoResult<EntityId> {
        self.inner.insert(record)
    }
}

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE tags (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );",
    )
    .unwrap();
    conn
}

fn post_schema() -> Arc<EntitySchema> {
    Arc::new(
        EntitySchema::builder("post", "posts")
            .attributes(["id", "title", "is_deleted"])
            .build()
            .unwrap(),
    )
}

fn tag_schema() -> Arc<EntitySchema> {
    Arc::new(
        EntitySchema::builder("tag", "tags")
            .attributes(["id", "name"])
            .build()
            .unwrap(),
    )
}

fn seed(conn: &Connection, table: &str, column: &str, values: &[&str]) {
    for value in values {
        conn.execute(&format!("INSERT INTO {table} ({column}) VALUES (?1);"), [value])
            .unwrap();
    }
}

fn title_of(record: &Record) -> String {
    match record.get("title") {
        Some(rusqlite::types::Value::Text(title)) => title.clone(),
        other => panic!("unexpected title value: {other:?}"),
    }
}

#[test]
fn get_by_ids_over_disjoint_sets_equals_their_union() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one", "two", "three"]);
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let a = loader.get_by_ids([1, 2]).unwrap();
    let b = loader.get_by_ids([3]).unwrap();
    let union = loader.get_by_ids([1, 2, 3]).unwrap();

    let keys: BTreeSet<EntityId> = union.keys().copied().collect();
    assert_eq!(keys, BTreeSet::from([1, 2, 3]));
    for (id, record) in a.iter().chain(b.iter()) {
        assert!(Rc::ptr_eq(record, &union[id]));
    }
    assert_eq!(title_of(&union[&2].borrow()), "two");
}

#[test]
fn repeated_load_returns_cached_instances_without_refetching() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one", "two", "three"]);
    let query = CountingQuery::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let first = loader.get_by_ids([1, 2]).unwrap();
    let second = loader.get_by_ids([2, 1]).unwrap();

    assert_eq!(query.bulk_requests(), vec![vec![1, 2]]);
    assert!(Rc::ptr_eq(&first[&1], &second[&1]));
    assert!(Rc::ptr_eq(&first[&2], &second[&2]));

    let third = loader.get_by_ids([2, 3]).unwrap();
    assert_eq!(query.bulk_requests(), vec![vec![1, 2], vec![3]]);
    assert!(Rc::ptr_eq(&first[&2], &third[&2]));
    assert_eq!(cache.len(), 3);
}

#[test]
fn fully_cached_load_issues_no_query() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one"]);
    let query = CountingQuery::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    loader.get_by_id(1).unwrap();
    loader.get_by_id(1).unwrap();
    loader.load_by_ids(Vec::new(), true).unwrap();

    assert_eq!(query.bulk_requests().len(), 1);
}

#[test]
fn get_by_id_for_unknown_id_reports_exact_missing_ids() {
    let conn = setup();
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let err = loader.get_by_id(42).unwrap_err();
    match err {
        RepoError::NotFound {
            entity_type,
            missing_ids,
        } => {
            assert_eq!(entity_type, "post");
            assert_eq!(missing_ids, vec![42]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn strict_load_lists_every_missing_id_in_order() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one", "two"]);
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let err = loader.get_by_ids([43, 1, 42, 2]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { ref missing_ids, .. } if *missing_ids == vec![42, 43]
    ));
    // Resolved ids are still cached even though the strict load failed.
    assert!(cache.contains("post", 1));
    assert!(cache.contains("post", 2));
}

#[test]
fn lenient_load_omits_missing_ids() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one"]);
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let loaded = loader.load_by_ids([1, 42, 43], false).unwrap();
    assert_eq!(loaded.keys().copied().collect::<Vec<_>>(), vec![1]);
    assert!(!loaded.contains_key(&42));
}

#[test]
fn equal_ids_of_different_types_are_cached_separately() {
    let conn = setup();
    seed(&conn, "posts", "title", &["post one"]);
    seed(&conn, "tags", "name", &["tag one"]);
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();

    let post = EntityLoader::new(&query, &cache, post_schema())
        .get_by_id(1)
        .unwrap();
    let tag = EntityLoader::new(&query, &cache, tag_schema())
        .get_by_id(1)
        .unwrap();

    assert_eq!(cache.len(), 2);
    assert!(!Rc::ptr_eq(&post, &tag));
    assert_eq!(post.borrow().entity_type(), "post");
    assert_eq!(tag.borrow().entity_type(), "tag");
}

#[test]
fn separate_caches_do_not_share_instances() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one"]);
    let query = SqliteQueryLayer::new(&conn);
    let first_scope = EntityCache::new();
    let second_scope = EntityCache::new();

    let first = EntityLoader::new(&query, &first_scope, post_schema())
        .get_by_id(1)
        .unwrap();
    conn.execute("UPDATE posts SET title = 'renamed' WHERE id = 1;", [])
        .unwrap();
    let second = EntityLoader::new(&query, &second_scope, post_schema())
        .get_by_id(1)
        .unwrap();

    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(title_of(&first.borrow()), "one");
    assert_eq!(title_of(&second.borrow()), "renamed");
}

#[test]
fn loading_requires_an_id_attribute() {
    let conn = setup();
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let schema = Arc::new(
        EntitySchema::builder("tag_name", "tags")
            .attributes(["name"])
            .without_id()
            .build()
            .unwrap(),
    );
    let loader = EntityLoader::new(&query, &cache, schema);

    let err = loader.get_by_ids([1]).unwrap_err();
    assert!(matches!(err, RepoError::UnsupportedOperation(_)));
}

#[test]
fn soft_deleted_rows_remain_loadable_in_a_new_scope() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one"]);
    let query = SqliteQueryLayer::new(&conn);
    let transactions = SqliteTransactionManager::new(&conn);
    let controller = SoftDeleteController::new(&query, &transactions);

    let first_scope = EntityCache::new();
    let post = EntityLoader::new(&query, &first_scope, post_schema())
        .get_by_id(1)
        .unwrap();
    controller.delete(&mut post.borrow_mut(), false).unwrap();

    let second_scope = EntityCache::new();
    let reloaded = EntityLoader::new(&query, &second_scope, post_schema())
        .get_by_id(1)
        .unwrap();
    assert!(reloaded.borrow().is_soft_deleted());
}

#[test]
fn lenient_load_beyond_bind_parameter_limit_succeeds() {
    let conn = setup();
    for id in [1_i64, 20_000, 39_999] {
        conn.execute(
            "INSERT INTO posts (id, title) VALUES (?1, 'spread');",
            [id],
        )
        .unwrap();
    }
    let query = CountingQuery::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let loaded = loader.load_by_ids(1..=40_000, false).unwrap();

    assert_eq!(
        loaded.keys().copied().collect::<Vec<_>>(),
        vec![1, 20_000, 39_999]
    );
    assert_eq!(query.bulk_requests().len(), 1);
    assert_eq!(query.bulk_requests()[0].len(), 40_000);
}

#[test]
fn strict_load_beyond_bind_parameter_limit_reports_all_missing_ids() {
    let conn = setup();
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let err = loader.get_by_ids(1..=33_000).unwrap_err();
    match err {
        RepoError::NotFound { missing_ids, .. } => {
            assert_eq!(missing_ids.len(), 33_000);
            assert_eq!(missing_ids.first(), Some(&1));
            assert_eq!(missing_ids.last(), Some(&33_000));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn cached_record_keeps_the_id_it_was_loaded_under() {
    let conn = setup();
    seed(&conn, "posts", "title", &["one"]);
    let query = SqliteQueryLayer::new(&conn);
    let cache = EntityCache::new();
    let loader = EntityLoader::new(&query, &cache, post_schema());

    let post = loader.get_by_id(1).unwrap();
    let err = post.borrow_mut().set("id", 99_i64).unwrap_err();
    assert!(matches!(err, RepoError::UnsupportedOperation(_)));

    let again = loader.get_by_id(1).unwrap();
    assert!(Rc::ptr_eq(&post, &again));
    assert_eq!(again.borrow().id().unwrap(), 1);
}
