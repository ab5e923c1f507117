use tests::*;

use saddle::driver::{Capability, Driver};
use saddle::{ConnectionKind, Mapper, SchemeRegistry};
use saddle_driver_mem::Mem;

use std::sync::Arc;

#[tokio::test]
async fn key_value_flavor_rejects_multi_field_plans() {
    let mut mapper = mapper();
    mapper
        .register(vec![organisation()], "mem://cache?flavor=kv")
        .unwrap();
    let manager = mapper.expect("organisation");

    // One field is fine.
    manager.query().filter("name", "Acme Corp").plan().unwrap();

    // Two filtered fields is a typed capability error, not a silent drop.
    let err = manager
        .query()
        .filter("name", "Acme Corp")
        .filter("size", 120)
        .plan()
        .unwrap_err();
    assert!(err.is_unsupported_feature());
    assert!(err.to_string().contains("name"));
    assert!(err.to_string().contains("size"));

    // Excludes count against the same limit.
    let err = manager
        .query()
        .filter("name", "Acme Corp")
        .exclude("size", 120)
        .plan()
        .unwrap_err();
    assert!(err.is_unsupported_feature());
}

#[tokio::test]
async fn key_value_flavor_still_answers_single_field_queries() {
    let mut mapper = mapper();
    seed_organisations(&mut mapper, "mem://cache?flavor=kv").await;

    let count = mapper
        .expect("organisation")
        .query()
        .filter("name__startswith", "Acme")
        .count()
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn key_value_flavor_ignores_eager_load_marks() {
    let mut mapper = mapper();
    mapper
        .register(vec![user(), post()], "mem://cache?flavor=kv")
        .unwrap();

    let plan = mapper
        .expect("post")
        .query()
        .load_related("author")
        .plan()
        .unwrap();
    assert!(plan.load_related.is_empty());
}

#[tokio::test]
async fn schema_ddl_is_a_no_op_without_the_capability() {
    let mut mapper = mapper();
    mapper
        .register(vec![organisation()], "mem://cache?flavor=kv")
        .unwrap();

    mapper.table_create(false).await.unwrap();
    mapper.table_drop().await.unwrap();
}

#[tokio::test]
async fn unsupported_terminal_is_a_query_error() {
    init_logging();

    // A store that answers everything except `delete`.
    let driver = Arc::new(CountingDriver::with_capability(
        Arc::new(Mem::document()),
        Capability {
            query_delete: false,
            ..Capability::DOCUMENT
        },
    ));

    let mut schemes = SchemeRegistry::new();
    schemes.register("counting", ConnectionKind::NoSql, move |_url| {
        let driver: Arc<dyn Driver> = driver.clone();
        Ok(driver)
    });
    let mut mapper = Mapper::with_schemes(schemes);
    mapper.register(vec![organisation()], "counting://main").unwrap();
    let manager = mapper.expect("organisation");

    let err = manager.query().delete().await.unwrap_err();
    assert!(err.is_query());
    assert!(err.to_string().contains("delete"));

    // The other terminals are untouched.
    assert_eq!(manager.query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn bad_flavor_is_an_invalid_connection_url() {
    let url = url::Url::parse("mem://cache?flavor=granite").unwrap();
    let err = Mem::connect(&url).unwrap_err();
    assert!(err.is_invalid_connection_url());
}
