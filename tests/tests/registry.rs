use tests::*;

use saddle::{Application, StoreOverrides};

#[tokio::test]
async fn register_builds_one_manager_per_model() {
    let mut mapper = mapper();
    let registered = mapper
        .register(vec![organisation(), user()], "mem://main")
        .unwrap();
    assert_eq!(registered.len(), 2);

    assert!(mapper.by_name("organisation").is_some());
    assert!(mapper.by_name("user").is_some());
    assert!(mapper.by_name("post").is_none());
}

#[tokio::test]
async fn manager_identity_is_stable() {
    let mut mapper = mapper();
    let ids = mapper.register(vec![organisation()], "mem://main").unwrap();

    let a = mapper.manager(ids[0]).unwrap() as *const _;
    let b = mapper.manager(ids[0]).unwrap() as *const _;
    assert_eq!(a, b);

    let by_name = mapper.by_name("organisation").unwrap() as *const _;
    assert_eq!(a, by_name);
}

#[tokio::test]
async fn register_is_idempotent() {
    let mut mapper = mapper();
    let first = mapper.register(vec![organisation()], "mem://main").unwrap();
    assert_eq!(first.len(), 1);

    // The second registration silently skips the model.
    let second = mapper.register(vec![organisation()], "mem://main").unwrap();
    assert!(second.is_empty());
    assert!(mapper.by_name("organisation").is_some());
}

#[tokio::test]
async fn unregister_clears_both_indexes() {
    let mut mapper = mapper();
    let ids = mapper
        .register(vec![organisation(), user()], "mem://main")
        .unwrap();

    let removed = mapper.unregister(Some(ids[0])).unwrap();
    assert_eq!(removed, vec![ids[0]]);
    assert!(mapper.manager(ids[0]).is_none());
    assert!(mapper.by_name("organisation").is_none());

    // The other model is untouched.
    assert!(mapper.by_name("user").is_some());

    // Removing a manager twice removes nothing.
    assert!(mapper.unregister(Some(ids[0])).is_none());
}

#[tokio::test]
async fn unregister_all() {
    let mut mapper = mapper();
    mapper
        .register(vec![organisation(), user()], "mem://main")
        .unwrap();

    let removed = mapper.unregister(None).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(mapper.by_name("organisation").is_none());
    assert!(mapper.by_name("user").is_none());

    // Nothing left to remove.
    assert!(mapper.unregister(None).is_none());
}

#[tokio::test]
async fn reregister_after_unregister() {
    let mut mapper = mapper();
    let ids = mapper.register(vec![organisation()], "mem://main").unwrap();
    mapper.unregister(Some(ids[0]));

    let again = mapper.register(vec![organisation()], "mem://main").unwrap();
    assert_eq!(again, ids, "ids are stable across re-registration");
    assert!(mapper.by_name("organisation").is_some());
}

#[tokio::test]
async fn unrecognized_scheme_skips_store_creation() {
    let mut mapper = mapper();

    // Speculative descriptor for a driver family that is not wired up:
    // registration is skipped, not failed.
    let registered = mapper
        .register(vec![user()], "redis://localhost:6379/0")
        .unwrap();
    assert!(registered.is_empty());
    assert!(mapper.by_name("user").is_none());

    // The same models register fine against a recognized scheme.
    let registered = mapper.register(vec![user()], "mem://main").unwrap();
    assert_eq!(registered.len(), 1);
}

#[tokio::test]
async fn malformed_descriptor_is_an_error() {
    let mut mapper = mapper();
    let err = mapper
        .register(vec![user()], "not a url at all")
        .unwrap_err();
    assert!(err.is_invalid_connection_url());
}

#[tokio::test]
async fn same_descriptor_shares_one_store() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();
    mapper.register(vec![user()], "mem://main").unwrap();

    let a = mapper.expect("organisation").store().id();
    let b = mapper.expect("user").store().id();
    assert_eq!(a, b);

    mapper.register(vec![post()], "mem://other").unwrap();
    assert_ne!(mapper.expect("post").store().id(), a);
}

#[tokio::test]
async fn register_applications_applies_overrides() {
    let mut mapper = mapper();

    let applications = vec![
        Application {
            name: "crm".to_string(),
            store: "mem://crm".to_string(),
            models: vec![organisation()],
        },
        Application {
            name: "blog".to_string(),
            store: "mem://blog".to_string(),
            models: vec![user(), post()],
        },
    ];
    let overrides = StoreOverrides::new().model("Post", "mem://archive");

    let registered = mapper
        .register_applications(applications, Some(&overrides))
        .unwrap();
    assert_eq!(registered.len(), 3);

    assert_eq!(mapper.expect("organisation").store().url(), "mem://crm");
    assert_eq!(mapper.expect("user").store().url(), "mem://blog");
    assert_eq!(mapper.expect("post").store().url(), "mem://archive");

    // Application labels land on the models.
    assert_eq!(
        mapper.expect("organisation").model().app.as_deref(),
        Some("crm")
    );
}
