use tests::*;

use saddle::schema::{FieldDecl, ModelDecl};
use saddle::stmt::Value;

async fn seed_blog(mapper: &mut saddle::Mapper) -> (saddle::stmt::Instance, saddle::stmt::Instance) {
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let ann = mapper.expect("user").new_instance();
    ann.set("name", "Ann");
    let bob = mapper.expect("user").new_instance();
    bob.set("name", "Bob");

    let mut tx = mapper.begin();
    tx.add(ann.clone(), None).unwrap();
    tx.add(bob.clone(), None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    let posts = mapper.expect("post");
    let mut tx = mapper.begin();
    for (title, author) in [("intro", &ann), ("outro", &ann), ("reply", &bob)] {
        let post = posts.new_instance();
        post.set("title", title);
        posts.assign(&post, "author", author).unwrap();
        tx.add(post, None).unwrap();
    }
    mapper.commit(&mut tx).await.unwrap();

    (ann, bob)
}

#[tokio::test]
async fn assign_derives_the_stored_id() {
    let mut mapper = mapper();
    let (ann, _) = seed_blog(&mut mapper).await;

    let count = mapper
        .expect("post")
        .query()
        .filter("author", ann.get("id").unwrap())
        .count()
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn assign_rejects_unsaved_targets() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let unsaved = mapper.expect("user").new_instance();
    let post = mapper.expect("post").new_instance();

    let err = mapper
        .expect("post")
        .assign(&post, "author", &unsaved)
        .unwrap_err();
    assert!(err.is_invalid_operation());
}

#[tokio::test]
async fn assign_rejects_wrong_model() {
    let mut mapper = mapper();
    mapper
        .register(vec![user(), post(), organisation()], "mem://main")
        .unwrap();

    let org = mapper.expect("organisation").new_instance();
    org.set("name", "Acme Corp");
    let mut tx = mapper.begin();
    tx.add(org.clone(), None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    let post = mapper.expect("post").new_instance();
    let err = mapper
        .expect("post")
        .assign(&post, "author", &org)
        .unwrap_err();
    assert!(err.is_query());
}

#[tokio::test]
async fn nested_filter_walks_the_relation() {
    let mut mapper = mapper();
    seed_blog(&mut mapper).await;

    let posts = mapper.expect("post").query();
    assert_eq!(
        posts.filter("author__name", "Ann").count().await.unwrap(),
        2
    );
    assert_eq!(
        posts
            .filter("author__name__startswith", "B")
            .count()
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn reverse_accessor_queries_the_source_model() {
    let mut mapper = mapper();
    let (ann, bob) = seed_blog(&mut mapper).await;

    assert_eq!(mapper.related(&ann, "posts").unwrap().count().await.unwrap(), 2);
    assert_eq!(mapper.related(&bob, "posts").unwrap().count().await.unwrap(), 1);

    let err = mapper.related(&ann, "nope").unwrap_err();
    assert!(err.is_query());
}

#[tokio::test]
async fn eager_loading_attaches_related_instances() {
    let mut mapper = mapper();
    seed_blog(&mut mapper).await;

    let posts = mapper
        .expect("post")
        .query()
        .filter("title", "intro")
        .load_related("author")
        .all()
        .await
        .unwrap();

    let author = posts[0].related("author").expect("eagerly loaded");
    assert_eq!(author.get("name").unwrap().as_str(), Some("Ann"));

    // Without the mark, nothing is attached.
    let posts = mapper
        .expect("post")
        .query()
        .filter("title", "intro")
        .all()
        .await
        .unwrap();
    assert!(posts[0].related("author").is_none());
}

#[tokio::test]
async fn many_to_many_registers_a_through_manager() {
    let mut mapper = mapper();
    mapper
        .register(vec![user_with_tags(), tag()], "mem://main")
        .unwrap();

    // The through model rides on the owner's store.
    let through = mapper.by_name("user_tags").expect("through manager");
    assert_eq!(through.store().url(), "mem://main");
    assert!(through.model().synthesized);

    // The declaring field is not a direct field on the owner.
    assert!(mapper.expect("user").model().field_by_name("tags").is_none());

    // Link rows flow through the through manager like any other model.
    let ann = mapper.expect("user").new_instance();
    ann.set("name", "Ann");
    let rust = mapper.expect("tag").new_instance();
    rust.set("label", "rust");

    let mut tx = mapper.begin();
    tx.add(ann.clone(), None).unwrap();
    tx.add(rust.clone(), None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    let through = mapper.by_name("user_tags").unwrap();
    let link = through.new_instance();
    through.assign(&link, "user", &ann).unwrap();
    through.assign(&link, "tag", &rust).unwrap();
    let mut tx = mapper.begin();
    tx.add(link, None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    // Reverse accessors reach the link rows from both sides.
    assert_eq!(
        mapper
            .related(&ann, "user_tags_sources")
            .unwrap()
            .count()
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        mapper
            .related(&rust, "user_tags_targets")
            .unwrap()
            .count()
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn composite_key_round_trip() {
    let mut mapper = mapper();
    let reading = ModelDecl::new("Reading")
        .field(FieldDecl::text("sensor"))
        .field(FieldDecl::i64("hour"))
        .field(FieldDecl::composite_id("key", ["sensor", "hour"]))
        .field(FieldDecl::f64("value"));
    mapper.register(vec![reading], "mem://main").unwrap();
    let manager = mapper.expect("reading");

    let sample = manager.new_instance();
    sample.set("sensor", "s1");
    sample.set("hour", 4i64);
    sample.set("value", 1.5f64);

    let mut tx = mapper.begin();
    tx.add(sample.clone(), None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    let key = Value::list_from_vec(vec![Value::from("s1"), Value::from(4i64)]);
    let found = manager.get(key).await.unwrap();
    assert_eq!(found.get("value").unwrap().as_f64(), Some(1.5));

    // A fresh composite instance with an unset component cannot commit.
    let partial = manager.new_instance();
    partial.set("sensor", "s2");
    let mut tx = mapper.begin();
    tx.add(partial, None).unwrap();
    let err = mapper.commit(&mut tx).await.unwrap_err();
    assert!(err.is_invalid_operation());
}

#[tokio::test]
async fn duplicate_related_name_fails_registration() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let clash = ModelDecl::new("Comment")
        .field(FieldDecl::text("body"))
        .field(FieldDecl::foreign_key("author", "User").related_name("posts"));
    let err = mapper.register(vec![clash], "mem://main").unwrap_err();
    assert!(err.is_field());
}

#[tokio::test]
async fn unresolved_relation_is_loud() {
    let mut mapper = mapper();
    // Post targets User, which never registers.
    mapper.register(vec![post()], "mem://main").unwrap();

    assert!(mapper.verify().unwrap_err().is_field());
    assert!(mapper.table_create(false).await.unwrap_err().is_field());

    let err = mapper
        .expect("post")
        .query()
        .filter("author__name", "Ann")
        .plan()
        .unwrap_err();
    assert!(err.is_field());

    // Registering the target later resolves everything.
    mapper.register(vec![user()], "mem://main").unwrap();
    mapper.verify().unwrap();
    mapper
        .expect("post")
        .query()
        .filter("author__name", "Ann")
        .plan()
        .unwrap();
}
