mod counting_driver;
pub use counting_driver::CountingDriver;

use saddle::{ConnectionKind, Mapper, SchemeRegistry};
use saddle_core::driver::Driver;
use saddle_core::schema::{FieldDecl, ModelDecl};
use saddle_core::stmt::Instance;
use saddle_driver_mem::Mem;

use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A mapper with the `mem` scheme wired up, the way applications wire their
/// driver families at bootstrap.
pub fn mapper() -> Mapper {
    init_logging();

    let mut schemes = SchemeRegistry::new();
    schemes.register(Mem::SCHEME, ConnectionKind::NoSql, |url| {
        let driver: Arc<dyn Driver> = Arc::new(Mem::connect(url)?);
        Ok(driver)
    });
    Mapper::with_schemes(schemes)
}

// Shared fixture declarations.

pub fn organisation() -> ModelDecl {
    ModelDecl::new("Organisation")
        .field(FieldDecl::text("name").unique())
        .field(FieldDecl::i64("size").nullable())
}

pub fn user() -> ModelDecl {
    ModelDecl::new("User")
        .field(FieldDecl::text("name"))
        .field(FieldDecl::i64("age").nullable())
}

pub fn post() -> ModelDecl {
    ModelDecl::new("Post")
        .field(FieldDecl::text("title"))
        .field(FieldDecl::foreign_key("author", "User").related_name("posts"))
}

pub fn tag() -> ModelDecl {
    ModelDecl::new("Tag").field(FieldDecl::text("label").unique())
}

pub fn user_with_tags() -> ModelDecl {
    ModelDecl::new("User")
        .field(FieldDecl::text("name"))
        .field(FieldDecl::many_to_many("tags", "Tag"))
}

/// Registers `Organisation` and seeds two rows.
pub async fn seed_organisations(mapper: &mut Mapper, store: &str) -> Vec<Instance> {
    mapper.register(vec![organisation()], store).unwrap();
    let manager = mapper.expect("organisation");

    let acme = manager.new_instance();
    acme.set("name", "Acme Corp");
    acme.set("size", 120i64);

    let other = manager.new_instance();
    other.set("name", "Other");
    other.set("size", 7i64);

    let mut tx = mapper.begin();
    tx.add(acme.clone(), None).unwrap();
    tx.add(other.clone(), None).unwrap();
    mapper.commit(&mut tx).await.unwrap();

    vec![acme, other]
}
