use tests::*;

use saddle::FilterValue;
use saddle::stmt::{LookupOp, Operand, Value};

use std::sync::Arc;

#[tokio::test]
async fn repeated_filters_accumulate() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();
    let manager = mapper.expect("organisation");

    let query = manager.query().filter("size", 1).filter("size", 2);
    let plan = query.plan().unwrap();

    let lookups = &plan.filters["size"];
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[0].operand, Operand::Value(Value::I64(1)));
    assert_eq!(lookups[1].operand, Operand::Value(Value::I64(2)));
}

#[tokio::test]
async fn chained_queries_are_isolated() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();
    let base = mapper.expect("organisation").query();

    let q2 = base.filter("name", "Acme Corp");
    let q3 = base.filter("size", 2);

    let p2 = q2.plan().unwrap();
    let p3 = q3.plan().unwrap();

    assert!(p2.filters.contains_key("name"));
    assert!(!p2.filters.contains_key("size"));
    assert!(p3.filters.contains_key("size"));
    assert!(!p3.filters.contains_key("name"));

    // The ancestor never saw either filter.
    assert!(base.plan().unwrap().filters.is_empty());
}

#[tokio::test]
async fn compiled_is_memoized_per_query_value() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();
    let query = mapper.expect("organisation").query().filter("size", 1);

    let first = query.compiled().await.unwrap().clone();
    let second = query.compiled().await.unwrap().clone();
    assert!(Arc::ptr_eq(&first, &second));

    // A further chained call compiles its own plan.
    let chained = query.filter("size", 2);
    let third = chained.compiled().await.unwrap().clone();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[tokio::test]
async fn operator_segments_compile_to_lookup_types() {
    let mut mapper = mapper();
    mapper
        .register(vec![organisation(), user()], "mem://main")
        .unwrap();

    let plan = mapper
        .expect("user")
        .query()
        .filter("age__gt", 21)
        .plan()
        .unwrap();
    let lookups = &plan.filters["age"];
    assert_eq!(lookups[0].op, LookupOp::Gt);
    assert_eq!(lookups[0].operand, Operand::Value(Value::I64(21)));

    // Case-insensitive operators fold the operand at compile time.
    let plan = mapper
        .expect("organisation")
        .query()
        .filter("name__icontains", "Bob")
        .plan()
        .unwrap();
    let lookups = &plan.filters["name"];
    assert_eq!(lookups[0].op, LookupOp::IContains);
    assert_eq!(lookups[0].operand, Operand::Value(Value::from("bob")));
}

#[tokio::test]
async fn in_lookups_flatten_to_membership_values() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();

    let plan = mapper
        .expect("organisation")
        .query()
        .filter("size__in", FilterValue::list([7i64, 120]))
        .plan()
        .unwrap();

    let lookups = &plan.filters["size"];
    assert_eq!(lookups.len(), 2);
    assert!(lookups.iter().all(|lookup| lookup.op == LookupOp::Eq));
}

#[tokio::test]
async fn unknown_field_is_a_query_error() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();

    let err = mapper
        .expect("organisation")
        .query()
        .filter("nope", 1)
        .plan()
        .unwrap_err();
    assert!(err.is_query());
    assert!(err.to_string().contains("nope"));

    // The unknown name surfaces even when dressed up as an operator lookup.
    let err = mapper
        .expect("organisation")
        .query()
        .filter("nope__gt", 1)
        .plan()
        .unwrap_err();
    assert!(err.is_query());
}

#[tokio::test]
async fn nested_relation_path_compiles_to_a_subquery() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let plan = mapper
        .expect("post")
        .query()
        .filter("author__name__startswith", "A")
        .plan()
        .unwrap();

    // The outer lookup keys on the stored id column and carries the
    // compiled subquery against the target model.
    let lookups = &plan.filters["author_id"];
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].op, LookupOp::Eq);
    let Operand::Query(sub) = &lookups[0].operand else {
        panic!("expected subquery operand, got {:?}", lookups[0].operand);
    };
    let sub_lookups = &sub.filters["name"];
    assert_eq!(sub_lookups[0].op, LookupOp::StartsWith);
}

#[tokio::test]
async fn filtering_through_a_scalar_is_a_query_error() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let err = mapper
        .expect("post")
        .query()
        .filter("title__name", "x")
        .plan()
        .unwrap_err();
    assert!(err.is_query());
}

#[tokio::test]
async fn subquery_filter_value() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let authors = mapper.expect("user").query().filter("name", "Ann");
    let plan = mapper
        .expect("post")
        .query()
        .filter("author", &authors)
        .plan()
        .unwrap();

    let lookups = &plan.filters["author_id"];
    assert!(matches!(lookups[0].operand, Operand::Query(_)));
}

#[tokio::test]
async fn raw_where_requires_a_query_language() {
    let mut mapper = mapper();
    mapper.register(vec![organisation()], "mem://main").unwrap();

    let err = mapper
        .expect("organisation")
        .query()
        .where_raw("size > 10")
        .plan()
        .unwrap_err();
    assert!(err.is_unsupported_feature());
}

#[tokio::test]
async fn load_related_validates_the_path() {
    let mut mapper = mapper();
    mapper.register(vec![user(), post()], "mem://main").unwrap();

    let plan = mapper
        .expect("post")
        .query()
        .load_related("author")
        .plan()
        .unwrap();
    assert_eq!(plan.load_related, vec!["author".to_string()]);

    let err = mapper
        .expect("post")
        .query()
        .load_related("title")
        .plan()
        .unwrap_err();
    assert!(err.is_query());
}
