use rippledb::collection::UpdateOptions;
use rippledb::common::Value;
use rippledb::doc;
use rippledb::errors::ErrorKind;
use rippledb_int_test::test_util::{cleanup, create_test_context, create_test_docs, ids, run_test};

#[test]
fn test_plain_update_is_idempotent() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            let first = collection.update(&doc! { _id: "1" }, &doc! { first_name: "changed" })?;
            assert_eq!(first.len(), 1);
            let second = collection.update(&doc! { _id: "1" }, &doc! { first_name: "changed" })?;
            assert!(second.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_operator_updates() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            collection.update(
                &doc! { _id: "1" },
                &doc! {
                    "$inc": { age: 2 },
                    "$push": { tags: "four" },
                    "$unset": { body: 1 },
                },
            )?;
            let updated = collection.find_by_id("1")?.unwrap_or_default();
            assert_eq!(updated.get("age").and_then(|v| v.as_i64()), Some(17));
            assert_eq!(updated.get("tags"), Some(&rippledb::array!["one", "two", "three", "four"]));
            assert!(updated.get("body").is_none());

            collection.update(&doc! { _id: "1" }, &doc! { "$pull": { tags: "two" } })?;
            collection.update(&doc! { _id: "1" }, &doc! { "$pop": { tags: 1 } })?;
            let updated = collection.find_by_id("1")?.unwrap_or_default();
            assert_eq!(updated.get("tags"), Some(&rippledb::array!["one", "three"]));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_add_to_set_and_nested_set() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            collection.update(&doc! { _id: "2" }, &doc! { "$addToSet": { tags: "two" } })?;
            collection.update(&doc! { _id: "2" }, &doc! { "$addToSet": { tags: "nine" } })?;
            collection.update(&doc! { _id: "2" }, &doc! { address: { city: "Leeds" } })?;

            let updated = collection.find_by_id("2")?.unwrap_or_default();
            assert_eq!(updated.get("tags"), Some(&rippledb::array!["two", "nine"]));
            assert_eq!(updated.get_path("address.city"), Some(&Value::from("Leeds")));
            assert_eq!(updated.get_path("address.zip").and_then(|v| v.as_i64()), Some(10001));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_positional_update() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert_one(doc! {
                _id: "cart",
                items: [{ sku: "a", qty: 1 }, { sku: "b", qty: 1 }],
            })?;

            collection.update_with_options(
                &doc! { items: { sku: "b" } },
                &doc! { "$inc": { "items.$": { qty: 4 } } },
                &UpdateOptions::default(),
            )?;

            let cart = collection.find_by_id("cart")?.unwrap_or_default();
            assert_eq!(cart.get_path("items.0.qty").and_then(|v| v.as_i64()), Some(1));
            assert_eq!(cart.get_path("items.1.qty").and_then(|v| v.as_i64()), Some(5));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_malformed_update_is_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;
            let error = collection
                .update(&doc! { _id: "1" }, &doc! { "$bogus": { age: 1 } })
                .err()
                .map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::MalformedUpdate));

            let error = collection.find(&doc! { age: { "$in": 5 } }).err().map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::MalformedQuery));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_and_truncate() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            let removed = collection.remove(&doc! { last_name: "ln2" })?;
            assert_eq!(ids(&removed), vec!["2", "3"]);
            assert!(collection.remove_by_id("2")?.is_none());
            assert_eq!(collection.len(), 1);

            collection.truncate()?;
            assert!(collection.is_empty());
            collection.insert_one(doc! { _id: "1" })?;
            assert_eq!(collection.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_dropped_collection_rejects_calls() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.drop()?;
            let error = collection.insert_one(doc! { a: 1 }).err().map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::CollectionDropped));
            Ok(())
        },
        cleanup,
    )
}
