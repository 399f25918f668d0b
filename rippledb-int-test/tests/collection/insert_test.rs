use rippledb::common::Value;
use rippledb::doc;
use rippledb::errors::ErrorKind;
use rippledb_int_test::test_util::{cleanup, create_test_context, create_test_docs, run_test};

#[test]
fn test_insert_and_find_by_id_round_trip() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let docs = create_test_docs();
            let result = collection.insert(docs.clone())?;
            assert_eq!(result.inserted().len(), 3);
            assert!(result.failed().is_empty());

            for document in &docs {
                let id = document.get("_id").cloned().unwrap_or_default();
                assert_eq!(collection.find_by_id(id)?.as_ref(), Some(document));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_generates_missing_id() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let result = collection.insert_one(doc! { name: "no id" })?;
            let stored = &result.inserted()[0];
            let id = stored.get("_id").and_then(|v| v.as_string()).map(String::from);
            assert!(id.as_ref().is_some_and(|id| id.len() >= 16));

            let found = collection.find_by_id(id.unwrap_or_default())?.unwrap_or_default();
            assert_eq!(found.get("name"), Some(&Value::from("no id")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_duplicate_keys_land_in_failed() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            let result = collection.insert(vec![
                doc! { _id: "1", first_name: "dup" },
                doc! { _id: "4", first_name: "fn4" },
                doc! { _id: "4", first_name: "fn4 again" },
            ])?;
            assert_eq!(result.inserted().len(), 1);
            assert_eq!(result.failed().len(), 2);
            assert!(result
                .failed()
                .iter()
                .all(|failed| failed.kind() == &ErrorKind::PrimaryKeyViolation));

            assert_eq!(collection.len(), 4);
            let original = collection.find_by_id("1")?.unwrap_or_default();
            assert_eq!(original.get("first_name"), Some(&Value::from("fn1")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_at_and_index_of() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;
            collection.insert_at(vec![doc! { _id: "0" }], 0)?;

            assert_eq!(collection.index_of(&doc! { _id: "0" })?, Some(0));
            assert_eq!(collection.index_of(&doc! { _id: "3" })?, Some(3));
            assert_eq!(collection.index_of(&doc! { _id: "missing" })?, None);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert_inserts_then_updates() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let first = collection.upsert(doc! { _id: "u", count: 1 })?;
            assert!(first.is_insert());

            let second = collection.upsert(doc! { _id: "u", count: 2 })?;
            assert!(second.is_update());
            assert_eq!(collection.len(), 1);
            let stored = collection.find_by_id("u")?.unwrap_or_default();
            assert_eq!(stored.get("count").and_then(|v| v.as_i64()), Some(2));
            Ok(())
        },
        cleanup,
    )
}
