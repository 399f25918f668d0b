use rippledb::collection::FindOptions;
use rippledb::doc;
use rippledb::errors::ErrorKind;
use rippledb::index::{non_unique_index, unique_index};
use rippledb_int_test::test_util::{cleanup, create_random_docs, create_test_context, run_test, sorted_keys};

#[test]
fn test_range_query_uses_the_only_covering_index() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_random_docs(200))?;
            let descriptor = collection.ensure_index(&doc! { age: 1 }, &non_unique_index())?;

            let query = doc! { age: { "$gt": 11, "$lt": 20 } };
            let plan = collection.explain(&query, &FindOptions::new())?;
            assert_eq!(plan.chosen_index(), Some(descriptor.name()));
            assert!(!plan.uses_primary_key());

            let indexed = collection.find(&query)?;
            let scanned = collection.find_with_options(&query, &FindOptions::new().skip_index(true))?;
            assert_eq!(sorted_keys(&indexed), sorted_keys(&scanned));

            let unindexed_plan = collection.explain(&query, &FindOptions::new().skip_index(true))?;
            assert!(unindexed_plan.chosen_index().is_none());
            assert!(unindexed_plan.is_table_scan());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_primary_key_lookup_plan() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_random_docs(20))?;
            let plan = collection.explain(&doc! { _id: 7 }, &FindOptions::new())?;
            assert!(plan.uses_primary_key());
            assert_eq!(collection.find(&doc! { _id: 7 })?.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_rejects_duplicates() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.ensure_index(&doc! { email: 1 }, &unique_index())?;
            collection.insert_one(doc! { _id: "1", email: "a@x.io" })?;

            let result = collection.insert_one(doc! { _id: "2", email: "a@x.io" })?;
            assert!(result.inserted().is_empty());
            assert_eq!(result.failed()[0].kind(), &ErrorKind::IndexViolation);
            assert_eq!(collection.len(), 1);

            collection.insert_one(doc! { _id: "3", email: "b@x.io" })?;
            let error = collection
                .update(&doc! { _id: "3" }, &doc! { email: "a@x.io" })
                .err()
                .map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::IndexViolation));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_over_duplicate_data_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(vec![doc! { code: 1 }, doc! { code: 1 }])?;
            let error = collection.ensure_index(&doc! { code: 1 }, &unique_index()).err();
            assert_eq!(error.map(|e| e.kind().clone()), Some(ErrorKind::IndexViolation));
            assert!(collection.indexes()?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_ensure_index_is_idempotent_and_droppable() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let first = collection.ensure_index(&doc! { age: 1 }, &non_unique_index())?;
            let second = collection.ensure_index(&doc! { age: 1 }, &non_unique_index())?;
            assert_eq!(first, second);
            assert_eq!(collection.indexes()?.len(), 1);

            let conflict = collection
                .ensure_index(&doc! { city: 1 }, &non_unique_index().with_name(first.name()))
                .err()
                .map(|e| e.kind().clone());
            assert_eq!(conflict, Some(ErrorKind::IndexAlreadyExists));

            assert_eq!(collection.drop_index(first.name())?, first);
            assert!(collection.index(first.name())?.is_none());
            let missing = collection.drop_index(first.name()).err().map(|e| e.kind().clone());
            assert_eq!(missing, Some(ErrorKind::IndexNotFound));
            Ok(())
        },
        cleanup,
    )
}
