use rippledb::collection::{CollectionSnapshot, Transform};
use rippledb::doc;
use rippledb::errors::ErrorKind;
use rippledb_int_test::test_util::{cleanup, create_test_context, create_test_docs, ids, run_test};

#[test]
fn test_snapshot_survives_json_and_loads() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let source = db.collection("source")?;
            source.insert(create_test_docs())?;

            let snapshot = source.snapshot()?;
            assert_eq!(snapshot.last_change(), source.last_change());
            let json = serde_json::to_string(&snapshot).map_err(|e| e.to_string())?;
            let restored: CollectionSnapshot = serde_json::from_str(&json).map_err(|e| e.to_string())?;

            let target = db.collection("target")?;
            target.load(restored)?;
            assert_eq!(target.find(&doc! {})?, source.find(&doc! {})?);
            assert_eq!(target.last_change(), source.last_change());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_load_rejects_other_primary_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let snapshot = CollectionSnapshot::new("other", "sku", vec![doc! { sku: "1" }], 0);
            let error = collection.load(snapshot).err().map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::InvalidOperation));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_transform_hooks_wrap_storage() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.set_transform(
                Transform::new()
                    .data_in(|mut document| {
                        document.put("stored", true);
                        document
                    })
                    .data_out(|document| document.without(&["stored"])),
            );
            collection.insert(create_test_docs())?;

            assert_eq!(collection.count(&doc! { stored: true })?, 3);
            let found = collection.find(&doc! { _id: "1" })?;
            assert_eq!(ids(&found), vec!["1"]);
            assert!(found[0].get("stored").is_none());

            collection.set_transform(Transform::default());
            let raw = collection.find_by_id("1")?.unwrap_or_default();
            assert!(raw.get("stored").is_some());
            Ok(())
        },
        cleanup,
    )
}
