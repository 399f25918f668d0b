use rippledb::collection::{CollectionOptions, FindOptions};
use rippledb::doc;
use rippledb::errors::ErrorKind;
use rippledb_int_test::test_util::{cleanup, create_test_context, ids, run_test};

#[test]
fn test_group_aggregates_members() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let cats = db.collection("cats")?;
            let dogs = db.collection("dogs")?;
            cats.insert(vec![doc! { _id: "c1", legs: 4 }, doc! { _id: "c2", legs: 3 }])?;

            let pets = db.collection_group("pets")?;
            pets.add_collection(&cats)?;
            pets.add_collection(&dogs)?;
            pets.add_collection(&cats)?;
            assert_eq!(pets.collections().len(), 2);
            assert_eq!(pets.len(), 2);

            dogs.insert_one(doc! { _id: "d1", legs: 4 })?;
            assert_eq!(pets.count(&doc! { legs: 4 })?, 2);

            cats.update_by_id("c2", &doc! { legs: 4 })?;
            let sorted = pets.find_with_options(&doc! { legs: 4 }, &FindOptions::new().sort(doc! { _id: (-1) }))?;
            assert_eq!(ids(&sorted), vec!["d1", "c2", "c1"]);

            dogs.remove_by_id("d1")?;
            assert_eq!(ids(&pets.find(&doc! {})?), vec!["c1", "c2"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_writes_reach_every_member() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let left = db.collection("left")?;
            let right = db.collection("right")?;
            let group = db.collection_group("both")?;
            group.add_collection(&left)?;
            group.add_collection(&right)?;

            left.insert_one(doc! { _id: "shared", n: 1 })?;
            right.insert_one(doc! { _id: "own", n: 1 })?;

            let updated = group.update(&doc! { n: 1 }, &doc! { "$inc": { n: 1 } })?;
            assert_eq!(updated.len(), 2);
            assert_eq!(left.count(&doc! { n: 2 })?, 1);
            assert_eq!(right.count(&doc! { n: 2 })?, 1);
            assert_eq!(group.count(&doc! { n: 2 })?, 2);

            let removed = group.remove_by_id("own")?;
            assert_eq!(ids(&removed), vec!["own"]);
            assert!(right.is_empty());
            assert_eq!(ids(&group.find(&doc! {})?), vec!["shared"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_leaving_member_takes_its_documents() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let first = db.collection("first")?;
            let second = db.collection("second")?;
            first.insert_one(doc! { _id: "1" })?;
            second.insert_one(doc! { _id: "2" })?;

            let group = db.collection_group(ctx.name())?;
            group.add_collection(&first)?;
            group.add_collection(&second)?;
            assert!(group.remove_collection(&first)?);
            assert!(!group.remove_collection(&first)?);
            assert_eq!(ids(&group.find(&doc! {})?), vec!["2"]);

            first.insert_one(doc! { _id: "3" })?;
            assert_eq!(group.len(), 1);

            let subset = group.subset(&doc! {}, &FindOptions::new())?;
            assert_eq!(subset.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_members_must_share_primary_key() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let skus = db.collection_with_options("skus", CollectionOptions::new().primary_key("sku"))?;
            let plain = db.collection("plain")?;

            let group = db.collection_group(ctx.name())?;
            group.add_collection(&skus)?;
            assert_eq!(group.primary_key(), "sku");

            let error = group.add_collection(&plain).err().map(|e| e.kind().clone());
            assert_eq!(error, Some(ErrorKind::InvalidOperation));
            assert_eq!(group.collections().len(), 1);
            Ok(())
        },
        cleanup,
    )
}
