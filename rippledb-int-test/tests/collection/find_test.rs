use rippledb::collection::{FindOptions, Join};
use rippledb::common::Value;
use rippledb::doc;
use rippledb::index::non_unique_index;
use rippledb_int_test::test_util::{
    cleanup, create_random_docs, create_test_context, create_test_docs, ids, run_test, sorted_keys,
};

#[test]
fn test_index_and_scan_return_the_same_documents() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_random_docs(300))?;
            collection.ensure_index(&doc! { age: 1 }, &non_unique_index())?;
            collection.ensure_index(&doc! { city: 1, age: (-1) }, &non_unique_index())?;

            let queries = vec![
                doc! { age: 30 },
                doc! { age: { "$gt": 11, "$lt": 20 } },
                doc! { age: { "$gte": 50 } },
                doc! { age: { "$in": [1, 2, 3, 58] } },
                doc! { city: "Paris", age: { "$lte": 25 } },
                doc! { city: { "$in": ["Tokyo", "Lima"] } },
                doc! { "$or": [{ city: "Paris" }, { age: { "$lt": 5 } }] },
                doc! { nick: { "$exists": true } },
            ];

            for query in queries {
                let indexed = collection.find(&query)?;
                let scanned = collection.find_with_options(&query, &FindOptions::new().skip_index(true))?;
                assert_eq!(sorted_keys(&indexed), sorted_keys(&scanned), "query {:?}", query);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_multi_key_sort_orders_ties_by_next_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(vec![doc! { _id: "x", a: 1, b: 2 }, doc! { _id: "y", a: 1, b: 1 }])?;

            let sorted = collection.find_with_options(&doc! {}, &FindOptions::new().sort(doc! { a: 1, b: 1 }))?;
            assert_eq!(ids(&sorted), vec!["y", "x"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_skip_limit() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            let options = FindOptions::new().sort(doc! { age: (-1) }).skip(1).limit(1);
            assert_eq!(ids(&collection.find_with_options(&doc! {}, &options)?), vec!["2"]);

            let first = collection.find_one(&doc! { last_name: "ln2" })?;
            assert_eq!(first.and_then(|d| d.get("_id").cloned()), Some(Value::from("2")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_nested_paths_regex_and_arrays() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            assert_eq!(collection.count(&doc! { "address.city": "Paris" })?, 2);
            assert_eq!(collection.count(&doc! { address: { city: "London" } })?, 1);
            assert_eq!(collection.count(&doc! { body: { "$regex": "^QUICK", "$options": "i" } })?, 1);
            assert_eq!(collection.count(&doc! { tags: "two" })?, 2);
            assert_eq!(collection.count(&doc! { age: { "$nin": [15, 22] } })?, 1);
            assert_eq!(
                collection.count(&doc! { "$and": [{ last_name: "ln2" }, { age: { "$gt": 30 } }] })?,
                1
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_attaches_matches() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let customers = db.collection("customers")?;
            let orders = db.collection("orders")?;
            customers.insert(vec![doc! { _id: "c1", name: "Ann" }, doc! { _id: "c2", name: "Ben" }])?;
            orders.insert(vec![
                doc! { _id: "o1", customerId: "c1", total: 10 },
                doc! { _id: "o2", customerId: "c1", total: 3 },
                doc! { _id: "o3", customerId: "c2", total: 7 },
            ])?;

            let options = FindOptions::new()
                .sort(doc! { _id: 1 })
                .join(Join::new(&orders).on("customerId", "_id").as_key("orders").multi(true));
            let found = customers.find_with_options(&doc! {}, &options)?;
            assert_eq!(ids(&found), vec!["c1", "c2"]);

            let ann_orders = found[0].get("orders").cloned().unwrap_or_default();
            match ann_orders {
                Value::Array(orders) => assert_eq!(orders.len(), 2),
                other => panic!("expected an array, found {:?}", other),
            }

            let big_spenders =
                customers.find_with_options(&doc! { "orders.total": { "$gt": 8 } }, &options)?;
            assert_eq!(ids(&big_spenders), vec!["c1"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_distinct_subset_and_diff() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;

            let cities = collection.distinct("address.city", &doc! {})?;
            assert_eq!(cities, vec![Value::from("Paris"), Value::from("London")]);

            let subset = collection.subset(&doc! { "address.city": "Paris" }, &FindOptions::new())?;
            assert_eq!(subset.len(), 2);
            assert_eq!(subset.primary_key(), "_id");

            let diff = subset.diff(&collection)?;
            assert_eq!(ids(diff.insert()), vec!["2"]);
            assert!(diff.update().is_empty());
            assert!(diff.remove().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_sub_searches_nested_arrays() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(vec![
                doc! { _id: "a", items: [{ sku: "x", qty: 1 }, { sku: "y", qty: 5 }] },
                doc! { _id: "b", items: [{ sku: "z", qty: 9 }] },
            ])?;

            let found = collection.find_sub(
                &doc! {},
                "items",
                &doc! { qty: { "$gt": 2 } },
                &FindOptions::new().sort(doc! { qty: (-1) }),
            )?;
            let skus: Vec<Value> = found.iter().filter_map(|d| d.get("sku").cloned()).collect();
            assert_eq!(skus, vec![Value::from("z"), Value::from("y")]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_peek_searches_json_text() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_test_docs())?;
            assert_eq!(ids(&collection.peek("ipsum")?), vec!["3"]);
            assert_eq!(ctx.db().peek("ipsum")?.len(), 1);
            Ok(())
        },
        cleanup,
    )
}
