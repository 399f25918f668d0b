use rippledb::chain::link;
use rippledb::collection::{order_by, CollectionEventListener, CollectionEvents, FindOptions};
use rippledb::common::EventAware;
use rippledb::doc;
use rippledb_int_test::test_util::{cleanup, create_test_context, create_test_docs, ids, run_test};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_retry::retry;

#[test]
fn test_view_follows_source_mutations() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            people.insert(create_test_docs())?;

            let adults = db.view("adults")?;
            adults.query(doc! { age: { "$gte": 18 } })?;
            adults.query_options(order_by(doc! { age: (-1) }))?;
            adults.from(&people)?;
            assert_eq!(adults.current_query(), doc! { age: { "$gte": 18 } });
            assert!(adults.current_options().sort_spec().is_some());
            assert_eq!(ids(&adults.find(&doc! {})?), vec!["3", "2"]);

            people.update_by_id("1", &doc! { age: 30 })?;
            assert_eq!(ids(&adults.find(&doc! {})?), vec!["3", "1", "2"]);

            people.update_by_id("3", &doc! { age: 12 })?;
            assert_eq!(ids(&adults.find(&doc! {})?), vec!["1", "2"]);

            people.remove_by_id("2")?;
            people.insert_one(doc! { _id: "4", age: 50 })?;
            assert_eq!(ids(&adults.find(&doc! {})?), vec!["4", "1"]);
            assert_eq!(adults.count(&doc! { "address.city": "Paris" })?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_views_chain_through_each_other() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            let hello = db.view("hello")?;
            hello.query(doc! { body: { "$regex": "quick" } })?;
            hello.from(&people)?;

            let hello2 = db.view("hello2")?;
            hello2.query(doc! { "address.city": "London" })?;
            link(&hello.as_node(), &hello2.as_node())?;
            assert!(hello2.source().is_none());

            people.insert(create_test_docs())?;
            assert_eq!(ids(&hello.find(&doc! {})?), vec!["1", "2"]);
            assert_eq!(ids(&hello2.find(&doc! {})?), vec!["2"]);

            people.truncate()?;
            assert!(hello.is_empty());
            assert!(hello2.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_chained_view_follows_replaced_data() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            let adults = db.view("adults")?;
            adults.query(doc! { age: { "$gte": 18 } })?;
            adults.from(&people)?;

            let seniors = db.view("seniors")?;
            seniors.query(doc! { age: { "$gte": 35 } })?;
            link(&adults.as_node(), &seniors.as_node())?;

            people.insert(create_test_docs())?;
            assert_eq!(ids(&seniors.find(&doc! {})?), vec!["3"]);

            people.set_data(vec![doc! { _id: "9", age: 90 }, doc! { _id: "8", age: 20 }])?;
            assert_eq!(adults.len(), 2);
            assert_eq!(ids(&seniors.find(&doc! {})?), vec!["9"]);
            assert!(seniors.find_by_id("3")?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_views_linked_to_paged_views() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;

            let youngest = db.view("youngest")?;
            youngest.query_options(FindOptions::new().sort(doc! { age: 1 }).limit(2))?;
            youngest.from(&people)?;
            let mirror = db.view("mirror")?;
            link(&youngest.as_node(), &mirror.as_node())?;

            let rest = db.view("rest")?;
            rest.query_options(FindOptions::new().sort(doc! { age: 1 }).skip(1))?;
            rest.from(&people)?;
            let rest_in_paris = db.view("rest_in_paris")?;
            rest_in_paris.query(doc! { "address.city": "Paris" })?;
            link(&rest.as_node(), &rest_in_paris.as_node())?;

            people.insert(create_test_docs())?;
            let mut mirrored = ids(&mirror.find(&doc! {})?);
            mirrored.sort();
            assert_eq!(mirrored, vec!["1", "2"]);
            assert_eq!(ids(&rest_in_paris.find(&doc! {})?), vec!["3"]);

            people.insert_one(doc! { _id: "0", age: 3, address: { city: "Paris" } })?;
            let mut mirrored = ids(&mirror.find(&doc! {})?);
            mirrored.sort();
            assert_eq!(mirrored, vec!["0", "1"]);
            assert_eq!(ids(&rest_in_paris.find(&doc! {})?), vec!["1", "3"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_linked_views_resort_through_link() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            let everyone = db.view("everyone")?;
            everyone.from(&people)?;

            let ranked = db.view("ranked")?;
            ranked.query_options(order_by(doc! { age: (-1) }))?;
            link(&everyone.as_node(), &ranked.as_node())?;
            let oldest = db.view("oldest")?;
            oldest.query_options(FindOptions::new().limit(1))?;
            link(&ranked.as_node(), &oldest.as_node())?;

            people.insert(create_test_docs())?;
            assert_eq!(ids(&ranked.find(&doc! {})?), vec!["3", "2", "1"]);
            assert_eq!(ids(&oldest.find(&doc! {})?), vec!["3"]);

            people.update_by_id("1", &doc! { age: 50 })?;
            assert_eq!(ids(&ranked.find(&doc! {})?), vec!["1", "3", "2"]);
            assert_eq!(ids(&oldest.find(&doc! {})?), vec!["1"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_limited_view_refreshes_window() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            people.insert(create_test_docs())?;

            let youngest = db.view("youngest")?;
            youngest.query_options(FindOptions::new().sort(doc! { age: 1 }).limit(2))?;
            youngest.from(&people)?;
            assert_eq!(ids(&youngest.find(&doc! {})?), vec!["1", "2"]);

            people.insert_one(doc! { _id: "0", age: 3 })?;
            assert_eq!(ids(&youngest.find(&doc! {})?), vec!["0", "1"]);

            people.remove(&doc! { age: { "$lt": 18 } })?;
            assert_eq!(ids(&youngest.find(&doc! {})?), vec!["2", "3"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
#[retry]
fn test_view_publishes_debounced_change() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            let view = db.view("watched")?;
            view.from(&people)?;

            let events = Arc::new(Mutex::new(Vec::new()));
            let events_clone = events.clone();
            view.subscribe(CollectionEventListener::new(move |event| {
                if let Ok(mut events) = events_clone.lock() {
                    events.push(event.event_type());
                }
                Ok(())
            }))?;

            people.insert_one(doc! { _id: "1" })?;
            people.insert_one(doc! { _id: "2" })?;
            people.update_by_id("1", &doc! { seen: true })?;

            awaitility::at_most(Duration::from_secs(2)).until(|| {
                events
                    .lock()
                    .map(|events| events.contains(&CollectionEvents::Change))
                    .unwrap_or(false)
            });

            let events = events.lock().map(|e| e.clone()).unwrap_or_default();
            let changes = events.iter().filter(|e| **e == CollectionEvents::Change).count();
            assert_eq!(changes, 1);
            assert_eq!(events.iter().filter(|e| **e == CollectionEvents::Insert).count(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_dropped_view_detaches_from_source() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let people = db.collection(ctx.name())?;
            let view = db.view("detached")?;
            view.from(&people)?;
            assert_eq!(people.as_node().chain().downstream_count(), 1);

            view.drop()?;
            assert_eq!(people.as_node().chain().downstream_count(), 0);
            people.insert(create_test_docs())?;
            assert!(view.find(&doc! {}).is_err());
            Ok(())
        },
        cleanup,
    )
}
