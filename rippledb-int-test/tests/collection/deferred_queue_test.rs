use rippledb::collection::{CollectionEventListener, CollectionEvents};
use rippledb::common::EventAware;
use rippledb::doc;
use rippledb_int_test::test_util::{
    cleanup, create_manual_queue_context, create_random_docs, create_test_context, run_test,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_retry::retry;

#[test]
fn test_large_insert_is_queued_until_drained() {
    run_test(
        || create_manual_queue_context(10),
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let result = collection.insert(create_random_docs(35))?;
            assert!(result.is_deferred());
            assert_eq!(result.deferred_count(), 35);
            assert!(collection.is_processing_queue());
            assert!(collection.is_empty());

            assert!(collection.process_queue()?);
            assert_eq!(collection.len(), 10);

            collection.drain_queue()?;
            assert!(!collection.is_processing_queue());
            assert_eq!(collection.len(), 35);
            assert!(!collection.process_queue()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queued_updates_and_removes_wait_for_drain() {
    run_test(
        || create_manual_queue_context(5),
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_random_docs(5))?;
            assert_eq!(collection.len(), 5);

            collection.insert(create_random_docs(20).into_iter().skip(5).collect())?;
            assert_eq!(collection.len(), 5);
            collection.drain_queue()?;
            assert_eq!(collection.len(), 20);

            let updated = collection.update(&doc! {}, &doc! { seen: true })?;
            assert!(updated.is_empty());
            assert_eq!(collection.count(&doc! { seen: true })?, 0);
            collection.drain_queue()?;

            assert_eq!(collection.count(&doc! { seen: true })?, 20);

            let removed = collection.remove(&doc! { seen: true })?;
            assert!(removed.is_empty());
            collection.drain_queue()?;
            assert!(collection.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_callback_runs_after_queue_drains() {
    run_test(
        || create_manual_queue_context(4),
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let reported = Arc::new(AtomicUsize::new(0));
            let reported_clone = reported.clone();
            collection.insert_with_callback(create_random_docs(9), move |result| {
                reported_clone.store(result.inserted().len(), Ordering::SeqCst);
            })?;

            assert_eq!(reported.load(Ordering::SeqCst), 0);
            collection.drain_queue()?;
            assert_eq!(reported.load(Ordering::SeqCst), 9);
            Ok(())
        },
        cleanup,
    )
}

#[test]
#[retry]
fn test_queue_driver_drains_in_background() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert(create_random_docs(450))?;
            awaitility::at_most(Duration::from_secs(5)).until(|| collection.len() == 450);
            awaitility::at_most(Duration::from_secs(5)).until(|| !collection.is_processing_queue());
            Ok(())
        },
        cleanup,
    )
}

#[test]
#[retry]
fn test_change_events_are_debounced() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let changes = Arc::new(AtomicUsize::new(0));
            let changes_clone = changes.clone();
            collection.subscribe(CollectionEventListener::new(move |event| {
                if event.event_type() == CollectionEvents::Change {
                    changes_clone.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))?;

            for i in 0..5 {
                collection.insert_one(doc! { n: i })?;
            }
            awaitility::at_most(Duration::from_secs(2)).until(|| changes.load(Ordering::SeqCst) == 1);
            std::thread::sleep(Duration::from_millis(250));
            assert_eq!(changes.load(Ordering::SeqCst), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert_many_queues_large_batches() {
    run_test(
        || create_manual_queue_context(3),
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.insert_one(doc! { _id: "a", n: 1 })?;

            let results = collection.upsert_many(vec![doc! { _id: "a", n: 2 }, doc! { _id: "b", n: 1 }])?;
            assert_eq!(results.len(), 2);
            assert_eq!(collection.count(&doc! { n: 2 })?, 1);

            let batch: Vec<_> = (0..5).map(|i| doc! { _id: (format!("k{}", i)), n: 9 }).collect();
            assert!(collection.upsert_many(batch)?.is_empty());
            assert_eq!(collection.count(&doc! { n: 9 })?, 0);
            collection.drain_queue()?;
            assert_eq!(collection.count(&doc! { n: 9 })?, 5);
            Ok(())
        },
        cleanup,
    )
}
