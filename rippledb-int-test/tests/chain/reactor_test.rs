use rippledb::chain::{ChainPacket, ReactorIo};
use rippledb::doc;
use rippledb_int_test::test_util::{cleanup, create_test_context, create_test_docs, ids, run_test};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_reactor_filters_between_collections() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let source = db.collection(ctx.name())?;
            let audit = db.collection("audit")?;
            let _reactor = ReactorIo::new(&source.as_node(), &audit.as_node(), |packet| match packet {
                ChainPacket::Insert { data, index } => {
                    let data = data.iter().filter(|d| d.get("age").and_then(|v| v.as_i64()) > Some(18));
                    Ok(Some(ChainPacket::Insert {
                        data: data.cloned().collect(),
                        index: *index,
                    }))
                }
                _ => Ok(None),
            })?;

            source.insert(create_test_docs())?;
            source.remove_by_id("2")?;
            assert_eq!(ids(&audit.find(&doc! {})?), vec!["2", "3"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_reactor_feeds_a_view() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let source = db.collection(ctx.name())?;
            let view = db.view("reacted")?;
            view.query(doc! { "address.city": "Paris" })?;

            let packets = Arc::new(AtomicUsize::new(0));
            let packets_clone = packets.clone();
            let reactor = ReactorIo::new(&source.as_node(), &view.as_node(), move |packet| {
                packets_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Some(packet.clone()))
            })?;

            source.insert(create_test_docs())?;
            assert_eq!(ids(&view.find(&doc! {})?), vec!["1", "3"]);

            reactor.drop();
            source.remove_by_id("1")?;
            assert_eq!(view.len(), 2);
            assert_eq!(packets.load(Ordering::SeqCst), 1);
            Ok(())
        },
        cleanup,
    )
}
