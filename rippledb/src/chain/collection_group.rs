use crate::chain::{link, unlink, Chain, ChainNode, ChainPacket};
use crate::collection::{
    diff_documents, Collection, CollectionEventListener, CollectionOptions, CollectionSettings, Document,
    FindOptions, InsertResult, WeakCollection,
};
use crate::common::{EventAware, SubscriberRef, Value};
use crate::config::DatabaseConfig;
use crate::errors::{ErrorKind, RippleError, RippleResult};
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

/// The union of several collections, kept up to date through the
/// propagation graph.
///
/// Every member must share the group's primary key; the first member added
/// to an empty group decides it. Reads are served from the aggregate, writes
/// are routed to every member and come back into the aggregate as packets.
#[derive(Clone)]
pub struct CollectionGroup {
    inner: Arc<GroupInner>,
}

struct GroupInner {
    name: String,
    data: Collection,
    members: RwLock<Vec<WeakCollection>>,
}

impl CollectionGroup {
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, CollectionOptions::new().resolve(&DatabaseConfig::new()))
    }

    pub(crate) fn with_settings(name: &str, settings: CollectionSettings) -> Self {
        CollectionGroup {
            inner: Arc::new(GroupInner {
                name: name.to_string(),
                data: Collection::with_settings(name, settings),
                members: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    pub fn primary_key(&self) -> String {
        self.inner.data.primary_key()
    }

    pub fn as_node(&self) -> Arc<dyn ChainNode> {
        self.inner.clone()
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.inner.members()
    }

    /// Adds a member and folds its current documents into the aggregate.
    /// Adding a member twice has no effect.
    pub fn add_collection(&self, collection: &Collection) -> RippleResult<()> {
        let members = self.inner.members();
        if members.iter().any(|member| member.node_id() == collection.node_id()) {
            return Ok(());
        }

        let primary_key = collection.primary_key();
        if members.is_empty() && self.inner.data.is_empty() {
            if self.primary_key() != primary_key {
                self.inner.data.set_primary_key(&primary_key)?;
            }
        } else if self.primary_key() != primary_key {
            log::error!(
                "Collection {} keyed by {} cannot join group {} keyed by {}",
                collection.name(),
                primary_key,
                self.inner.name,
                self.primary_key()
            );
            return Err(RippleError::new(
                "All collections in a group must have the same primary key",
                ErrorKind::InvalidOperation,
            ));
        }

        link(&collection.as_node(), &self.as_node())?;
        self.inner.members.write().push(collection.downgrade());
        self.inner.data.insert_now(collection.data(), None)?;
        log::debug!("Collection {} joined group {}", collection.name(), self.inner.name);
        Ok(())
    }

    /// Removes a member and its documents from the aggregate. Returns false
    /// when the collection was not a member.
    pub fn remove_collection(&self, collection: &Collection) -> RippleResult<bool> {
        let node_id = collection.node_id();
        let removed = {
            let mut members = self.inner.members.write();
            let before = members.len();
            members.retain(|member| member.upgrade().is_some_and(|member| member.node_id() != node_id));
            before != members.len()
        };
        if !removed {
            return Ok(false);
        }

        unlink(collection.as_node().as_ref(), self.inner.as_ref());
        let keys = self.inner.data.keys_of(&collection.data());
        self.inner.data.remove_keys(&keys, &Document::new())?;
        log::debug!("Collection {} left group {}", collection.name(), self.inner.name);
        Ok(true)
    }

    pub fn insert(&self, documents: Vec<Document>) -> RippleResult<Vec<InsertResult>> {
        self.inner
            .members()
            .iter()
            .map(|member| member.insert(documents.clone()))
            .collect()
    }

    pub fn update(&self, query: &Document, update: &Document) -> RippleResult<Vec<Document>> {
        let mut updated = Vec::new();
        for member in self.inner.members() {
            updated.extend(member.update(query, update)?);
        }
        Ok(updated)
    }

    pub fn update_by_id(&self, id: impl Into<Value>, update: &Document) -> RippleResult<Vec<Document>> {
        let id = id.into();
        let mut updated = Vec::new();
        for member in self.inner.members() {
            updated.extend(member.update_by_id(id.clone(), update)?);
        }
        Ok(updated)
    }

    pub fn remove(&self, query: &Document) -> RippleResult<Vec<Document>> {
        let mut removed = Vec::new();
        for member in self.inner.members() {
            removed.extend(member.remove(query)?);
        }
        Ok(removed)
    }

    pub fn remove_by_id(&self, id: impl Into<Value>) -> RippleResult<Vec<Document>> {
        let id = id.into();
        let mut removed = Vec::new();
        for member in self.inner.members() {
            removed.extend(member.remove_by_id(id.clone())?);
        }
        Ok(removed)
    }

    pub fn find(&self, query: &Document) -> RippleResult<Vec<Document>> {
        self.inner.data.find(query)
    }

    pub fn find_with_options(&self, query: &Document, options: &FindOptions) -> RippleResult<Vec<Document>> {
        self.inner.data.find_with_options(query, options)
    }

    pub fn count(&self, query: &Document) -> RippleResult<usize> {
        self.inner.data.count(query)
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn subset(&self, query: &Document, options: &FindOptions) -> RippleResult<Collection> {
        self.inner.data.subset(query, options)
    }

    /// Releases every member and drops the aggregate.
    pub fn drop(&self) -> RippleResult<()> {
        let members = std::mem::take(&mut *self.inner.members.write());
        for member in members.iter().filter_map(WeakCollection::upgrade) {
            unlink(member.as_node().as_ref(), self.inner.as_ref());
        }
        log::debug!("Dropping collection group {}", self.inner.name);
        self.inner.data.drop()
    }
}

impl GroupInner {
    fn members(&self) -> Vec<Collection> {
        self.members.read().iter().filter_map(WeakCollection::upgrade).collect()
    }

    fn fold(&self, packet: &ChainPacket) -> RippleResult<()> {
        match packet {
            ChainPacket::Insert { data, .. } => {
                self.data.insert_now(data.clone(), None)?;
            }
            ChainPacket::Update {
                query,
                update,
                options,
                old_data,
                ..
            } => {
                let keys = self.data.keys_of(old_data);
                self.data.update_by_keys(&keys, query, update, options)?;
            }
            ChainPacket::Remove { query, data } => {
                let keys = self.data.keys_of(data);
                self.data.remove_keys(&keys, query)?;
            }
            ChainPacket::SetData { data, old_data } => {
                let primary_key = self.data.primary_key();
                let (insert, update, remove) = diff_documents(&primary_key, old_data, data).into_parts();

                if !remove.is_empty() {
                    self.data.remove_keys(&self.data.keys_of(&remove), &Document::new())?;
                }
                if !update.is_empty() {
                    let keys = self.data.keys_of(&update);
                    let replacements = keys.into_iter().zip(update).collect();
                    self.data
                        .replace_documents(replacements, &Document::new(), &Document::new(), &Default::default())?;
                }
                if !insert.is_empty() {
                    self.data.insert_now(insert, None)?;
                }
            }
        }
        Ok(())
    }
}

impl ChainNode for GroupInner {
    fn node_id(&self) -> String {
        self.data.node_id()
    }

    fn node_name(&self) -> String {
        self.name.clone()
    }

    fn chain(&self) -> &Chain {
        self.data.node_chain()
    }

    fn chain_receive(&self, sender: &str, packet: &ChainPacket) -> RippleResult<()> {
        log::debug!("Group {} received {} from {}", self.name, packet, sender);
        self.fold(packet)
    }
    fn chain_data(&self) -> Option<Vec<Document>> {
        Some(self.data.data())
    }
}

impl EventAware for CollectionGroup {
    fn subscribe(&self, listener: CollectionEventListener) -> RippleResult<Option<SubscriberRef>> {
        self.inner.data.subscribe(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> RippleResult<()> {
        self.inner.data.unsubscribe(subscriber)
    }
}

impl Debug for CollectionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionGroup")
            .field("name", &self.inner.name)
            .field("members", &self.inner.members.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionOptions;
    use crate::doc;

    fn ids(documents: &[Document]) -> Vec<String> {
        let mut ids: Vec<String> = documents
            .iter()
            .filter_map(|d| d.get("_id").and_then(|v| v.as_string()).map(String::from))
            .collect();
        ids.sort();
        ids
    }

    fn members() -> (Collection, Collection, CollectionGroup) {
        let cats = Collection::new("cats");
        let dogs = Collection::new("dogs");
        cats.insert_one(doc! { _id: "c1", legs: 4 }).unwrap();
        dogs.insert_one(doc! { _id: "d1", legs: 4 }).unwrap();

        let group = CollectionGroup::new("pets");
        group.add_collection(&cats).unwrap();
        group.add_collection(&dogs).unwrap();
        (cats, dogs, group)
    }

    #[test]
    fn test_aggregate_holds_member_data() {
        let (_cats, _dogs, group) = members();
        assert_eq!(ids(&group.find(&doc! {}).unwrap()), vec!["c1", "d1"]);
        assert_eq!(group.collections().len(), 2);
    }

    #[test]
    fn test_member_mutations_fold_into_aggregate() {
        let (cats, dogs, group) = members();
        cats.insert_one(doc! { _id: "c2", legs: 3 }).unwrap();
        assert_eq!(group.len(), 3);

        dogs.update_by_id("d1", &doc! { legs: 5 }).unwrap();
        assert_eq!(group.find_by_legs(5), vec!["d1"]);

        cats.remove(&doc! { legs: 3 }).unwrap();
        assert_eq!(ids(&group.find(&doc! {}).unwrap()), vec!["c1", "d1"]);
    }

    #[test]
    fn test_set_data_applies_only_the_delta() {
        let (cats, _dogs, group) = members();
        cats.insert_one(doc! { _id: "c2", legs: 4 }).unwrap();
        cats.set_data(vec![doc! { _id: "c1", legs: 3 }, doc! { _id: "c3", legs: 4 }])
            .unwrap();

        assert_eq!(ids(&group.find(&doc! {}).unwrap()), vec!["c1", "c3", "d1"]);
        assert_eq!(group.find_by_legs(3), vec!["c1"]);
    }

    #[test]
    fn test_writes_are_routed_to_members() {
        let (cats, dogs, group) = members();
        group.update(&doc! { legs: 4 }, &doc! { "$inc": { legs: 1 } }).unwrap();
        assert_eq!(cats.find_by_id("c1").unwrap().and_then(|d| d.get("legs").and_then(|v| v.as_i64())), Some(5));
        assert_eq!(dogs.find_by_id("d1").unwrap().and_then(|d| d.get("legs").and_then(|v| v.as_i64())), Some(5));
        assert_eq!(group.find_by_legs(5), vec!["c1", "d1"]);

        group.remove_by_id("c1").unwrap();
        assert!(cats.is_empty());
        assert_eq!(ids(&group.find(&doc! {}).unwrap()), vec!["d1"]);
    }

    #[test]
    fn test_mismatched_primary_key_is_rejected() {
        let (_cats, _dogs, group) = members();
        let birds = Collection::with_settings(
            "birds",
            CollectionOptions::new()
                .primary_key("tag")
                .resolve(&DatabaseConfig::new()),
        );
        let error = group.add_collection(&birds).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_first_member_decides_primary_key() {
        let birds = Collection::with_settings(
            "birds",
            CollectionOptions::new()
                .primary_key("tag")
                .resolve(&DatabaseConfig::new()),
        );
        birds.insert_one(doc! { tag: "b1" }).unwrap();
        let group = CollectionGroup::new("flock");
        group.add_collection(&birds).unwrap();
        assert_eq!(group.primary_key(), "tag");
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_remove_collection_and_drop() {
        let (cats, dogs, group) = members();
        assert!(group.remove_collection(&cats).unwrap());
        assert!(!group.remove_collection(&cats).unwrap());
        assert_eq!(ids(&group.find(&doc! {}).unwrap()), vec!["d1"]);

        cats.insert_one(doc! { _id: "c9" }).unwrap();
        assert_eq!(group.len(), 1);

        group.drop().unwrap();
        assert_eq!(dogs.node_chain().downstream_count(), 0);
        dogs.insert_one(doc! { _id: "d2" }).unwrap();
    }

    impl CollectionGroup {
        fn find_by_legs(&self, legs: i64) -> Vec<String> {
            ids(&self.find(&doc! { legs: legs }).unwrap())
        }
    }
}
