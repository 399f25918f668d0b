use super::collection_options::{CollectionOptions, CollectionSettings};
use super::diff::diff_documents;
use super::operation::{
    finish, select, select_keys, DeferredKind, DeferredOp, DeferredQueue, DocumentStore, FindOptimizer,
    InsertCallback,
};
use crate::chain::{link, unlink, Chain, ChainNode, ChainPacket};
use crate::collection::{
    CollectionDiff, CollectionEventInfo, CollectionEventListener, CollectionEvents, CollectionSnapshot, Document,
    FailedInsert, FindOptions, FindPlan, InsertResult, Transform, UpdateOptions, UpsertResult,
};
use crate::common::{
    new_object_id, schedule_once, schedule_repeating, EventAware, EventBus, Path, ScheduledTask, SubscriberRef,
    Value, TEMP_COLLECTION_PREFIX,
};
use crate::config::DatabaseConfig;
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::index::{IndexDescriptor, IndexOptions};
use crate::query::{BooleanMode, Query};
use crate::update::apply_update;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// A named, insertion-ordered set of documents with its indexes.
///
/// Every document carries a unique primary key (`_id` unless configured
/// otherwise); a missing key is generated on insert. Results returned by
/// reads are copies, so nothing a caller does to them reaches the stored
/// data.
///
/// Each successful mutation is forwarded synchronously to the downstream
/// nodes of the collection (views, groups, reactors), published to its
/// event listeners and, debounced, announced as a single
/// [CollectionEvents::Change].
///
/// Batches larger than the configured defer threshold are queued and
/// applied in chunks by the shared scheduler; [Collection::drain_queue]
/// applies them at once.
///
/// Cloning a collection yields another handle to the same data.
///
/// # Examples
///
/// ```rust
/// use rippledb::collection::Collection;
/// use rippledb::doc;
///
/// let users = Collection::new("users");
/// users.insert(vec![doc! { _id: "1", name: "Jim", age: 30 }]).unwrap();
/// users.update(&doc! { name: "Jim" }, &doc! { "$inc": { age: 1 } }).unwrap();
///
/// let jim = users.find_by_id("1").unwrap().unwrap();
/// assert_eq!(jim, doc! { _id: "1", name: "Jim", age: 31 });
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

/// A non-owning handle to a [Collection].
#[derive(Clone)]
pub struct WeakCollection {
    inner: Weak<CollectionInner>,
}

impl WeakCollection {
    pub fn upgrade(&self) -> Option<Collection> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }
}

pub(crate) struct CollectionInner {
    name: String,
    node_id: String,
    settings: CollectionSettings,
    store: RwLock<DocumentStore>,
    chain: Chain,
    event_bus: EventBus<CollectionEventInfo, CollectionEventListener>,
    transform: RwLock<Transform>,
    queue: Mutex<DeferredQueue>,
    queue_driver: Mutex<Option<ScheduledTask>>,
    change_task: Mutex<Option<ScheduledTask>>,
    change_pending: AtomicBool,
    dropped: AtomicBool,
    self_ref: Weak<CollectionInner>,
}

impl Collection {
    /// Creates a standalone collection with the default configuration.
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, CollectionOptions::new().resolve(&DatabaseConfig::new()))
    }

    pub(crate) fn with_settings(name: &str, settings: CollectionSettings) -> Self {
        let node_id = new_object_id();
        let inner = Arc::new_cyclic(|self_ref| CollectionInner {
            name: name.to_string(),
            store: RwLock::new(DocumentStore::new(&settings.primary_key)),
            chain: Chain::new(&node_id),
            node_id,
            settings,
            event_bus: EventBus::new(),
            transform: RwLock::new(Transform::default()),
            queue: Mutex::new(DeferredQueue::new()),
            queue_driver: Mutex::new(None),
            change_task: Mutex::new(None),
            change_pending: AtomicBool::new(false),
            dropped: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        });
        log::debug!("Created collection {}", name);
        Collection { inner }
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    /// Identity of the collection in the propagation graph.
    pub fn node_id(&self) -> String {
        self.inner.node_id.clone()
    }

    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn node_chain(&self) -> &Chain {
        &self.inner.chain
    }

    pub(crate) fn settings(&self) -> &CollectionSettings {
        &self.inner.settings
    }

    pub(crate) fn contains_key(&self, key: &Value) -> bool {
        self.inner.store.read().get(key).is_some()
    }

    /// The collection as a node of the propagation graph.
    pub fn as_node(&self) -> Arc<dyn ChainNode> {
        self.inner.clone()
    }

    /// Forwards every future mutation of this collection to `downstream`.
    pub fn link_downstream(&self, downstream: &Arc<dyn ChainNode>) -> RippleResult<()> {
        self.ensure_open()?;
        link(&self.as_node(), downstream)
    }

    pub fn unlink_downstream(&self, downstream: &Arc<dyn ChainNode>) -> bool {
        unlink(self.inner.as_ref(), downstream.as_ref())
    }

    pub fn primary_key(&self) -> String {
        self.inner.store.read().primary_key().to_string()
    }

    /// Switches the primary key to another field and rebuilds the primary
    /// index. Fails, leaving the collection unchanged, when a document lacks
    /// the field or two documents share a value.
    pub fn set_primary_key(&self, primary_key: &str) -> RippleResult<()> {
        self.ensure_open()?;
        self.inner.store.write().rekey(primary_key)?;
        log::debug!("Collection {} is now keyed by {}", self.inner.name, primary_key);
        Ok(())
    }

    pub fn set_transform(&self, transform: Transform) {
        *self.inner.transform.write() = transform;
    }

    pub fn transform(&self) -> Transform {
        self.inner.transform.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Millisecond timestamp of the last mutation, zero before the first.
    pub fn last_change(&self) -> u128 {
        self.inner.store.read().last_change()
    }

    // region inserts

    /// Inserts documents, appending them in order.
    ///
    /// Documents rejected by the primary index or a unique index are
    /// reported in [InsertResult::failed]; the others are stored. A batch
    /// above the insert defer threshold is queued and reported as deferred.
    pub fn insert(&self, documents: Vec<Document>) -> RippleResult<InsertResult> {
        self.insert_batch(documents, None)
    }

    pub fn insert_one(&self, document: Document) -> RippleResult<InsertResult> {
        self.insert(vec![document])
    }

    /// Inserts documents at `index` of the collection order. Never deferred.
    pub fn insert_at(&self, documents: Vec<Document>, index: usize) -> RippleResult<InsertResult> {
        self.ensure_open()?;
        self.insert_now(documents, Some(index))
    }

    /// Inserts documents and calls `callback` with the combined result once
    /// all of them are processed, immediately or after the queue drained.
    pub fn insert_with_callback<F>(&self, documents: Vec<Document>, callback: F) -> RippleResult<InsertResult>
    where
        F: FnOnce(InsertResult) + Send + 'static,
    {
        self.insert_batch(documents, Some(Box::new(callback)))
    }

    fn insert_batch(&self, documents: Vec<Document>, callback: Option<InsertCallback>) -> RippleResult<InsertResult> {
        self.ensure_open()?;
        let count = documents.len();
        if count > self.inner.settings.defer_thresholds.insert {
            self.defer(documents.into_iter().map(DeferredOp::Insert).collect(), callback);
            return Ok(InsertResult::deferred(count));
        }

        let result = self.insert_now(documents, None)?;
        if let Some(callback) = callback {
            callback(result.clone());
        }
        Ok(result)
    }

    pub(crate) fn insert_now(&self, documents: Vec<Document>, index: Option<usize>) -> RippleResult<InsertResult> {
        self.ensure_open()?;
        let transform = self.transform();
        let mut inserted = Vec::with_capacity(documents.len());
        let mut failed = Vec::new();

        {
            let mut store = self.inner.store.write();
            let primary_key = store.primary_key().to_string();
            let mut position = index;
            for document in documents {
                let document = prepare(document, &primary_key, &transform);
                match store.insert(document.clone(), position) {
                    Ok(_) => {
                        inserted.push(document);
                        if let Some(position) = position.as_mut() {
                            *position += 1;
                        }
                    }
                    Err(e) => failed.push(FailedInsert::new(document, &e)),
                }
            }
            if !inserted.is_empty() {
                store.touch();
            }
        }

        if !inserted.is_empty() {
            log::debug!("Inserted {} documents into {}", inserted.len(), self.inner.name);
            self.emit(
                &ChainPacket::Insert {
                    data: inserted.clone(),
                    index,
                },
                CollectionEvents::Insert,
            )?;
        }
        Ok(InsertResult::new(inserted, failed))
    }

    /// Updates the document with the same primary key, or inserts it.
    pub fn upsert(&self, document: Document) -> RippleResult<UpsertResult> {
        self.ensure_open()?;
        self.upsert_now(document)
    }

    /// Upserts every document. A batch above the upsert defer threshold is
    /// queued and an empty list returned.
    pub fn upsert_many(&self, documents: Vec<Document>) -> RippleResult<Vec<UpsertResult>> {
        self.ensure_open()?;
        if documents.len() > self.inner.settings.defer_thresholds.upsert {
            self.defer(documents.into_iter().map(DeferredOp::Upsert).collect(), None);
            return Ok(vec![]);
        }
        documents.into_iter().map(|document| self.upsert_now(document)).collect()
    }

    fn upsert_now(&self, document: Document) -> RippleResult<UpsertResult> {
        let existing = {
            let store = self.inner.store.read();
            store
                .primary()
                .key_of(&document)
                .filter(|key| store.get(key).is_some())
        };

        match existing {
            Some(key) => {
                let query = self.key_query(&key);
                let updated = self.update_by_keys(&[key], &query, &document, &UpdateOptions::default())?;
                Ok(UpsertResult::Updated(updated))
            }
            None => Ok(UpsertResult::Inserted(self.insert_now(vec![document], None)?)),
        }
    }

    // endregion

    // region updates and removes

    /// Applies `update` to every document matching `query` and returns the
    /// changed documents as they are after the update.
    ///
    /// Documents the update leaves as they were are not reported. An update
    /// rejected for any document aborts the whole operation with that error
    /// and leaves every document as it was.
    pub fn update(&self, query: &Document, update: &Document) -> RippleResult<Vec<Document>> {
        self.update_with_options(query, update, &UpdateOptions::default())
    }

    pub fn update_with_options(
        &self,
        query: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let keys = self.matching_keys(query)?;
        if keys.len() > self.inner.settings.defer_thresholds.update {
            let ops = keys
                .into_iter()
                .map(|key| DeferredOp::Update {
                    key,
                    query: query.clone(),
                    update: update.clone(),
                    options: options.clone(),
                })
                .collect();
            self.defer(ops, None);
            return Ok(vec![]);
        }
        self.update_by_keys(&keys, query, update, options)
    }

    pub fn update_by_id(&self, id: impl Into<Value>, update: &Document) -> RippleResult<Option<Document>> {
        self.ensure_open()?;
        let key = id.into();
        let query = self.key_query(&key);
        let updated = self.update_by_keys(&[key], &query, update, &UpdateOptions::default())?;
        Ok(updated.into_iter().next())
    }

    /// Applies `update` to the documents stored under `keys`. `query` is
    /// passed on to positional updates and to downstream nodes.
    ///
    /// The update is all or nothing: every document is updated on a copy
    /// first, and if one of them fails nothing is stored or emitted.
    pub(crate) fn update_by_keys(
        &self,
        keys: &[Value],
        query: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let mut old_data = Vec::new();
        let mut updated = Vec::new();

        {
            let mut store = self.inner.store.write();
            let mut staged = Vec::new();
            for key in keys {
                let Some(current) = store.get(key).cloned() else {
                    continue;
                };
                let mut document = current.clone();
                match apply_update(&mut document, update, query, options) {
                    Ok(true) => staged.push((key.clone(), current, document)),
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("Update on {} aborted: {}", self.inner.name, e);
                        return Err(e);
                    }
                }
            }

            for (position, (key, _, document)) in staged.iter().enumerate() {
                if let Err(e) = store.replace(key, document.clone()) {
                    rollback_replacements(&mut store, &staged[..position]);
                    log::error!("Update on {} aborted: {}", self.inner.name, e);
                    return Err(e);
                }
            }

            if !staged.is_empty() {
                store.touch();
            }
            for (_, current, document) in staged {
                old_data.push(current);
                updated.push(document);
            }
        }

        if !updated.is_empty() {
            log::debug!("Updated {} documents in {}", updated.len(), self.inner.name);
            self.emit(
                &ChainPacket::Update {
                    query: query.clone(),
                    update: update.clone(),
                    options: options.clone(),
                    data: updated.clone(),
                    old_data,
                },
                CollectionEvents::Update,
            )?;
        }
        Ok(updated)
    }

    /// Removes every document matching `query` and returns them.
    pub fn remove(&self, query: &Document) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let keys = self.matching_keys(query)?;
        if keys.len() > self.inner.settings.defer_thresholds.remove {
            self.defer(keys.into_iter().map(DeferredOp::Remove).collect(), None);
            return Ok(vec![]);
        }
        self.remove_keys(&keys, query)
    }

    pub fn remove_by_id(&self, id: impl Into<Value>) -> RippleResult<Option<Document>> {
        self.ensure_open()?;
        let key = id.into();
        let query = self.key_query(&key);
        Ok(self.remove_keys(&[key], &query)?.into_iter().next())
    }

    /// Replaces whole documents by key and forwards the change as the update
    /// `update` selected by `query`, which produced them upstream.
    pub(crate) fn replace_documents(
        &self,
        replacements: Vec<(Value, Document)>,
        query: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let mut updated = Vec::new();
        let mut old_data = Vec::new();
        let mut failure = None;

        {
            let mut store = self.inner.store.write();
            for (key, document) in replacements {
                let Some(current) = store.get(&key).cloned() else {
                    continue;
                };
                if current == document {
                    continue;
                }
                if let Err(e) = store.replace(&key, document.clone()) {
                    failure = Some(e);
                    break;
                }
                old_data.push(current);
                updated.push(document);
            }
            if !updated.is_empty() {
                store.touch();
            }
        }

        if !updated.is_empty() {
            self.emit(
                &ChainPacket::Update {
                    query: query.clone(),
                    update: update.clone(),
                    options: options.clone(),
                    data: updated.clone(),
                    old_data,
                },
                CollectionEvents::Update,
            )?;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(updated),
        }
    }

    pub(crate) fn remove_keys(&self, keys: &[Value], query: &Document) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let removed: Vec<Document> = {
            let mut store = self.inner.store.write();
            let removed: Vec<Document> = keys.iter().filter_map(|key| store.remove(key)).collect();
            if !removed.is_empty() {
                store.touch();
            }
            removed
        };

        if !removed.is_empty() {
            log::debug!("Removed {} documents from {}", removed.len(), self.inner.name);
            self.emit(
                &ChainPacket::Remove {
                    query: query.clone(),
                    data: removed.clone(),
                },
                CollectionEvents::Remove,
            )?;
        }
        Ok(removed)
    }

    // endregion

    // region reads

    pub fn find(&self, query: &Document) -> RippleResult<Vec<Document>> {
        self.find_with_options(query, &FindOptions::default())
    }

    /// Finds the documents matching `query`: filtered, then sorted, then
    /// joined, then paged.
    pub fn find_with_options(&self, query: &Document, options: &FindOptions) -> RippleResult<Vec<Document>> {
        Ok(self.find_planned(query, options)?.0)
    }

    pub fn find_one(&self, query: &Document) -> RippleResult<Option<Document>> {
        let found = self.find_with_options(query, &FindOptions::new().limit(1))?;
        Ok(found.into_iter().next())
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> RippleResult<Option<Document>> {
        self.ensure_open()?;
        let document = self.inner.store.read().get(&id.into()).cloned();
        let transform = self.transform();
        Ok(document.map(|document| transform.apply_out(document)))
    }

    /// Runs the query and returns the plan it was evaluated with, including
    /// the time spent in each step.
    pub fn explain(&self, query: &Document, options: &FindOptions) -> RippleResult<FindPlan> {
        Ok(self.find_planned(query, options)?.1)
    }

    fn find_planned(&self, query: &Document, options: &FindOptions) -> RippleResult<(Vec<Document>, FindPlan)> {
        self.ensure_open()?;
        let started = Instant::now();
        let (selected, mut plan) = {
            let store = self.inner.store.read();
            let mut plan = FindOptimizer::create_find_plan(&store, query, options);
            let selected = select(&store, &mut plan)?;
            (selected, plan)
        };

        let mut documents = finish(selected, &mut plan, options)?;
        let transform = self.transform();
        if transform.has_data_out() {
            documents = documents.into_iter().map(|document| transform.apply_out(document)).collect();
        }
        plan.record("total", started.elapsed());
        Ok((documents, plan))
    }

    /// Position in collection order of the first document matching `query`.
    pub fn index_of(&self, query: &Document) -> RippleResult<Option<usize>> {
        self.ensure_open()?;
        let store = self.inner.store.read();
        let mut plan = FindOptimizer::create_find_plan(&store, query, &FindOptions::default());
        let keys = select_keys(&store, &mut plan)?;
        Ok(keys.first().and_then(|key| store.primary().position(key)))
    }

    pub fn count(&self, query: &Document) -> RippleResult<usize> {
        Ok(self.matching_keys(query)?.len())
    }

    /// Distinct values found at `path` in the documents matching `query`,
    /// in order of first appearance.
    pub fn distinct(&self, path: &str, query: &Document) -> RippleResult<Vec<Value>> {
        let path = Path::new(path);
        let documents = self.find(query)?;
        Ok(documents
            .iter()
            .filter_map(|document| path.value(document).cloned())
            .unique()
            .collect())
    }

    /// Documents whose JSON text contains `search` anywhere, keys included.
    pub fn peek(&self, search: &str) -> RippleResult<Vec<Document>> {
        let documents = self.find(&Document::new())?;
        Ok(documents
            .into_iter()
            .filter(|document| document.to_json().contains(search))
            .collect())
    }

    /// Searches the sub-documents found at `path` in the documents matching
    /// `query`. Matching sub-documents of every parent are collected, then
    /// sorted and paged by `options`.
    pub fn find_sub(
        &self,
        query: &Document,
        path: &str,
        sub_query: &Document,
        options: &FindOptions,
    ) -> RippleResult<Vec<Document>> {
        let matcher = Query::parse(sub_query)?;
        let path = Path::new(path);

        let mut found = Vec::new();
        for document in self.find(query)? {
            match path.value(&document) {
                Some(Value::Array(items)) => found.extend(
                    items
                        .iter()
                        .filter_map(|item| item.as_document())
                        .filter(|item| matcher.matches(item, BooleanMode::And))
                        .cloned(),
                ),
                Some(Value::Document(item)) if matcher.matches(item, BooleanMode::And) => found.push(item.clone()),
                _ => {}
            }
        }

        let mut plan = FindPlan::new(sub_query.clone());
        finish(found, &mut plan, options)
    }

    /// A new standalone collection holding the results of a find. It shares
    /// the primary key and settings of this collection, not its indexes.
    pub fn subset(&self, query: &Document, options: &FindOptions) -> RippleResult<Collection> {
        let documents = self.find_with_options(query, options)?;
        let mut settings = self.inner.settings.clone();
        settings.primary_key = self.primary_key();

        let subset = Collection::with_settings(&format!("{}{}", TEMP_COLLECTION_PREFIX, new_object_id()), settings);
        subset.set_data_now(documents)?;
        Ok(subset)
    }

    /// What must be inserted, updated and removed to turn this collection's
    /// data into `other`'s. Both collections must share the primary key.
    pub fn diff(&self, other: &Collection) -> RippleResult<CollectionDiff> {
        self.ensure_open()?;
        let primary_key = self.primary_key();
        if other.primary_key() != primary_key {
            log::error!(
                "Cannot diff {} keyed by {} against {} keyed by {}",
                self.inner.name,
                primary_key,
                other.inner.name,
                other.primary_key()
            );
            return Err(RippleError::new(
                "Collections must share the primary key to be compared",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(diff_documents(&primary_key, &self.data(), &other.data()))
    }

    /// Every stored document, in collection order, without the output
    /// transform.
    pub(crate) fn data(&self) -> Vec<Document> {
        self.inner.store.read().documents().cloned().collect()
    }

    // endregion

    // region whole data set

    /// Replaces all documents. On a key violation the previous data stays.
    pub fn set_data(&self, documents: Vec<Document>) -> RippleResult<()> {
        self.ensure_open()?;
        self.set_data_now(documents)?;
        Ok(())
    }

    /// Replaces all documents and returns the previous ones.
    pub(crate) fn set_data_now(&self, documents: Vec<Document>) -> RippleResult<Vec<Document>> {
        self.ensure_open()?;
        let transform = self.transform();
        let (data, old_data) = {
            let mut store = self.inner.store.write();
            let primary_key = store.primary_key().to_string();
            let data: Vec<Document> = documents
                .into_iter()
                .map(|document| prepare(document, &primary_key, &transform))
                .collect();
            let old_data = store.replace_all(data.clone())?;
            store.touch();
            (data, old_data)
        };

        if !(data.is_empty() && old_data.is_empty()) {
            log::debug!("Set {} documents on {}", data.len(), self.inner.name);
            self.emit(
                &ChainPacket::SetData {
                    data,
                    old_data: old_data.clone(),
                },
                CollectionEvents::SetData,
            )?;
        }
        Ok(old_data)
    }

    /// Removes every document, keeping indexes and links.
    pub fn truncate(&self) -> RippleResult<()> {
        self.ensure_open()?;
        let old_data: Vec<Document> = {
            let mut store = self.inner.store.write();
            let old_data = store.documents().cloned().collect();
            store.clear();
            store.touch();
            old_data
        };

        if !old_data.is_empty() {
            self.inner.chain.send(&ChainPacket::Remove {
                query: Document::new(),
                data: old_data,
            })?;
        }
        self.publish(CollectionEvents::Truncate, vec![]);
        self.defer_change();
        Ok(())
    }

    /// Drops the collection: queued work is discarded, every link is
    /// severed and listeners are removed. Further calls fail with
    /// [ErrorKind::CollectionDropped].
    pub fn drop(&self) -> RippleResult<()> {
        self.ensure_open()?;
        if self.inner.dropped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.inner.queue.lock().clear();
        self.inner.queue_driver.lock().take();
        self.inner.change_task.lock().take();
        self.inner.chain.unlink_all();
        self.inner.store.write().clear();

        self.publish(CollectionEvents::Drop, vec![]);
        log::debug!("Dropped collection {}", self.inner.name);
        self.inner.event_bus.close()
    }

    pub fn snapshot(&self) -> RippleResult<CollectionSnapshot> {
        self.ensure_open()?;
        let store = self.inner.store.read();
        Ok(CollectionSnapshot::new(
            &self.inner.name,
            store.primary_key(),
            store.documents().cloned().collect(),
            store.last_change(),
        ))
    }

    /// Replaces the data with a snapshot and restores its last-change
    /// timestamp.
    pub fn load(&self, snapshot: CollectionSnapshot) -> RippleResult<()> {
        self.ensure_open()?;
        let primary_key = self.primary_key();
        if snapshot.primary_key() != primary_key {
            log::error!(
                "Snapshot of {} is keyed by {}, collection {} by {}",
                snapshot.name(),
                snapshot.primary_key(),
                self.inner.name,
                primary_key
            );
            return Err(RippleError::new(
                &format!("Snapshot is keyed by {}, expected {}", snapshot.primary_key(), primary_key),
                ErrorKind::InvalidOperation,
            ));
        }

        let last_change = snapshot.last_change();
        self.set_data_now(snapshot.into_data())?;
        self.inner.store.write().set_last_change(last_change);
        Ok(())
    }

    // endregion

    // region indexes

    /// Creates an index over `keys` (`{field: 1 | -1, ...}`) and fills it
    /// from the current data.
    ///
    /// An index with the same key shape is returned as is. A unique index
    /// over data that already holds duplicates is rejected.
    pub fn ensure_index(&self, keys: &Document, options: &IndexOptions) -> RippleResult<IndexDescriptor> {
        self.ensure_open()?;
        let kind = self.inner.settings.config.find_index_kind(options.kind())?;
        let descriptor = IndexDescriptor::new(options.name(), keys, options.is_unique(), options.kind())?;
        kind.validate(&descriptor)?;
        let index = kind.create_index(descriptor)?;

        let descriptor = self.inner.store.write().add_index(index)?;
        log::debug!("Collection {} has index {}", self.inner.name, descriptor);
        Ok(descriptor)
    }

    pub fn drop_index(&self, name: &str) -> RippleResult<IndexDescriptor> {
        self.ensure_open()?;
        self.inner.store.write().drop_index(name)
    }

    pub fn indexes(&self) -> RippleResult<Vec<IndexDescriptor>> {
        self.ensure_open()?;
        Ok(self
            .inner
            .store
            .read()
            .indexes()
            .map(|index| index.descriptor().clone())
            .collect())
    }

    pub fn index(&self, name: &str) -> RippleResult<Option<IndexDescriptor>> {
        self.ensure_open()?;
        Ok(self.inner.store.read().index(name).map(|index| index.descriptor().clone()))
    }

    // endregion

    // region deferred queue

    /// Whether queued writes are waiting to be applied.
    pub fn is_processing_queue(&self) -> bool {
        !self.inner.queue.lock().is_empty()
    }

    /// Applies the next chunk of queued writes. Returns `false` when the
    /// queue was already empty.
    pub fn process_queue(&self) -> RippleResult<bool> {
        self.ensure_open()?;
        let chunk = self.inner.queue.lock().take_chunk(&self.inner.settings.defer_thresholds);
        if chunk.is_empty() {
            return Ok(false);
        }

        let mut batches: Vec<(u64, Vec<DeferredOp>)> = Vec::new();
        for task in chunk {
            match batches.last_mut() {
                Some((batch, ops)) if *batch == task.batch => ops.push(task.op),
                _ => batches.push((task.batch, vec![task.op])),
            }
        }

        for (batch, ops) in batches {
            let count = ops.len();
            let result = self.apply_deferred(ops)?;
            let finished = self.inner.queue.lock().settle(batch, count, result);
            if let Some((callback, result)) = finished {
                callback(result);
            }
        }
        Ok(true)
    }

    /// Applies every queued write now.
    pub fn drain_queue(&self) -> RippleResult<()> {
        while self.process_queue()? {}
        Ok(())
    }

    /// Starts draining the queue on the shared scheduler, one chunk per
    /// defer interval. The driver stops once the queue is empty.
    pub fn start_queue_driver(&self) {
        let mut driver = self.inner.queue_driver.lock();
        if driver.is_some() {
            return;
        }

        let collection = self.inner.self_ref.clone();
        *driver = schedule_repeating(self.inner.settings.defer_interval, move || {
            let Some(inner) = collection.upgrade() else {
                return;
            };
            let collection = Collection { inner };
            match collection.process_queue() {
                Ok(true) => {}
                Ok(false) => collection.stop_queue_driver(),
                Err(e) => log::error!("Failed to process queue of {}: {}", collection.inner.name, e),
            }
        });
    }

    fn stop_queue_driver(&self) {
        let mut driver = self.inner.queue_driver.lock();
        if self.inner.queue.lock().is_empty() {
            driver.take();
        }
    }

    fn defer(&self, ops: Vec<DeferredOp>, callback: Option<InsertCallback>) {
        let count = ops.len();
        self.inner.queue.lock().push_batch(ops, callback);
        log::debug!("Queued {} operations on {}", count, self.inner.name);
        if self.inner.settings.auto_drain {
            self.start_queue_driver();
        }
    }

    fn apply_deferred(&self, ops: Vec<DeferredOp>) -> RippleResult<InsertResult> {
        let Some(kind) = ops.first().map(|op| op.kind()) else {
            return Ok(InsertResult::default());
        };

        match kind {
            DeferredKind::Insert => {
                let documents = ops
                    .into_iter()
                    .filter_map(|op| match op {
                        DeferredOp::Insert(document) => Some(document),
                        _ => None,
                    })
                    .collect();
                self.insert_now(documents, None)
            }
            DeferredKind::Upsert => {
                let mut result = InsertResult::default();
                for op in ops {
                    if let DeferredOp::Upsert(document) = op {
                        if let UpsertResult::Inserted(inserted) = self.upsert_now(document)? {
                            result.merge(inserted);
                        }
                    }
                }
                Ok(result)
            }
            DeferredKind::Update => {
                let mut keys = Vec::with_capacity(ops.len());
                let mut spec = None;
                for op in ops {
                    if let DeferredOp::Update {
                        key,
                        query,
                        update,
                        options,
                    } = op
                    {
                        keys.push(key);
                        spec.get_or_insert((query, update, options));
                    }
                }
                if let Some((query, update, options)) = spec {
                    self.update_by_keys(&keys, &query, &update, &options)?;
                }
                Ok(InsertResult::default())
            }
            DeferredKind::Remove => {
                let keys: Vec<Value> = ops
                    .into_iter()
                    .filter_map(|op| match op {
                        DeferredOp::Remove(key) => Some(key),
                        _ => None,
                    })
                    .collect();
                let query = self.keys_query(&keys);
                self.remove_keys(&keys, &query)?;
                Ok(InsertResult::default())
            }
        }
    }

    // endregion

    // region events

    /// Emits a pending debounced change event now.
    pub fn flush_change(&self) -> RippleResult<()> {
        self.ensure_open()?;
        self.inner.change_task.lock().take();
        if self.inner.change_pending.swap(false, Ordering::AcqRel) {
            self.publish(CollectionEvents::Change, vec![]);
        }
        Ok(())
    }

    fn emit(&self, packet: &ChainPacket, event: CollectionEvents) -> RippleResult<()> {
        self.inner.chain.send(packet)?;
        self.publish(event, packet.data().to_vec());
        self.defer_change();
        Ok(())
    }

    fn publish(&self, event: CollectionEvents, items: Vec<Document>) {
        let info = CollectionEventInfo::new(items, event, self.inner.name.clone());
        if let Err(e) = self.inner.event_bus.publish(info) {
            log::warn!("Failed to publish {:?} event of {}: {}", event, self.inner.name, e);
        }
    }

    fn defer_change(&self) {
        let Some(window) = self.inner.settings.change_debounce else {
            self.publish(CollectionEvents::Change, vec![]);
            return;
        };

        self.inner.change_pending.store(true, Ordering::Release);
        let collection = self.inner.self_ref.clone();
        let task = schedule_once(window, move || {
            if let Some(inner) = collection.upgrade() {
                if inner.change_pending.swap(false, Ordering::AcqRel) {
                    Collection { inner }.publish(CollectionEvents::Change, vec![]);
                }
            }
        });
        *self.inner.change_task.lock() = task;
    }

    // endregion

    fn ensure_open(&self) -> RippleResult<()> {
        if self.inner.dropped.load(Ordering::Relaxed) {
            log::error!("Collection {} is dropped and cannot be accessed", self.inner.name);
            return Err(RippleError::new(
                &format!("Collection {} is dropped and cannot be accessed", self.inner.name),
                ErrorKind::CollectionDropped,
            ));
        }
        Ok(())
    }

    fn matching_keys(&self, query: &Document) -> RippleResult<Vec<Value>> {
        self.ensure_open()?;
        let store = self.inner.store.read();
        let mut plan = FindOptimizer::create_find_plan(&store, query, &FindOptions::default());
        select_keys(&store, &mut plan)
    }

    fn key_query(&self, key: &Value) -> Document {
        let mut query = Document::new();
        query.put(self.primary_key(), key.clone());
        query
    }

    fn keys_query(&self, keys: &[Value]) -> Document {
        let mut condition = Document::new();
        condition.put("$in", Value::Array(keys.to_vec()));
        let mut query = Document::new();
        query.put(self.primary_key(), condition);
        query
    }

    pub(crate) fn keys_of(&self, documents: &[Document]) -> Vec<Value> {
        let primary_key = self.primary_key();
        documents
            .iter()
            .filter_map(|document| document.get(&primary_key).cloned())
            .collect()
    }

    fn receive(&self, sender: &str, packet: &ChainPacket) -> RippleResult<()> {
        log::debug!("Collection {} received {} from {}", self.inner.name, packet, sender);
        match packet {
            ChainPacket::Insert { data, index } => {
                self.insert_now(data.clone(), *index)?;
            }
            ChainPacket::Update {
                query,
                update,
                options,
                old_data,
                ..
            } => {
                let keys = self.keys_of(old_data);
                self.update_by_keys(&keys, query, update, options)?;
            }
            ChainPacket::Remove { query, data } => {
                let keys = self.keys_of(data);
                self.remove_keys(&keys, query)?;
            }
            ChainPacket::SetData { data, .. } => {
                self.set_data_now(data.clone())?;
            }
        }
        Ok(())
    }
}

/// Runs the input transform and fills in a missing primary key.
/// Puts back the documents replaced by a failed update, newest first.
fn rollback_replacements(store: &mut DocumentStore, replaced: &[(Value, Document, Document)]) {
    for (key, current, document) in replaced.iter().rev() {
        let stored_key = store.primary().key_of(document).unwrap_or_else(|| key.clone());
        if let Err(e) = store.replace(&stored_key, current.clone()) {
            log::error!("Failed to restore document {} after an aborted update: {}", key, e);
        }
    }
}

fn prepare(document: Document, primary_key: &str, transform: &Transform) -> Document {
    let mut document = transform.apply_in(document);
    if !document.contains_key(primary_key) {
        document.put(primary_key, new_object_id());
    }
    document
}

impl ChainNode for CollectionInner {
    fn node_id(&self) -> String {
        self.node_id.clone()
    }

    fn node_name(&self) -> String {
        self.name.clone()
    }

    fn chain(&self) -> &Chain {
        &self.chain
    }

    fn chain_receive(&self, sender: &str, packet: &ChainPacket) -> RippleResult<()> {
        match self.self_ref.upgrade() {
            Some(inner) => Collection { inner }.receive(sender, packet),
            None => Ok(()),
        }
    }
    fn chain_data(&self) -> Option<Vec<Document>> {
        Some(self.store.read().documents().cloned().collect())
    }
}

impl EventAware for Collection {
    fn subscribe(&self, listener: CollectionEventListener) -> RippleResult<Option<SubscriberRef>> {
        self.ensure_open()?;
        self.inner.event_bus.register(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> RippleResult<()> {
        self.ensure_open()?;
        self.inner.event_bus.deregister(subscriber)
    }
}

impl Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.inner.name).finish()
    }
}
