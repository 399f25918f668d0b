use crate::chain::{link, unlink, Chain, ChainNode, ChainPacket};
use crate::collection::sort::DocumentSorter;
use crate::collection::{
    Collection, CollectionEventListener, CollectionOptions, CollectionSettings, Document, FindOptions,
    WeakCollection,
};
use crate::common::{EventAware, SubscriberRef, Value, TEMP_COLLECTION_PREFIX};
use crate::config::DatabaseConfig;
use crate::errors::RippleResult;
use crate::query::{BooleanMode, Query};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

/// A live, filtered and sorted projection of one collection.
///
/// A view stores a query and find options over its source collection and
/// keeps a private copy of the matching documents. Mutations of the source
/// reach the view through the propagation graph and are folded in
/// incrementally: inserted documents are filtered and placed at their sort
/// position, updated documents enter, move within or leave the view, and
/// removed documents are dropped. Views with `skip`, `limit` or joins
/// re-run their query instead, as does every view receiving a whole new
/// data set.
///
/// A view linked downstream of another node with [link] instead of
/// [View::from] has no source collection. It re-runs its query over the
/// data of its upstream nodes, or over the data a packet replaces them
/// with.
///
/// Changes of the view's own data are forwarded to its downstream nodes,
/// so views can be chained.
///
/// ```rust
/// use rippledb::chain::View;
/// use rippledb::collection::Collection;
/// use rippledb::doc;
///
/// let users = Collection::new("users");
/// let active = View::new("active");
/// active.from(&users).unwrap();
/// active.query(doc! { active: true }).unwrap();
///
/// users.insert(vec![doc! { _id: "1", active: true }, doc! { _id: "2", active: false }]).unwrap();
/// assert_eq!(active.count(&doc! {}).unwrap(), 1);
///
/// users.update_by_id("2", &doc! { active: true }).unwrap();
/// assert_eq!(active.count(&doc! {}).unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct View {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    name: String,
    data: Collection,
    source: RwLock<Option<WeakCollection>>,
    query: RwLock<Document>,
    options: RwLock<FindOptions>,
}

impl View {
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, CollectionOptions::new().resolve(&DatabaseConfig::new()))
    }

    pub(crate) fn with_settings(name: &str, settings: CollectionSettings) -> Self {
        View {
            inner: Arc::new(ViewInner {
                name: name.to_string(),
                data: Collection::with_settings(name, settings),
                source: RwLock::new(None),
                query: RwLock::new(Document::new()),
                options: RwLock::new(FindOptions::default()),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    pub fn as_node(&self) -> Arc<dyn ChainNode> {
        self.inner.clone()
    }

    /// Makes `source` the collection this view projects, replacing any
    /// previous source, and refreshes the data.
    pub fn from(&self, source: &Collection) -> RippleResult<()> {
        self.detach();

        let primary_key = source.primary_key();
        if self.inner.data.primary_key() != primary_key {
            self.inner.data.set_data_now(vec![])?;
            self.inner.data.set_primary_key(&primary_key)?;
        }

        *self.inner.source.write() = Some(source.downgrade());
        link(&source.as_node(), &self.as_node())?;
        log::debug!("View {} now reads from {}", self.inner.name, source.name());
        self.refresh()
    }

    pub fn source(&self) -> Option<Collection> {
        self.inner.source()
    }

    /// Replaces the stored query and refreshes the data.
    pub fn query(&self, query: Document) -> RippleResult<()> {
        Query::parse(&query)?;
        *self.inner.query.write() = query;
        self.refresh()
    }

    /// Replaces the stored find options and refreshes the data.
    pub fn query_options(&self, options: FindOptions) -> RippleResult<()> {
        *self.inner.options.write() = options;
        self.refresh()
    }

    pub fn current_query(&self) -> Document {
        self.inner.query.read().clone()
    }

    pub fn current_options(&self) -> FindOptions {
        self.inner.options.read().clone()
    }

    /// Re-runs the stored query against the source, or against the data of
    /// the upstream nodes when the view has no source.
    pub fn refresh(&self) -> RippleResult<()> {
        self.inner.refresh()
    }

    pub fn find(&self, query: &Document) -> RippleResult<Vec<Document>> {
        self.inner.data.find(query)
    }

    pub fn find_with_options(&self, query: &Document, options: &FindOptions) -> RippleResult<Vec<Document>> {
        self.inner.data.find_with_options(query, options)
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> RippleResult<Option<Document>> {
        self.inner.data.find_by_id(id)
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

    /// Detaches the view from its source and drops its data.
    pub fn drop(&self) -> RippleResult<()> {
        self.detach();
        self.inner.data.drop()
    }

    fn detach(&self) {
        let previous = self.inner.source.write().take().and_then(|source| source.upgrade());
        if let Some(previous) = previous {
            unlink(previous.as_node().as_ref(), self.inner.as_ref());
        }
    }
}

impl ViewInner {
    fn source(&self) -> Option<Collection> {
        self.source.read().as_ref().and_then(|source| source.upgrade())
    }

    fn refresh(&self) -> RippleResult<()> {
        let Some(source) = self.source() else {
            return match self.upstream_data() {
                Some(documents) => self.rebuild(documents),
                None => Ok(()),
            };
        };
        let query = self.query.read().clone();
        let options = self.options.read().clone();
        let documents = source.find_with_options(&query, &options)?;
        self.data.set_data_now(documents)?;
        Ok(())
    }

    /// Everything the upstream nodes hold, or `None` when none of them
    /// exposes its documents.
    fn upstream_data(&self) -> Option<Vec<Document>> {
        let mut documents: Option<Vec<Document>> = None;
        for node in self.data.node_chain().upstream_nodes() {
            if let Some(data) = node.chain_data() {
                documents.get_or_insert_with(Vec::new).extend(data);
            }
        }
        documents
    }

    /// Replaces the data with what the stored query and options select
    /// from `documents`.
    fn rebuild(&self, documents: Vec<Document>) -> RippleResult<()> {
        let mut settings = self.data.settings().clone();
        settings.primary_key = self.data.primary_key();
        settings.change_debounce = None;
        let staging = Collection::with_settings(&format!("{}{}", TEMP_COLLECTION_PREFIX, self.name), settings);
        staging.set_data_now(documents)?;

        let query = self.query.read().clone();
        let options = self.options.read().clone();
        let selected = staging.find_with_options(&query, &options)?;
        log::debug!("View {} rebuilt with {} documents", self.name, selected.len());
        self.data.set_data_now(selected)?;
        Ok(())
    }

    fn needs_refresh(&self) -> bool {
        let options = self.options.read();
        options.skip.is_some() || options.limit.is_some() || !options.joins.is_empty()
    }

    fn apply(&self, packet: &ChainPacket) -> RippleResult<()> {
        if self.needs_refresh() && !matches!(packet, ChainPacket::SetData { .. }) {
            if self.source().is_some() {
                return self.refresh();
            }
            if let Some(documents) = self.upstream_data() {
                return self.rebuild(documents);
            }
        }

        let matcher = Query::parse(&self.query.read())?;
        let options = self.options.read().clone();
        let sorter = if options.has_sort() {
            Some(DocumentSorter::new(&options)?)
        } else {
            None
        };
        let transform = self.source().map(|source| source.transform()).unwrap_or_default();

        match packet {
            ChainPacket::SetData { data, .. } => match self.source() {
                Some(_) => self.refresh(),
                None => self.rebuild(data.clone()),
            },
            ChainPacket::Insert { data, .. } => {
                let matching = data
                    .iter()
                    .filter(|document| matcher.matches(document, BooleanMode::And))
                    .map(|document| transform.apply_out(document.clone()))
                    .collect();
                self.insert_sorted(matching, sorter.as_ref())
            }
            ChainPacket::Update {
                query,
                update,
                options,
                data,
                old_data,
            } => {
                let primary_key = self.data.primary_key();
                let mut replaced = Vec::new();
                let mut entered = Vec::new();
                let mut left = Vec::new();

                for (old, new) in old_data.iter().zip(data) {
                    let Some(key) = old.get(&primary_key).cloned() else {
                        continue;
                    };
                    match (self.data.contains_key(&key), matcher.matches(new, BooleanMode::And)) {
                        (true, true) => replaced.push((key, transform.apply_out(new.clone()))),
                        (true, false) => left.push(key),
                        (false, true) => entered.push(transform.apply_out(new.clone())),
                        (false, false) => {}
                    }
                }

                if !left.is_empty() {
                    self.data.remove_keys(&left, query)?;
                }
                if !replaced.is_empty() {
                    self.data.replace_documents(replaced, query, update, options)?;
                    if let Some(sorter) = &sorter {
                        self.resort(sorter)?;
                    }
                }
                self.insert_sorted(entered, sorter.as_ref())
            }
            ChainPacket::Remove { query, data } => {
                let keys: Vec<Value> = self
                    .data
                    .keys_of(data)
                    .into_iter()
                    .filter(|key| self.data.contains_key(key))
                    .collect();
                if !keys.is_empty() {
                    self.data.remove_keys(&keys, query)?;
                }
                Ok(())
            }
        }
    }

    fn insert_sorted(&self, documents: Vec<Document>, sorter: Option<&DocumentSorter>) -> RippleResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        match sorter {
            None => {
                self.data.insert_now(documents, None)?;
            }
            Some(sorter) => {
                let existing = self.data.data();
                let mut placed = 0;
                for document in sorter.sort(documents) {
                    let position = placed
                        + existing
                            .partition_point(|current| sorter.compare_documents(current, &document) != Ordering::Greater);
                    placed += self.data.insert_now(vec![document], Some(position))?.inserted().len();
                }
            }
        }
        Ok(())
    }

    fn resort(&self, sorter: &DocumentSorter) -> RippleResult<()> {
        let current = self.data.data();
        let in_order = current
            .windows(2)
            .all(|pair| sorter.compare_documents(&pair[0], &pair[1]) != Ordering::Greater);
        if !in_order {
            self.data.set_data_now(sorter.sort(current))?;
        }
        Ok(())
    }
}

impl ChainNode for ViewInner {
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
        log::debug!("View {} received {} from {}", self.name, packet, sender);
        self.apply(packet)
    }

    fn chain_data(&self) -> Option<Vec<Document>> {
        Some(self.data.data())
    }
}

impl EventAware for View {
    fn subscribe(&self, listener: CollectionEventListener) -> RippleResult<Option<SubscriberRef>> {
        self.inner.data.subscribe(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> RippleResult<()> {
        self.inner.data.unsubscribe(subscriber)
    }
}

impl Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View").field("name", &self.inner.name).finish()
    }
}
