//! REST document-store mirror for cloud mode.
//!
//! Writes from the record store are queued and delivered by a background
//! task (`POST /{collection}`, `PATCH /{collection}/{id}`,
//! `DELETE /{collection}/{id}`). Snapshots are fetched with
//! `GET /{collection}` on an interval and replace the store's collections
//! wholesale; the last snapshot wins.

use custody_engine::{CloudMirror, CollectionKind, Error as EngineError, RecordId, RecordStore};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

use crate::websocket::{ConnectionManager, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document store returned status {0}")]
    Status(u16),

    #[error("unreadable snapshot: {0}")]
    Decode(String),
}

/// A queued write.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorWrite {
    Add {
        collection: CollectionKind,
        id: RecordId,
        doc: Value,
    },
    Update {
        collection: CollectionKind,
        id: RecordId,
        fields: Value,
    },
    Delete {
        collection: CollectionKind,
        id: RecordId,
    },
}

/// The store-facing half: hands writes to the background writer.
#[derive(Debug, Clone)]
pub struct RestMirror {
    sender: mpsc::UnboundedSender<MirrorWrite>,
}

impl RestMirror {
    pub fn new(sender: mpsc::UnboundedSender<MirrorWrite>) -> Self {
        Self { sender }
    }

    fn enqueue(&self, write: MirrorWrite) -> custody_engine::Result<()> {
        self.sender
            .send(write)
            .map_err(|_| EngineError::Mirror("mirror writer stopped".into()))
    }
}

impl CloudMirror for RestMirror {
    fn add(&self, collection: CollectionKind, id: &RecordId, doc: Value) -> custody_engine::Result<()> {
        self.enqueue(MirrorWrite::Add {
            collection,
            id: id.clone(),
            doc,
        })
    }

    fn update(
        &self,
        collection: CollectionKind,
        id: &RecordId,
        fields: Value,
    ) -> custody_engine::Result<()> {
        self.enqueue(MirrorWrite::Update {
            collection,
            id: id.clone(),
            fields,
        })
    }

    fn delete(&self, collection: CollectionKind, id: &RecordId) -> custody_engine::Result<()> {
        self.enqueue(MirrorWrite::Delete {
            collection,
            id: id.clone(),
        })
    }
}

/// HTTP client for the document store.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base: String,
    timeout: Duration,
}

impl RestClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn collection_url(&self, collection: CollectionKind) -> String {
        format!("{}/{}", self.base, collection.as_str())
    }

    fn document_url(&self, collection: CollectionKind, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base,
            collection.as_str(),
            urlencoding::encode(id)
        )
    }

    pub async fn write(&self, write: &MirrorWrite) -> Result<(), CloudError> {
        let request = match write {
            MirrorWrite::Add {
                collection,
                id,
                doc,
            } => {
                let mut doc = doc.clone();
                if let Some(fields) = doc.as_object_mut() {
                    fields.insert("id".into(), Value::String(id.clone()));
                }
                self.client.post(self.collection_url(*collection)).json(&doc)
            }
            MirrorWrite::Update {
                collection,
                id,
                fields,
            } => self
                .client
                .patch(self.document_url(*collection, id))
                .json(fields),
            MirrorWrite::Delete { collection, id } => {
                self.client.delete(self.document_url(*collection, id))
            }
        };

        let response = request.timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Every document in a collection.
    pub async fn fetch<T: DeserializeOwned>(&self, collection: CollectionKind) -> Result<Vec<T>, CloudError> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let docs = body
            .get("documents")
            .cloned()
            .unwrap_or(body);
        serde_json::from_value(docs).map_err(|e| CloudError::Decode(e.to_string()))
    }
}

/// Deliver queued writes until every [`RestMirror`] is dropped.
pub fn spawn_writer(client: RestClient, mut receiver: mpsc::UnboundedReceiver<MirrorWrite>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(write) = receiver.recv().await {
            if let Err(e) = client.write(&write).await {
                tracing::warn!(?write, "cloud write failed: {}", e);
            }
        }
    })
}

/// Fetch every collection once and replace what changed.
///
/// Returns the collections that were replaced.
pub async fn refresh_snapshots(
    client: &RestClient,
    store: &Mutex<RecordStore>,
    notifier: &ConnectionManager,
) -> Result<Vec<CollectionKind>, CloudError> {
    // Fetch outside the lock
    let items = client.fetch(CollectionKind::Inventory).await?;
    let loans = client.fetch(CollectionKind::Loans).await?;
    let returns = client.fetch(CollectionKind::Returns).await?;

    let mut replaced = Vec::new();
    {
        let mut store = store.lock().await;
        if !same_members(store.items(), &items) {
            store.replace_items(items);
            replaced.push(CollectionKind::Inventory);
        }
        if !same_members(store.loans(), &loans) {
            store.replace_loans(loans);
            replaced.push(CollectionKind::Loans);
        }
        if !same_members(store.returns(), &returns) {
            store.replace_returns(returns);
            replaced.push(CollectionKind::Returns);
        }
    }

    for collection in &replaced {
        notifier.broadcast_all(ServerMessage::Snapshot {
            collection: *collection,
        });
    }
    Ok(replaced)
}

fn same_members<T: PartialEq>(current: &[T], incoming: &[T]) -> bool {
    current.len() == incoming.len() && incoming.iter().all(|doc| current.contains(doc))
}

/// Poll snapshots until `stop` flips to true.
pub fn spawn_snapshot_poller(
    client: RestClient,
    store: Arc<Mutex<RecordStore>>,
    notifier: Arc<ConnectionManager>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match refresh_snapshots(&client, &store, &notifier).await {
                Ok(replaced) if !replaced.is_empty() => {
                    tracing::debug!(?replaced, "cloud snapshot applied");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("cloud snapshot failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        routing::{get, patch},
        Json, Router,
    };
    use custody_engine::{ItemPatch, MemoryStorage, NewItem, StoreMode};
    use std::collections::HashMap;

    type Docs = Arc<std::sync::Mutex<HashMap<String, Vec<Value>>>>;

    async fn list(State(docs): State<Docs>, Path(collection): Path<String>) -> Json<Value> {
        let docs = docs.lock().unwrap();
        Json(Value::Array(docs.get(&collection).cloned().unwrap_or_default()))
    }

    async fn create(
        State(docs): State<Docs>,
        Path(collection): Path<String>,
        Json(doc): Json<Value>,
    ) -> Json<Value> {
        docs.lock().unwrap().entry(collection).or_default().push(doc);
        Json(serde_json::json!({"ok": true}))
    }

    async fn update(
        State(docs): State<Docs>,
        Path((collection, id)): Path<(String, String)>,
        Json(fields): Json<Value>,
    ) -> Json<Value> {
        let mut docs = docs.lock().unwrap();
        for doc in docs.entry(collection).or_default().iter_mut() {
            if doc["id"] == id.as_str() {
                if let (Some(target), Some(fields)) = (doc.as_object_mut(), fields.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        Json(serde_json::json!({"ok": true}))
    }

    async fn remove(
        State(docs): State<Docs>,
        Path((collection, id)): Path<(String, String)>,
    ) -> Json<Value> {
        docs.lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .retain(|doc| doc["id"] != id.as_str());
        Json(serde_json::json!({"ok": true}))
    }

    async fn serve() -> String {
        let docs: Docs = Arc::default();
        let app = Router::new()
            .route("/{collection}", get(list).post(create))
            .route("/{collection}/{id}", patch(update).delete(remove))
            .with_state(docs);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn settle(client: &RestClient, store: &Mutex<RecordStore>, notifier: &ConnectionManager) {
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let _ = refresh_snapshots(client, store, notifier).await;
        }
    }

    #[tokio::test]
    async fn writes_round_trip_through_snapshots() {
        let base = serve().await;
        let client = RestClient::new(&base, Duration::from_secs(2));
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_writer(client.clone(), rx);

        let store = Mutex::new(RecordStore::new(
            Box::new(MemoryStorage::new()),
            StoreMode::Cloud(Box::new(RestMirror::new(tx))),
        ));
        let notifier = ConnectionManager::new();

        let item = store
            .lock()
            .await
            .add_item(NewItem::new("Drill", 4, 4), 1000)
            .unwrap();
        assert!(store.lock().await.items().is_empty());

        settle(&client, &store, &notifier).await;
        assert_eq!(store.lock().await.items().len(), 1);

        store
            .lock()
            .await
            .update_item(
                &item.id,
                ItemPatch {
                    total_qty: Some(6),
                    ..Default::default()
                },
                2000,
            )
            .unwrap();
        settle(&client, &store, &notifier).await;
        assert_eq!(store.lock().await.items()[0].total_qty, 6);

        store.lock().await.delete_item(&item.id, 3000).unwrap();
        settle(&client, &store, &notifier).await;
        assert!(store.lock().await.items().is_empty());
    }

    #[test]
    fn closed_writer_is_a_mirror_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mirror = RestMirror::new(tx);
        let err = mirror
            .delete(CollectionKind::Loans, &"l1".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::Mirror(_)));
    }

    #[test]
    fn document_urls() {
        let client = RestClient::new("http://docs/api/", Duration::from_secs(1));
        assert_eq!(client.collection_url(CollectionKind::Returns), "http://docs/api/returns");
        assert_eq!(
            client.document_url(CollectionKind::Inventory, "item 1"),
            "http://docs/api/inventory/item%201"
        );
    }
}
