use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use rubrunner_core::types::Order;

/// File-backed order store holding a single JSON array of orders.
///
/// Every append reads the whole collection, pushes the new order and
/// rewrites the file. An in-process lock serializes appends so two
/// concurrent webhook deliveries cannot drop each other's order in the
/// read-modify-write cycle; writers in other processes are not coordinated
/// and still race last-writer-wins.
#[derive(Clone)]
pub struct OrderStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Appends one order to the end of the stored collection.
    ///
    /// A missing or unreadable store is treated as an empty collection, so
    /// the first order ever recorded creates the file. The rewrite goes
    /// through a sibling temp file and a rename, leaving either the old or
    /// the new collection on disk after a crash.
    pub async fn append(&self, order: &Order) -> Result<(), OrderStoreError> {
        let _guard = self.inner.write_lock.lock().await;

        let mut orders = self.read_collection().await;
        orders.push(order.clone());
        let body = serde_json::to_vec_pretty(&orders)?;

        let tmp = self.inner.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(OrderStoreError::Write)?;
        tokio::fs::rename(&tmp, &self.inner.path)
            .await
            .map_err(OrderStoreError::Write)?;
        Ok(())
    }

    /// Returns the currently persisted collection, empty when the store
    /// file is missing or unreadable.
    pub async fn load(&self) -> Vec<Order> {
        let _guard = self.inner.write_lock.lock().await;
        self.read_collection().await
    }

    async fn read_collection(&self) -> Vec<Order> {
        let bytes = match tokio::fs::read(&self.inner.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(
                    stage = "storage",
                    path = %self.inner.path.display(),
                    error = %err,
                    "order store unreadable, treating as empty"
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(orders) => orders,
            Err(err) => {
                warn!(
                    stage = "storage",
                    path = %self.inner.path.display(),
                    error = %err,
                    "order store is not a valid order array, treating as empty"
                );
                Vec::new()
            }
        }
    }
}

/// Errors surfaced by [`OrderStore::append`].
///
/// Callers on the webhook path log these and still acknowledge the
/// delivery; a recording failure must not make the processor redeliver.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("failed to encode order collection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write order store: {0}")]
    Write(io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    fn order(id: &str, amount_total: i64, email: Option<&str>) -> Order {
        let recorded_at: DateTime<Utc> = "2026-02-01T12:00:00Z".parse().expect("timestamp");
        Order {
            id: id.to_string(),
            amount_total,
            customer_email: email.map(str::to_string),
            recorded_at,
        }
    }

    #[tokio::test]
    async fn first_append_creates_one_element_collection() {
        let dir = tempdir().expect("tempdir");
        let store = OrderStore::new(dir.path().join("orders.json"));

        store
            .append(&order("cs_123", 2599, Some("a@b.com")))
            .await
            .expect("append");

        let orders = store.load().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "cs_123");
        assert_eq!(orders[0].amount_total, 2599);
        assert_eq!(orders[0].customer_email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn appends_preserve_order_of_receipt() {
        let dir = tempdir().expect("tempdir");
        let store = OrderStore::new(dir.path().join("orders.json"));

        store.append(&order("cs_1", 100, None)).await.expect("append");
        store.append(&order("cs_2", 200, None)).await.expect("append");

        let orders = store.load().await;
        assert_eq!(
            orders.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            vec!["cs_1", "cs_2"]
        );
    }

    #[tokio::test]
    async fn redelivered_order_is_stored_twice() {
        // At-least-once delivery upstream: no deduplication happens here,
        // the same session id may legally appear more than once.
        let dir = tempdir().expect("tempdir");
        let store = OrderStore::new(dir.path().join("orders.json"));
        let duplicate = order("cs_dup", 999, Some("a@b.com"));

        store.append(&duplicate).await.expect("first delivery");
        store.append(&duplicate).await.expect("redelivery");

        let orders = store.load().await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, orders[1].id);
    }

    #[tokio::test]
    async fn garbage_store_is_treated_as_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("orders.json");
        std::fs::write(&path, b"not json at all").expect("seed garbage");

        let store = OrderStore::new(&path);
        store.append(&order("cs_after", 100, None)).await.expect("append");

        let orders = store.load().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "cs_after");
    }

    #[tokio::test]
    async fn load_of_missing_file_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = OrderStore::new(dir.path().join("orders.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let dir = tempdir().expect("tempdir");
        let store = OrderStore::new(dir.path().join("orders.json"));

        let mut handles = Vec::new();
        for index in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(&order(&format!("cs_{index}"), 100, None))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("append");
        }

        assert_eq!(store.load().await.len(), 8);
    }
}
