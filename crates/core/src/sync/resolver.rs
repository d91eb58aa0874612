//! Item resolution backed by a per-company cache

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use koppeling_domain::types::exact::Item;
use koppeling_domain::ApiResult;
use tokio::sync::Mutex;
use tracing::debug;

use super::ports::{ExactApi, ItemResolver};

/// Caches items seen during product sync and falls back to Exact Online.
pub struct CachingItemResolver {
    exact: Arc<dyn ExactApi>,
    division: i64,
    cache: Mutex<HashMap<i64, Item>>,
}

impl CachingItemResolver {
    pub fn new(exact: Arc<dyn ExactApi>, division: i64) -> Self {
        Self { exact, division, cache: Mutex::new(HashMap::new()) }
    }

    /// Remember the item backing `product_id`.
    pub async fn seed(&self, product_id: i64, item: Item) {
        self.cache.lock().await.insert(product_id, item);
    }
}

#[async_trait]
impl ItemResolver for CachingItemResolver {
    async fn resolve(&self, product_id: i64) -> ApiResult<Item> {
        if let Some(item) = self.cache.lock().await.get(&product_id) {
            return Ok(item.clone());
        }

        debug!(product = product_id, division = self.division, "Item cache miss");
        let item = self.exact.find_item_by_external_key(self.division, product_id).await?;
        self.seed(product_id, item.clone()).await;
        Ok(item)
    }
}
