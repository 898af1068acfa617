use crate::models::ExifData;
use moka::future::Cache;
use std::time::Duration;

/// EXIF responses per network photo id. The server never rewrites a photo's
/// EXIF, so entries only leave on capacity pressure or idle expiry.
#[derive(Clone)]
pub struct ExifCache {
    inner: Cache<i64, ExifData>,
}

impl ExifCache {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(Duration::from_secs(60 * 60 * 24))
            .eviction_listener(|id, _value, cause| {
                log::debug!("ExifCache: evicting photo {} ({:?})", id, cause);
            })
            .build();

        Self { inner: cache }
    }

    pub async fn get(&self, id: i64) -> Option<ExifData> {
        self.inner.get(&id).await
    }

    pub async fn insert(&self, id: i64, exif: ExifData) {
        self.inner.insert(id, exif).await;
    }

    pub async fn invalidate(&self, id: i64) {
        self.inner.invalidate(&id).await;
    }
}
