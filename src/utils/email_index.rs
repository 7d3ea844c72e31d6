use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use autoscale_cuckoo_filter::CuckooFilter;
use moka::future::Cache;
use tracing::info;

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Registered emails, answered from memory before the store is asked.
///
/// The cuckoo filter gives fast negatives (an email it has never seen is
/// certainly free); the cache gives fast positives. Anything in between
/// falls through to the store, which stays authoritative through its
/// unique key.
pub struct EmailIndex {
    filter: RwLock<CuckooFilter<String>>,
    taken: Cache<String, ()>,
}

impl Default for EmailIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl EmailIndex {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// False positives possible, false negatives not.
    pub fn might_exist(&self, email: &str) -> bool {
        let email = normalize(email);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&email)
    }

    pub async fn is_taken(&self, email: &str) -> bool {
        self.taken.get(&normalize(email)).await.is_some()
    }

    pub async fn insert(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&email);
        self.taken.insert(email, ()).await;
    }

    pub async fn remove(&self, email: &str) {
        let email = normalize(email);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&email);
        self.taken.invalidate(&email).await;
    }

    /// Loads every known email in batches.
    pub async fn warm_up(&self, emails: Vec<String>, batch_size: usize) {
        let total = emails.len();
        for batch in emails.chunks(batch_size.max(1)) {
            {
                let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
                for email in batch {
                    filter.add(&normalize(email));
                }
            }
            let inserts = batch.iter().map(|email| self.taken.insert(normalize(email), ()));
            futures::future::join_all(inserts).await;
        }
        info!(total, "Email index warmup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn insert_then_remove() {
        let index = EmailIndex::new();
        assert!(!index.might_exist("a@x.com"));

        index.insert("A@X.com").await;
        assert!(index.might_exist("a@x.com"));
        assert!(index.is_taken("a@x.com").await);

        index.remove("a@x.com").await;
        assert!(!index.is_taken("a@x.com").await);
    }

    #[actix_web::test]
    async fn warm_up_loads_all_batches() {
        let index = EmailIndex::new();
        let emails: Vec<String> = (0..7).map(|i| format!("u{i}@x.com")).collect();
        index.warm_up(emails, 3).await;
        assert!(index.is_taken("u6@x.com").await);
        assert!(index.might_exist("u0@x.com"));
    }
}
