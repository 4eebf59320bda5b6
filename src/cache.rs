//! Read deduplication and short-lived result caching.
//!
//! Concurrent reads for the same `(method, path, params)` key share a single
//! in-flight transport call, and settled results linger briefly so
//! near-simultaneous duplicates are absorbed without refetching. Two timers
//! bound every entry: a TTL scheduled at insertion and a grace period scheduled
//! at settlement; whichever fires first evicts the entry, and the TTL bounds the
//! worst-case lifetime of an entry whose request never settles. Mutations evict
//! by path-segment prefix, so invalidating `/api/leads/` busts `/api/leads/123`
//! but never `/api/leadsextra`.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures_util::{FutureExt, future::Shared};
// self
use crate::{_prelude::*, http::Method};

/// Outcome shared between every caller collapsed onto one read: the parsed JSON
/// body, or the error all of them observe.
pub(crate) type SharedResult = Result<Value, Arc<Error>>;
/// Boxed read computation before it is made shareable.
pub(crate) type ReadFuture = Pin<Box<dyn Future<Output = SharedResult> + Send>>;
/// Cloneable handle on an in-flight or settled read.
pub(crate) type SharedRead = Shared<ReadFuture>;

/// Unique key identifying a cached read.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
	/// HTTP method component.
	pub method: Method,
	/// Normalized request path, query excluded.
	pub path: String,
	/// JSON fingerprint of the query parameters. Parameters are kept in an
	/// ordered map, so identical sets fingerprint identically regardless of the
	/// order callers supplied them in.
	pub params: String,
}
impl CacheKey {
	/// Builds a key from a method, request path, and query parameters.
	pub fn new(method: Method, path: &str, params: &BTreeMap<String, String>) -> Self {
		Self {
			method,
			path: normalize_path(path),
			params: serde_json::to_string(params).unwrap_or_default(),
		}
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}:{}", self.method, self.path, self.params)
	}
}

/// Strips query/fragment suffixes and collapses separators into one canonical
/// `/segment/segment` form with no trailing slash.
pub(crate) fn normalize_path(path: &str) -> String {
	let trimmed = path.split(['?', '#']).next().unwrap_or_default();
	let mut normalized = String::from("/");

	for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
		if normalized.len() > 1 {
			normalized.push('/');
		}

		normalized.push_str(segment);
	}

	normalized
}

/// True when `candidate` equals `target` or lives underneath it, compared per
/// whole path segment.
fn is_path_prefix(target: &str, candidate: &str) -> bool {
	let target: Vec<_> = target.split('/').filter(|s| !s.is_empty()).collect();
	let candidate: Vec<_> = candidate.split('/').filter(|s| !s.is_empty()).collect();

	candidate.len() >= target.len() && candidate[..target.len()] == target[..]
}

struct CacheSlot {
	generation: u64,
	read: SharedRead,
}

/// Deduplicating read cache owned by a client instance.
///
/// The map and its timers are shared mutable state; every lookup-plus-insert
/// happens under one lock acquisition with no await in between, so two
/// concurrent callers can never both observe a miss for the same key. Eviction
/// timers carry the generation their entry was inserted with and refuse to
/// evict anything newer, which keeps late timers harmless across `clear` and
/// reinsertion.
#[derive(Clone, Default)]
pub(crate) struct RequestCache {
	entries: Arc<Mutex<HashMap<CacheKey, CacheSlot>>>,
	generation: Arc<AtomicU64>,
}
impl RequestCache {
	/// Returns the shared read for `key`, creating it from `make` on a miss.
	/// The boolean is true on a hit.
	///
	/// Must run inside a tokio runtime: misses spawn the entry's TTL evictor and
	/// a driver task that polls the read to completion even if every caller
	/// drops, then holds the settled entry for the grace period.
	pub(crate) fn get_or_insert_with<F>(
		&self,
		key: CacheKey,
		ttl: Duration,
		grace: Duration,
		make: F,
	) -> (SharedRead, bool)
	where
		F: FnOnce() -> ReadFuture,
	{
		let mut entries = self.entries.lock();

		if let Some(slot) = entries.get(&key) {
			return (slot.read.clone(), true);
		}

		let generation = self.generation.fetch_add(1, Ordering::Relaxed);
		let read = make().shared();

		entries.insert(key.clone(), CacheSlot { generation, read: read.clone() });
		drop(entries);

		self.spawn_ttl_evictor(key.clone(), generation, ttl);
		self.spawn_driver(key, generation, grace, read.clone());

		(read, false)
	}

	fn spawn_ttl_evictor(&self, key: CacheKey, generation: u64, ttl: Duration) {
		let cache = self.clone();

		tokio::spawn(async move {
			tokio::time::sleep(ttl).await;
			cache.evict_if_current(&key, generation);
		});
	}

	fn spawn_driver(&self, key: CacheKey, generation: u64, grace: Duration, read: SharedRead) {
		let cache = self.clone();

		tokio::spawn(async move {
			let _ = read.await;

			tokio::time::sleep(grace).await;
			cache.evict_if_current(&key, generation);
		});
	}

	fn evict_if_current(&self, key: &CacheKey, generation: u64) {
		let mut entries = self.entries.lock();

		if entries.get(key).is_some_and(|slot| slot.generation == generation) {
			entries.remove(key);
		}
	}

	/// Removes every entry whose path is `path` or a descendant of it, returning
	/// the eviction count.
	pub(crate) fn invalidate_path(&self, path: &str) -> usize {
		let target = normalize_path(path);
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|key, _| !is_path_prefix(&target, &key.path));

		let evicted = before - entries.len();

		#[cfg(feature = "tracing")]
		if evicted > 0 {
			tracing::debug!(path = %target, evicted, "Invalidated cached reads.");
		}

		evicted
	}

	/// Drops every entry. Outstanding timers become no-ops through their
	/// generation guards.
	pub(crate) fn clear(&self) {
		self.entries.lock().clear();
	}

	#[cfg(test)]
	pub(crate) fn contains(&self, key: &CacheKey) -> bool {
		self.entries.lock().contains_key(key)
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.entries.lock().len()
	}
}
impl Debug for RequestCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestCache").field("entries", &self.entries.lock().len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ready_read(value: Value) -> ReadFuture {
		Box::pin(async move { Ok(value) })
	}

	fn key(path: &str) -> CacheKey {
		CacheKey::new(Method::Get, path, &BTreeMap::new())
	}

	#[test]
	fn keys_normalize_paths_and_order_params() {
		let mut forward = BTreeMap::new();

		forward.insert("page".to_owned(), "2".to_owned());
		forward.insert("role".to_owned(), "admin".to_owned());

		let mut reversed = BTreeMap::new();

		reversed.insert("role".to_owned(), "admin".to_owned());
		reversed.insert("page".to_owned(), "2".to_owned());

		let a = CacheKey::new(Method::Get, "/api/users/", &forward);
		let b = CacheKey::new(Method::Get, "/api/users?ignored=1", &reversed);

		assert_eq!(a, b);
		assert_eq!(a.path, "/api/users");
	}

	#[test]
	fn path_prefix_matches_whole_segments_only() {
		assert!(is_path_prefix("/api/leads", "/api/leads"));
		assert!(is_path_prefix("/api/leads", "/api/leads/123"));
		assert!(!is_path_prefix("/api/leads", "/api/leadsextra"));
		assert!(!is_path_prefix("/api/leads", "/api"));
	}

	#[tokio::test(start_paused = true)]
	async fn hit_returns_the_same_shared_read() {
		let cache = RequestCache::default();
		let ttl = Duration::from_millis(5_000);
		let grace = Duration::from_millis(1_000);
		let (first, hit_first) = cache.get_or_insert_with(key("/api/users/"), ttl, grace, || {
			ready_read(Value::from(1))
		});
		let (second, hit_second) = cache.get_or_insert_with(key("/api/users"), ttl, grace, || {
			ready_read(Value::from(2))
		});

		assert!(!hit_first);
		assert!(hit_second);
		assert_eq!(first.await.expect("First read should resolve."), Value::from(1));
		assert_eq!(second.await.expect("Second read should reuse the first."), Value::from(1));
	}

	#[tokio::test(start_paused = true)]
	async fn settled_entries_are_evicted_after_the_grace_period() {
		let cache = RequestCache::default();
		let ttl = Duration::from_millis(5_000);
		let grace = Duration::from_millis(1_000);
		let (read, _) =
			cache.get_or_insert_with(key("/api/tasks/"), ttl, grace, || ready_read(Value::Null));
		let _ = read.await;

		tokio::time::sleep(Duration::from_millis(900)).await;

		assert!(cache.contains(&key("/api/tasks/")));

		tokio::time::sleep(Duration::from_millis(200)).await;

		assert!(!cache.contains(&key("/api/tasks/")));
	}

	#[tokio::test(start_paused = true)]
	async fn ttl_bounds_entries_that_never_settle() {
		let cache = RequestCache::default();
		let ttl = Duration::from_millis(5_000);
		let grace = Duration::from_millis(1_000);
		let (_read, _) = cache.get_or_insert_with(key("/api/slow/"), ttl, grace, || {
			Box::pin(async {
				tokio::time::sleep(Duration::from_secs(3_600)).await;

				Ok(Value::Null)
			})
		});

		tokio::time::sleep(Duration::from_millis(4_900)).await;

		assert!(cache.contains(&key("/api/slow/")));

		tokio::time::sleep(Duration::from_millis(200)).await;

		assert!(!cache.contains(&key("/api/slow/")));
	}

	#[tokio::test(start_paused = true)]
	async fn stale_timers_never_evict_newer_entries() {
		let cache = RequestCache::default();
		let ttl = Duration::from_millis(5_000);
		let grace = Duration::from_millis(1_000);
		let (read, _) =
			cache.get_or_insert_with(key("/api/users/"), ttl, grace, || ready_read(Value::Null));
		let _ = read.await;

		cache.clear();

		// Reinsert under the same key with a long-pending read; the first
		// entry's grace timer fires in the meantime and must leave it alone.
		let (_read, hit) = cache.get_or_insert_with(key("/api/users/"), ttl, grace, || {
			Box::pin(async {
				tokio::time::sleep(Duration::from_millis(4_000)).await;

				Ok(Value::from(7))
			})
		});

		assert!(!hit);

		tokio::time::sleep(Duration::from_millis(2_000)).await;

		assert!(cache.contains(&key("/api/users/")));
	}

	#[tokio::test(start_paused = true)]
	async fn invalidation_is_prefix_scoped() {
		let cache = RequestCache::default();
		let ttl = Duration::from_millis(5_000);
		let grace = Duration::from_millis(1_000);

		for path in ["/api/leads/", "/api/leads/123", "/api/leadsextra", "/api/users/"] {
			let (read, _) =
				cache.get_or_insert_with(key(path), ttl, grace, || ready_read(Value::Null));
			let _ = read.await;
		}

		assert_eq!(cache.invalidate_path("/api/leads/"), 2);
		assert!(!cache.contains(&key("/api/leads/")));
		assert!(!cache.contains(&key("/api/leads/123")));
		assert!(cache.contains(&key("/api/leadsextra")));
		assert!(cache.contains(&key("/api/users/")));

		cache.clear();

		assert_eq!(cache.len(), 0);
	}
}
