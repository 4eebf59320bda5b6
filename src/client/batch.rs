//! Chunked batch dispatch with bounded concurrency and fail-fast semantics.

// crates.io
use futures_util::future::try_join_all;
// self
use crate::{_prelude::*, client::ApiClient, http::ApiTransport};

impl<C> ApiClient<C>
where
	C: ?Sized + ApiTransport,
{
	/// Runs `operations` in order, dispatching them in chunks of
	/// [`batch_chunk_size`](crate::config::ClientConfig::batch_chunk_size) and
	/// returning their results in input order.
	///
	/// Chunk members run concurrently as detached tasks; the next chunk never
	/// starts before the current one fully settles. The first failure rejects
	/// the whole batch: later chunks are never invoked, and chunk mates that
	/// were already dispatched keep running with their results discarded.
	pub async fn batch<T, F, Fut>(&self, operations: Vec<F>) -> Result<Vec<T>>
	where
		T: 'static + Send,
		F: FnOnce() -> Fut,
		Fut: 'static + Future<Output = Result<T>> + Send,
	{
		let chunk_size = self.config.batch_chunk_size.max(1);
		let mut results = Vec::with_capacity(operations.len());
		let mut pending = operations.into_iter();

		loop {
			let chunk: Vec<_> = pending.by_ref().take(chunk_size).collect();

			if chunk.is_empty() {
				break;
			}

			let handles: Vec<_> = chunk.into_iter().map(|op| tokio::spawn(op())).collect();
			let settled = try_join_all(handles.into_iter().map(|handle| {
				async move { handle.await.map_err(|source| Error::Task { source })? }
			}))
			.await?;

			results.extend(settled);
		}

		Ok(results)
	}
}
