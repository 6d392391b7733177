// Bounded fan-out: run one future per item with at most `limit` in flight.

use std::future::Future;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Drive `f` over `items` concurrently, holding a semaphore permit around
/// each call. Results come back in input order. The semaphore lives only
/// for this call.
pub async fn for_each_bounded<T, R, F, Fut>(items: impl IntoIterator<Item = T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;
    let f = &f;

    join_all(items.into_iter().map(|item| async move {
        // The semaphore is never closed, so acquisition cannot fail.
        let _permit = semaphore.acquire().await.ok();
        f(item).await
    }))
    .await
}
