use std::future::Future;
use std::time::Duration;

use ragfuse_core::error::{Error, Result};

/// Await `fut`, or fail with `on_timeout()` once `limit` elapses. `None` waits forever.
pub async fn bounded<T, F>(limit: Option<Duration>, fut: F, on_timeout: impl FnOnce() -> Error) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| on_timeout())?,
        None => fut.await,
    }
}
