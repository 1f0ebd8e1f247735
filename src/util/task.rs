use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Run `future`, turning a panic inside it into `Err(message)`.
///
/// ```ignore
/// match catch_task_panic(handle.refresh()).await {
///     Ok(()) => println!("refreshed"),
///     Err(panic_msg) => tracing::error!(error = %panic_msg, "Refresh panicked"),
/// }
/// ```
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    })
}
