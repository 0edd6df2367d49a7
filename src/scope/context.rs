use std::future::Future;

use tokio::runtime::Handle;
use tokio_util::task::AbortOnDropHandle;

use crate::error::TaskError;
use crate::subscribers::panic_message;

/// Runs `fut` on another runtime (pool) and returns its result here.
///
/// The computation is aborted if the caller stops waiting (e.g. its task is
/// cancelled). A panic on the other pool surfaces as [`TaskError::Panicked`].
///
/// ```rust,no_run
/// use scopekit::with_context;
///
/// # async fn demo(pool: &tokio::runtime::Runtime) -> Result<(), scopekit::TaskError> {
/// // `pool` built once at startup with `Config::build_pool`
/// let name = with_context(pool.handle(), async {
///     std::thread::current().name().map(str::to_owned)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_context<T, Fut>(handle: &Handle, fut: Fut) -> Result<T, TaskError>
where
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    AbortOnDropHandle::new(handle.spawn(fut))
        .await
        .map_err(|err| {
            if err.is_cancelled() {
                TaskError::Canceled
            } else {
                match err.try_into_panic() {
                    Ok(panic) => TaskError::Panicked {
                        info: panic_message(&*panic),
                    },
                    Err(err) => TaskError::fail(err.to_string()),
                }
            }
        })
}
