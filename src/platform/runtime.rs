use std::future::Future;
use std::time::Duration;

/// Runs `future` in the background; nothing observes its completion.
#[cfg(target_arch = "wasm32")]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Runs `future` in the background; nothing observes its completion.
///
/// Uses the ambient tokio runtime when there is one, otherwise a lazily built single-worker
/// runtime owned by this module.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use std::sync::LazyLock;
    use tokio::runtime::{Builder, Handle, Runtime};

    static BACKGROUND_RUNTIME: LazyLock<Option<Runtime>> = LazyLock::new(|| {
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ga-provider-background")
            .enable_all()
            .build()
            .map_err(|err| log::error!("failed to build background tokio runtime: {err}"))
            .ok()
    });

    if let Ok(handle) = Handle::try_current() {
        handle.spawn(future);
    } else if let Some(runtime) = BACKGROUND_RUNTIME.as_ref() {
        let _ = runtime.spawn(future);
    }
}

pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    sleep_impl(duration).await;
}

#[cfg(target_arch = "wasm32")]
async fn sleep_impl(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep_impl(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(flavor = "current_thread")]
    async fn detached_task_runs_on_ambient_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn_detached(async move {
            flag.store(true, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(5)).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
