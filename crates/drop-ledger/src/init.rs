//! Memoized once-only initialization with waiters.

use std::future::Future;

use tokio::sync::OnceCell;

/// An asynchronously computed value that is produced at most once.
///
/// Callers that arrive while initialization is running wait for it instead
/// of starting their own. A failed initialization stores nothing, so the
/// next caller runs it again.
pub struct InitOnce<T> {
    cell: OnceCell<T>,
}

impl<T> InitOnce<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the stored value, running `init` if there is none yet.
    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(init).await.cloned()
    }
}

impl<T> Default for InitOnce<T>
where
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for InitOnce<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOnce")
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}
