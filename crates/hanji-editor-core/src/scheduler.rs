//! Deferred, cancellable tasks and the caret repositioning built on them.
//!
//! On some mobile platforms IME composition finalizes asynchronously after
//! the key event, and an immediate caret move is overwritten by the platform's
//! own cleanup. The scheduler sets the caret after a short delay instead.
//! Every deferred action gets a `TaskToken` so teardown can cancel it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_util::future::{AbortHandle, LocalBoxFuture, abortable};

use crate::error::SurfaceError;
use crate::surface::{SurfaceLink, TextSurface};
use crate::types::Selection;

/// Runs `'static` futures on the current thread's event loop.
///
/// The browser uses `wasm_bindgen_futures::spawn_local`; native code uses
/// `TokioLocalSpawner` inside a `tokio::task::LocalSet`.
pub trait Spawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}

impl<T: Spawner + ?Sized> Spawner for Rc<T> {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        (**self).spawn_local(task)
    }
}

/// Spawner backed by `tokio::task::spawn_local`.
///
/// Must be used from within a `LocalSet`.
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLocalSpawner;

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
impl Spawner for TokioLocalSpawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        // Detached; cancellation goes through the AbortHandle, not the JoinHandle.
        drop(tokio::task::spawn_local(task));
    }
}

/// Handle to a deferred task, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken(u64);

impl TaskToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct TaskRegistry {
    next_id: u64,
    handles: HashMap<u64, AbortHandle>,
}

/// Registry of pending deferred tasks for one coordinator.
///
/// Tasks remove themselves when they finish; `cancel_all` aborts whatever is
/// still pending.
#[derive(Clone, Default)]
pub struct DeferredTasks {
    inner: Rc<RefCell<TaskRegistry>>,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` as an abortable deferred task.
    pub fn spawn<F>(&self, spawner: &dyn Spawner, task: F) -> TaskToken
    where
        F: Future<Output = ()> + 'static,
    {
        let (task, handle) = abortable(task);
        let id = {
            let mut registry = self.inner.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handles.insert(id, handle);
            id
        };

        let registry: Weak<RefCell<TaskRegistry>> = Rc::downgrade(&self.inner);
        spawner.spawn_local(Box::pin(async move {
            let outcome = task.await;
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().handles.remove(&id);
            }
            if outcome.is_err() {
                tracing::trace!(task = id, "deferred task aborted");
            }
        }));

        TaskToken(id)
    }

    /// Cancel one task. Returns false if it already finished or was cancelled.
    pub fn cancel(&self, token: TaskToken) -> bool {
        let handle = self.inner.borrow_mut().handles.remove(&token.0);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending task.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<AbortHandle> = self
            .inner
            .borrow_mut()
            .handles
            .drain()
            .map(|(_, h)| h)
            .collect();
        let count = handles.len();
        for handle in handles {
            handle.abort();
        }
        if count > 0 {
            tracing::debug!(count, "cancelled pending deferred tasks");
        }
        count
    }

    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.inner.borrow().handles.contains_key(&token.0)
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().handles.len()
    }
}

/// Moves the caret after a programmatic newline once the platform has
/// finished its own composition cleanup.
pub struct CursorScheduler<S> {
    link: SurfaceLink<S>,
    spawner: Rc<dyn Spawner>,
    tasks: DeferredTasks,
    pending: Cell<Option<TaskToken>>,
    restore_focus: bool,
}

impl<S: TextSurface + 'static> CursorScheduler<S> {
    pub(crate) fn new(
        link: SurfaceLink<S>,
        spawner: Rc<dyn Spawner>,
        tasks: DeferredTasks,
        restore_focus: bool,
    ) -> Self {
        Self {
            link,
            spawner,
            tasks,
            pending: Cell::new(None),
            restore_focus,
        }
    }

    /// After `delay`, place the caret at `target_offset + 1`.
    ///
    /// A newer call supersedes a pending one. The move is skipped if the
    /// surface length changed in the meantime (another edit landed) or the
    /// surface was torn down.
    pub fn schedule(&self, target_offset: usize, delay: Duration) -> TaskToken {
        if let Some(previous) = self.pending.take() {
            if self.tasks.cancel(previous) {
                tracing::debug!(task = previous.id(), "superseded pending caret move");
            }
        }

        let expected_len = self.link.with(|s| s.len_chars()).ok();
        let link = self.link.clone();
        let restore_focus = self.restore_focus;

        let token = self.tasks.spawn(&*self.spawner, async move {
            n0_future::time::sleep(delay).await;
            reposition(&link, target_offset, expected_len, restore_focus);
        });
        self.pending.set(Some(token));
        token
    }

    /// Cancel the pending move, if any.
    pub fn cancel(&self) -> bool {
        self.pending
            .take()
            .map(|token| self.tasks.cancel(token))
            .unwrap_or(false)
    }

    pub fn pending(&self) -> Option<TaskToken> {
        self.pending.get().filter(|t| self.tasks.is_pending(*t))
    }
}

fn reposition<S: TextSurface>(
    link: &SurfaceLink<S>,
    target_offset: usize,
    expected_len: Option<usize>,
    restore_focus: bool,
) {
    let result = link.with_mut(|surface| -> Result<(), SurfaceError> {
        let len = surface.len_chars();
        if expected_len.is_some_and(|expected| expected != len) {
            tracing::debug!(
                expected = ?expected_len,
                len,
                "surface changed since newline insertion, skipping caret move"
            );
            return Ok(());
        }
        let caret = (target_offset + 1).min(surface.end_offset());
        surface.set_selection(Selection::collapsed(caret))?;
        if restore_focus {
            surface.focus();
        }
        tracing::debug!(caret, "caret repositioned");
        Ok(())
    });

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "caret repositioning failed"),
        Err(e) => tracing::debug!(error = %e, "caret repositioning skipped"),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tokio::task::LocalSet;

    use super::*;
    use crate::document::RichDocument;
    use crate::formatting::Formatting;
    use crate::surface::{SharedSurface, TextSurface};

    type Setup = (
        SharedSurface<RichDocument>,
        Rc<Cell<bool>>,
        CursorScheduler<RichDocument>,
        DeferredTasks,
    );

    fn setup(text: &str) -> Setup {
        let doc = Rc::new(RefCell::new(RichDocument::from_text(text)));
        let mounted = Rc::new(Cell::new(true));
        let tasks = DeferredTasks::new();
        let scheduler = CursorScheduler::new(
            SurfaceLink::new(&doc, mounted.clone()),
            Rc::new(TokioLocalSpawner),
            tasks.clone(),
            true,
        );
        (doc, mounted, scheduler, tasks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_caret_after_delay() {
        LocalSet::new()
            .run_until(async {
                let (doc, _mounted, scheduler, tasks) = setup("hello\n");
                doc.borrow_mut()
                    .insert_text(5, "\n", &Formatting::plain())
                    .unwrap();

                scheduler.schedule(5, Duration::from_millis(50));
                assert_eq!(tasks.pending(), 1);

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(doc.borrow().selection(), None);

                tokio::time::sleep(Duration::from_millis(40)).await;
                assert_eq!(doc.borrow().selection(), Some(Selection::collapsed(6)));
                assert!(doc.borrow().is_focused());
                assert_eq!(tasks.pending(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_when_surface_changed() {
        LocalSet::new()
            .run_until(async {
                let (doc, _mounted, scheduler, _tasks) = setup("hello\n");
                scheduler.schedule(2, Duration::from_millis(30));
                doc.borrow_mut()
                    .insert_text(0, "x", &Formatting::plain())
                    .unwrap();

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(doc.borrow().selection(), None);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_after_unmount() {
        LocalSet::new()
            .run_until(async {
                let (doc, mounted, scheduler, _tasks) = setup("hello\n");
                scheduler.schedule(1, Duration::from_millis(10));
                mounted.set(false);

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(doc.borrow().selection(), None);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_schedule_supersedes() {
        LocalSet::new()
            .run_until(async {
                let (doc, _mounted, scheduler, tasks) = setup("abcdef\n");
                let first = scheduler.schedule(1, Duration::from_millis(30));
                let second = scheduler.schedule(3, Duration::from_millis(30));
                assert!(!tasks.is_pending(first));
                assert_eq!(scheduler.pending(), Some(second));

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(doc.borrow().selection(), Some(Selection::collapsed(4)));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        LocalSet::new()
            .run_until(async {
                let (doc, _mounted, scheduler, tasks) = setup("abc\n");
                scheduler.schedule(0, Duration::from_millis(30));
                assert_eq!(tasks.cancel_all(), 1);
                assert!(!scheduler.cancel());

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(doc.borrow().selection(), None);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_surface_is_skipped() {
        LocalSet::new()
            .run_until(async {
                let (doc, _mounted, scheduler, _tasks) = setup("abc\n");
                scheduler.schedule(0, Duration::from_millis(10));

                let held = doc.borrow();
                tokio::time::sleep(Duration::from_millis(30)).await;
                assert_eq!(held.selection(), None);
            })
            .await;
    }
}
