//! Per-surface coordinator wiring composition tracking, Enter interception,
//! caret repositioning and image insertion to one mounted surface.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::composition::CompositionTracker;
use crate::config::GuardConfig;
use crate::enter::{EnterAction, EnterPolicy};
use crate::error::{ConfigError, ImageError, SurfaceError};
use crate::image::{FilePicker, ImageBatch, ImagePipeline, ImageSource, Notifier};
use crate::platform::Platform;
use crate::scheduler::{CursorScheduler, DeferredTasks, Spawner};
use crate::surface::{SharedSurface, SurfaceLink, TextSurface};
use crate::types::{Key, KeyEvent};

/// Input coordination for one mounted surface.
///
/// Created when the surface mounts and torn down with `unmount` (or drop).
/// Every method takes `&self` so host event handlers can share it through
/// an `Rc`.
pub struct InputCoordinator<S: TextSurface + 'static> {
    surface: SharedSurface<S>,
    config: GuardConfig,
    platform: Platform,
    composition: RefCell<CompositionTracker>,
    enter: EnterPolicy,
    scheduler: CursorScheduler<S>,
    images: ImagePipeline<S>,
    tasks: DeferredTasks,
    mounted: Rc<Cell<bool>>,
}

impl<S: TextSurface + 'static> InputCoordinator<S> {
    /// Attach to `surface`. Fails only if `config` is invalid.
    pub fn mount(
        surface: SharedSurface<S>,
        config: GuardConfig,
        platform: Platform,
        spawner: Rc<dyn Spawner>,
        notifier: Rc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mounted = Rc::new(Cell::new(true));
        let tasks = DeferredTasks::new();
        let link = SurfaceLink::new(&surface, mounted.clone());
        let enter = EnterPolicy::new(&config, &platform);
        let scheduler = CursorScheduler::new(
            link.clone(),
            spawner.clone(),
            tasks.clone(),
            config.restore_focus,
        );
        let images = ImagePipeline::new(
            link,
            spawner,
            tasks.clone(),
            notifier,
            config.max_images,
            config.allow_multiple,
        );

        tracing::debug!(
            enter_active = enter.is_active(),
            delay_ms = config.reposition_delay_ms,
            max_images = ?config.max_images,
            "input coordinator mounted"
        );

        Ok(Self {
            surface,
            config,
            platform,
            composition: RefCell::new(CompositionTracker::new()),
            enter,
            scheduler,
            images,
            tasks,
            mounted,
        })
    }

    pub fn on_composition_start(&self) {
        if self.is_mounted() {
            self.composition.borrow_mut().on_composition_start();
        }
    }

    pub fn on_composition_update(&self, data: &str) {
        if self.is_mounted() {
            self.composition.borrow_mut().on_composition_update(data);
        }
    }

    pub fn on_composition_end(&self) {
        self.composition.borrow_mut().on_composition_end();
    }

    /// Focus left the surface; any composition in progress is abandoned.
    pub fn on_blur(&self) {
        let mut composition = self.composition.borrow_mut();
        if composition.is_composing() {
            tracing::debug!("blur during composition - cancelling");
            composition.cancel();
        }
    }

    /// Route a keydown. Escape cancels composition; Enter goes through
    /// `on_enter_key`.
    pub fn on_key_down(&self, event: &KeyEvent) -> EnterAction {
        match event.key {
            Key::Enter => self.on_enter_key(event),
            Key::Escape => {
                let mut composition = self.composition.borrow_mut();
                if composition.is_composing() {
                    tracing::debug!("escape during composition - cancelling");
                    composition.cancel();
                }
                EnterAction::Default
            }
            _ => EnterAction::Default,
        }
    }

    /// Handle an Enter press.
    ///
    /// When intercepted, the newline is already inserted and a caret move is
    /// scheduled by the time this returns `Suppress`; the caller must then
    /// prevent the surface's default handling. Never returns
    /// `InsertNewlineManually`.
    pub fn on_enter_key(&self, event: &KeyEvent) -> EnterAction {
        if !self.is_mounted() {
            return EnterAction::Default;
        }

        let action = {
            let composition = self.composition.borrow();
            self.enter.classify(&composition, event, || {
                self.surface.try_borrow().ok().and_then(|s| s.selection())
            })
        };

        let EnterAction::InsertNewlineManually { offset } = action else {
            return action;
        };

        match self.insert_newline(offset) {
            Ok(()) => {
                self.scheduler
                    .schedule(offset, self.config.reposition_delay());
                tracing::debug!(offset, shift = event.shift, "newline inserted manually");
                EnterAction::Suppress
            }
            Err(e) => {
                tracing::warn!(offset, error = %e, "manual newline rejected - delegating to surface");
                EnterAction::Default
            }
        }
    }

    fn insert_newline(&self, offset: usize) -> Result<(), SurfaceError> {
        let mut surface = self
            .surface
            .try_borrow_mut()
            .map_err(|_| SurfaceError::Busy)?;
        let formatting = surface.format_at(offset);
        surface.insert_text(offset, "\n", &formatting)
    }

    /// Open `picker` and insert the chosen images.
    pub async fn select_and_insert_images<P: FilePicker>(
        &self,
        picker: &P,
    ) -> Result<ImageBatch, ImageError> {
        if !self.is_mounted() {
            return Ok(ImageBatch::default());
        }
        self.images.select_and_insert(picker).await
    }

    /// Insert files the host already has (drop, paste, a picker it drove).
    pub fn insert_images<F: ImageSource>(&self, files: Vec<F>) -> Result<ImageBatch, ImageError> {
        if !self.is_mounted() {
            return Ok(ImageBatch::default());
        }
        self.images.insert_files(files)
    }

    /// Detach from the surface. Pending deferred work is cancelled and any
    /// that still runs does nothing. Safe to call more than once.
    pub fn unmount(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        self.composition.borrow_mut().cancel();
        let cancelled = self.tasks.cancel_all();
        tracing::debug!(cancelled, "input coordinator unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub fn is_composing(&self) -> bool {
        self.composition.borrow().is_composing()
    }

    /// Number of deferred tasks (caret moves, image reads) still pending.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    pub fn surface(&self) -> &SharedSurface<S> {
        &self.surface
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn scheduler(&self) -> &CursorScheduler<S> {
        &self.scheduler
    }
}

impl<S: TextSurface + 'static> Drop for InputCoordinator<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::task::LocalSet;

    use super::*;
    use crate::config::EnterWorkaround;
    use crate::document::RichDocument;
    use crate::formatting::{FormatCommand, Formatting};
    use crate::image::{MemoryImage, PickRequest};
    use crate::scheduler::TokioLocalSpawner;
    use crate::types::Selection;

    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

    #[derive(Default)]
    struct RecordingNotifier {
        warnings: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn warn(&self, message: &str) {
            self.warnings.borrow_mut().push(message.to_string());
        }
    }

    struct FixedPicker {
        files: Vec<MemoryImage>,
        requests: RefCell<Vec<PickRequest>>,
    }

    impl FilePicker for FixedPicker {
        type File = MemoryImage;

        async fn pick(&self, request: PickRequest) -> Result<Vec<MemoryImage>, ImageError> {
            self.requests.borrow_mut().push(request);
            Ok(self.files.clone())
        }
    }

    struct Harness {
        doc: SharedSurface<RichDocument>,
        notifier: Rc<RecordingNotifier>,
        coordinator: InputCoordinator<RichDocument>,
    }

    fn harness(text: &str, config: GuardConfig) -> Harness {
        let doc = Rc::new(RefCell::new(RichDocument::from_text(text)));
        let notifier = Rc::new(RecordingNotifier::default());
        let coordinator = InputCoordinator::mount(
            doc.clone(),
            config,
            Platform::ios_safari(),
            Rc::new(TokioLocalSpawner),
            notifier.clone(),
        )
        .unwrap();
        Harness {
            doc,
            notifier,
            coordinator,
        }
    }

    fn gif(name: &str) -> MemoryImage {
        MemoryImage::new(name, Bytes::from_static(GIF))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let doc = Rc::new(RefCell::new(RichDocument::new()));
        let result = InputCoordinator::mount(
            doc,
            GuardConfig::default().with_reposition_delay(Duration::from_secs(5)),
            Platform::default(),
            Rc::new(TokioLocalSpawner),
            Rc::new(RecordingNotifier::default()),
        );
        assert!(matches!(result, Err(ConfigError::DelayTooLong { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_at_offset_five() {
        LocalSet::new()
            .run_until(async {
                let h = harness("hello", GuardConfig::default());

                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(5));
                assert_eq!(action, EnterAction::Suppress);
                assert!(action.prevents_default());
                assert_eq!(h.doc.borrow().to_plain_text(), "hello\n\n");
                assert_eq!(h.doc.borrow().selection(), None);
                assert_eq!(h.coordinator.pending_tasks(), 1);

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(h.doc.borrow().selection(), Some(Selection::collapsed(6)));
                assert!(h.doc.borrow().is_focused());
                assert_eq!(h.coordinator.pending_tasks(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_uses_caret_when_event_has_no_offset() {
        LocalSet::new()
            .run_until(async {
                let h = harness("ab", GuardConfig::default());
                h.doc
                    .borrow_mut()
                    .set_selection(Selection::collapsed(1))
                    .unwrap();

                let action = h.coordinator.on_enter_key(&KeyEvent::enter());
                assert_eq!(action, EnterAction::Suppress);
                assert_eq!(h.doc.borrow().to_plain_text(), "a\nb\n");

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(h.doc.borrow().selection(), Some(Selection::collapsed(2)));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shift_enter_identical() {
        LocalSet::new()
            .run_until(async {
                let plain = harness("hello", GuardConfig::default());
                let shifted = harness("hello", GuardConfig::default());

                let a = plain.coordinator.on_enter_key(&KeyEvent::enter().at(2));
                let b = shifted
                    .coordinator
                    .on_enter_key(&KeyEvent::shift_enter().at(2));
                assert_eq!(a, b);

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(plain.doc.borrow().to_delta(), shifted.doc.borrow().to_delta());
                assert_eq!(plain.doc.borrow().selection(), shifted.doc.borrow().selection());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_composing_enter_not_intercepted() {
        LocalSet::new()
            .run_until(async {
                let h = harness("안녕", GuardConfig::default());
                h.coordinator.on_composition_start();
                h.coordinator.on_composition_update("하");

                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(2));
                assert_eq!(action, EnterAction::Default);
                assert_eq!(h.doc.borrow().to_plain_text(), "안녕\n");
                assert_eq!(h.coordinator.pending_tasks(), 0);

                // composition ends, now the next Enter is intercepted
                h.coordinator.on_composition_end();
                h.coordinator.on_composition_end();
                assert!(!h.coordinator.is_composing());
                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(2));
                assert_eq!(action, EnterAction::Suppress);
                assert_eq!(h.doc.borrow().to_plain_text(), "안녕\n\n");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newline_keeps_formatting() {
        LocalSet::new()
            .run_until(async {
                let h = harness("title", GuardConfig::default());
                h.doc
                    .borrow_mut()
                    .apply_format(0..5, &FormatCommand::ToggleBold)
                    .unwrap();

                h.coordinator.on_enter_key(&KeyEvent::enter().at(5));
                assert_eq!(h.doc.borrow().format_at(6), Formatting::bold());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_insertion_degrades_to_default() {
        LocalSet::new()
            .run_until(async {
                let h = harness("abc", GuardConfig::default());
                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(40));
                assert_eq!(action, EnterAction::Default);
                assert_eq!(h.coordinator.pending_tasks(), 0);

                // after the trailing newline
                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(4));
                assert_eq!(action, EnterAction::Default);
                assert_eq!(h.doc.borrow().to_plain_text(), "abc\n");

                let held = h.doc.borrow();
                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(1));
                assert_eq!(action, EnterAction::Default);
                assert_eq!(held.to_plain_text(), "abc\n");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_workaround_disabled() {
        LocalSet::new()
            .run_until(async {
                let config = GuardConfig::default().with_enter_workaround(EnterWorkaround::Never);
                let h = harness("abc", config);
                let action = h.coordinator.on_enter_key(&KeyEvent::enter().at(1));
                assert_eq!(action, EnterAction::Default);
                assert_eq!(h.doc.borrow().to_plain_text(), "abc\n");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_and_escape_cancel_composition() {
        LocalSet::new()
            .run_until(async {
                let h = harness("", GuardConfig::default());
                h.coordinator.on_composition_start();
                h.coordinator.on_blur();
                assert!(!h.coordinator.is_composing());

                h.coordinator.on_composition_start();
                let action = h
                    .coordinator
                    .on_key_down(&KeyEvent::new(Key::Escape));
                assert_eq!(action, EnterAction::Default);
                assert!(!h.coordinator.is_composing());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_caret_move() {
        LocalSet::new()
            .run_until(async {
                let h = harness("hello", GuardConfig::default());
                h.coordinator.on_enter_key(&KeyEvent::enter().at(5));
                assert_eq!(h.coordinator.pending_tasks(), 1);

                h.coordinator.unmount();
                h.coordinator.unmount();
                assert_eq!(h.coordinator.pending_tasks(), 0);

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(h.doc.borrow().selection(), None);
                assert!(!h.doc.borrow().is_focused());

                assert_eq!(
                    h.coordinator.on_enter_key(&KeyEvent::enter().at(0)),
                    EnterAction::Default
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_pending_work() {
        LocalSet::new()
            .run_until(async {
                let h = harness("hello", GuardConfig::default());
                h.coordinator.on_enter_key(&KeyEvent::enter().at(0));
                let doc = h.doc.clone();
                drop(h);

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert_eq!(doc.borrow().selection(), None);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_images_inserts_nothing() {
        LocalSet::new()
            .run_until(async {
                let h = harness("", GuardConfig::default());
                let picker = FixedPicker {
                    files: (0..6).map(|i| gif(&format!("{i}.gif"))).collect(),
                    requests: RefCell::new(Vec::new()),
                };

                let err = h
                    .coordinator
                    .select_and_insert_images(&picker)
                    .await
                    .unwrap_err();
                assert_eq!(err, ImageError::TooMany { selected: 6, max: 5 });
                assert_eq!(
                    h.notifier.warnings.borrow().as_slice(),
                    ["selected 6 images, at most 5 are allowed"]
                );
                assert_eq!(picker.requests.borrow()[0], PickRequest::images(true));

                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(h.doc.borrow().embeds().is_empty());
                assert_eq!(h.coordinator.pending_tasks(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_file_isolated() {
        LocalSet::new()
            .run_until(async {
                let h = harness("", GuardConfig::default());
                let mut files: Vec<MemoryImage> = (0..4).map(|i| gif(&format!("{i}.gif"))).collect();
                files.insert(2, MemoryImage::failing("broken.gif", "io error"));

                let batch = h.coordinator.insert_images(files).unwrap();
                assert_eq!(batch.len(), 5);
                let results = batch.settled().await;

                assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
                assert!(matches!(&results[2], Err(ImageError::Read { name, .. }) if name == "broken.gif"));
                assert_eq!(h.doc.borrow().embeds().len(), 4);
                assert!(h.notifier.warnings.borrow().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_images_inserted_at_caret_in_completion_order() {
        LocalSet::new()
            .run_until(async {
                let h = harness("ab", GuardConfig::default());
                h.doc
                    .borrow_mut()
                    .set_selection(Selection::collapsed(1))
                    .unwrap();

                let slow = gif("slow.gif").with_delay(Duration::from_millis(30));
                let fast = gif("fast.gif").with_delay(Duration::from_millis(10));
                let batch = h.coordinator.insert_images(vec![slow, fast]).unwrap();
                let results = batch.settled().await;

                let slow = results[0].as_ref().unwrap();
                let fast = results[1].as_ref().unwrap();
                assert_eq!(fast.offset, 1);
                assert_eq!(slow.offset, 2);
                assert_eq!(slow.mime, "image/gif");
                assert_eq!(h.doc.borrow().to_string(), "a[image][image]b\n");
                assert_eq!(h.doc.borrow().selection(), Some(Selection::collapsed(3)));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_without_caret_keeps_trailing_newline() {
        LocalSet::new()
            .run_until(async {
                let h = harness("hi", GuardConfig::default());
                assert_eq!(h.doc.borrow().selection(), None);

                let results = h
                    .coordinator
                    .insert_images(vec![gif("end.gif")])
                    .unwrap()
                    .settled()
                    .await;
                assert_eq!(results[0].as_ref().unwrap().offset, 2);

                let doc = h.doc.borrow();
                assert_eq!(doc.to_string(), "hi[image]\n");
                assert_eq!(doc.selection(), Some(Selection::collapsed(3)));
                let delta = serde_json::to_value(doc.to_delta()).unwrap();
                assert_eq!(
                    delta.as_array().and_then(|ops| ops.last()),
                    Some(&serde_json::json!({ "insert": "\n" }))
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_during_image_read() {
        LocalSet::new()
            .run_until(async {
                let h = harness("", GuardConfig::default());
                let file = gif("late.gif").with_delay(Duration::from_millis(30));
                let batch = h.coordinator.insert_images(vec![file]).unwrap();
                h.coordinator.unmount();

                let results = batch.settled().await;
                assert!(matches!(&results[0], Err(ImageError::Cancelled { .. })));
                assert!(h.doc.borrow().embeds().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_images() {
        LocalSet::new()
            .run_until(async {
                let h = harness("", GuardConfig::default().with_max_images(None));
                let files: Vec<MemoryImage> = (0..8).map(|i| gif(&format!("{i}.gif"))).collect();
                let results = h.coordinator.insert_images(files).unwrap().settled().await;
                assert!(results.iter().all(Result::is_ok));
                assert_eq!(h.doc.borrow().embeds().len(), 8);
            })
            .await;
    }
}
