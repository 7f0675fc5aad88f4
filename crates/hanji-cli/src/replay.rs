//! Run a parsed script against a `RichDocument` through an `InputCoordinator`.
//!
//! Anything the coordinator leaves to the surface (`EnterAction::Default`) is
//! simulated the way an editor would handle it, so the final document shows
//! what a user would have seen.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use hanji_editor_core::{
    DeltaOp, DocumentStats, Embed, EnterAction, FilePicker, GuardConfig, ImageError,
    ImageSource, InputCoordinator, Key, KeyEvent, LogNotifier, MAX_REPOSITION_DELAY,
    PickRequest, Platform, RichDocument, Selection, SharedSurface, TextSurface,
    TokioLocalSpawner,
};
use serde::Serialize;
use tracing::Instrument;

use crate::script::Command;

/// An image file on disk.
pub struct PathImage {
    path: PathBuf,
    name: String,
}

impl PathImage {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

impl ImageSource for PathImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_hint(&self) -> Option<&str> {
        let ext = self.path.extension()?.to_str()?.to_ascii_lowercase();
        let mime = match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            "svg" => "image/svg+xml",
            "heic" => "image/heic",
            _ => return None,
        };
        Some(mime)
    }

    async fn read(&self) -> Result<Bytes, ImageError> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(|e| ImageError::Read {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Picker that "selects" the paths named in the script.
pub struct ScriptPicker {
    paths: Vec<PathBuf>,
}

impl ScriptPicker {
    pub fn new(base_dir: &Path, paths: &[PathBuf]) -> Self {
        Self {
            paths: paths.iter().map(|p| base_dir.join(p)).collect(),
        }
    }
}

impl FilePicker for ScriptPicker {
    type File = PathImage;

    async fn pick(&self, request: PickRequest) -> Result<Vec<PathImage>, ImageError> {
        let take = if request.multiple { self.paths.len() } else { 1 };
        if take < self.paths.len() {
            tracing::info!(
                selected = self.paths.len(),
                "single-file picker, keeping the first file"
            );
        }
        Ok(self
            .paths
            .iter()
            .take(take)
            .cloned()
            .map(PathImage::new)
            .collect())
    }
}

/// Final state after a replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Text with embed placeholders.
    pub text: String,
    pub delta: Vec<DeltaOp>,
    pub stats: DocumentStats,
    pub caret: Option<usize>,
    /// One line per command describing what happened.
    pub steps: Vec<String>,
}

struct Session {
    doc: SharedSurface<RichDocument>,
    coordinator: InputCoordinator<RichDocument>,
    base_dir: PathBuf,
    steps: Vec<String>,
}

/// Replay `commands` on a document starting with `initial_text`.
///
/// Must run inside a `tokio::task::LocalSet`.
pub async fn replay(
    commands: &[Command],
    initial_text: &str,
    config: GuardConfig,
    platform: Platform,
    base_dir: &Path,
) -> miette::Result<ReplayReport> {
    let doc = Rc::new(RefCell::new(RichDocument::from_text(initial_text)));
    let char_limit = config.char_limit;
    let coordinator = InputCoordinator::mount(
        doc.clone(),
        config,
        platform,
        Rc::new(TokioLocalSpawner),
        Rc::new(LogNotifier),
    )?;

    let mut session = Session {
        doc,
        coordinator,
        base_dir: base_dir.to_path_buf(),
        steps: Vec::with_capacity(commands.len()),
    };

    for (index, command) in commands.iter().enumerate() {
        let step = session
            .run(command)
            .instrument(tracing::debug_span!("command", index, name = command.name()))
            .await?;
        tracing::info!("{step}");
        session.steps.push(step);
    }

    session.settle().await;
    session.coordinator.unmount();

    let doc = session.doc.borrow();
    Ok(ReplayReport {
        text: doc.to_string(),
        delta: doc.to_delta(),
        stats: doc.stats(char_limit),
        caret: doc.selection().map(|s| s.head),
        steps: session.steps,
    })
}

impl Session {
    fn caret(&self) -> usize {
        let doc = self.doc.borrow();
        doc.selection()
            .map(|s| s.start())
            .unwrap_or_else(|| doc.end_offset())
    }

    /// What the surface does with typed (or committed) text.
    fn type_text(&self, text: &str) -> miette::Result<usize> {
        let caret = self.caret();
        let mut doc = self.doc.borrow_mut();
        let formatting = doc.format_at(caret);
        doc.insert_text(caret, text, &formatting)?;
        doc.set_selection(Selection::collapsed(caret + text.chars().count()))?;
        Ok(caret)
    }

    async fn run(&self, command: &Command) -> miette::Result<String> {
        let step = match command {
            Command::Type(text) => {
                let at = self.type_text(text)?;
                format!("type {text:?} at {at}")
            }
            Command::Caret(offset) => {
                self.doc
                    .borrow_mut()
                    .set_selection(Selection::collapsed(*offset))?;
                format!("caret {offset}")
            }
            Command::Select { anchor, head } => {
                self.doc
                    .borrow_mut()
                    .set_selection(Selection::new(*anchor, *head))?;
                format!("select {anchor}..{head}")
            }
            Command::Delete { from, to } => {
                self.doc.borrow_mut().delete(*from..*to)?;
                format!("delete {from}..{to}")
            }
            Command::Compose(steps) => {
                self.coordinator.on_composition_start();
                for data in steps {
                    self.coordinator.on_composition_update(data);
                }
                let committed = steps.last().map(String::as_str).unwrap_or_default();
                let at = self.type_text(committed)?;
                self.coordinator.on_composition_end();
                format!("compose {committed:?} at {at}")
            }
            Command::CompositionStart => {
                self.coordinator.on_composition_start();
                "composition started".to_string()
            }
            Command::CompositionUpdate(data) => {
                self.coordinator.on_composition_update(data);
                format!("composition update {data:?}")
            }
            Command::CompositionEnd(commit) => {
                if let Some(text) = commit {
                    self.type_text(text)?;
                }
                self.coordinator.on_composition_end();
                match commit {
                    Some(text) => format!("composition ended, committed {text:?}"),
                    None => "composition ended".to_string(),
                }
            }
            Command::Enter { shift, offset } => self.enter(*shift, *offset)?,
            Command::Escape => {
                self.coordinator.on_key_down(&KeyEvent::new(Key::Escape));
                "escape".to_string()
            }
            Command::Blur => {
                self.coordinator.on_blur();
                self.doc.borrow_mut().blur();
                "blur".to_string()
            }
            Command::Images(paths) => self.images(paths).await,
            Command::Video(url) => {
                let embed = Embed::video_from_url(url)?;
                let at = self.caret();
                let mut doc = self.doc.borrow_mut();
                doc.insert_embed(at, &embed)?;
                doc.set_selection(Selection::collapsed(at + 1))?;
                format!("video {} at {at}", embed.src())
            }
            Command::Link { text, href } => {
                let at = self.caret();
                let mut doc = self.doc.borrow_mut();
                doc.insert_link(at, text, href)?;
                doc.set_selection(Selection::collapsed(at + text.chars().count()))?;
                format!("link {text:?} at {at}")
            }
            Command::Format { command, from, to } => {
                let selection = self
                    .doc
                    .borrow()
                    .selection()
                    .unwrap_or(Selection::collapsed(0));
                let range = from.unwrap_or(selection.start())..to.unwrap_or(selection.end());
                self.doc.borrow_mut().apply_format(range.clone(), command)?;
                format!("format {command:?} on {}..{}", range.start, range.end)
            }
            Command::Wait(duration) => {
                tokio::time::sleep(*duration).await;
                format!("wait {}ms", duration.as_millis())
            }
        };
        Ok(step)
    }

    fn enter(&self, shift: bool, offset: Option<usize>) -> miette::Result<String> {
        let mut event = KeyEvent::enter().with_shift(shift);
        if let Some(offset) = offset {
            event = event.at(offset);
        }

        match self.coordinator.on_key_down(&event) {
            EnterAction::Suppress => Ok("enter: newline inserted, caret move scheduled".to_string()),
            _ if self.coordinator.is_composing() => Ok("enter: left to the IME".to_string()),
            _ => {
                let at = self.type_text("\n")?;
                Ok(format!("enter: default newline at {at}"))
            }
        }
    }

    async fn images(&self, paths: &[PathBuf]) -> String {
        let picker = ScriptPicker::new(&self.base_dir, paths);
        let batch = match self.coordinator.select_and_insert_images(&picker).await {
            Ok(batch) => batch,
            Err(e) => return format!("image: {e}"),
        };
        let results = batch.settled().await;
        let lines: Vec<String> = results
            .iter()
            .map(|result| match result {
                Ok(insertion) => format!(
                    "{} ({}) at {}",
                    insertion.name, insertion.mime, insertion.offset
                ),
                Err(e) => e.to_string(),
            })
            .collect();
        format!("image: {}", lines.join("; "))
    }

    /// Let scheduled caret moves fire before the document is read.
    async fn settle(&self) {
        let settled = tokio::time::timeout(MAX_REPOSITION_DELAY * 2, async {
            while self.coordinator.pending_tasks() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if settled.is_err() {
            tracing::warn!(
                pending = self.coordinator.pending_tasks(),
                "deferred tasks still pending after replay"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::task::LocalSet;

    use super::*;
    use crate::script::parse_script;
    use hanji_editor_core::EnterWorkaround;

    async fn run(script: &str, config: GuardConfig, platform: Platform) -> ReplayReport {
        let commands = parse_script(script).unwrap();
        LocalSet::new()
            .run_until(replay(&commands, "", config, platform, Path::new(".")))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_after_typing() {
        let report = run(
            r#"
            type "hello"
            enter
            "#,
            GuardConfig::default(),
            Platform::ios_safari(),
        )
        .await;
        insta::assert_snapshot!(format!("{:?}", report.text), @r#""hello\n\n""#);
        assert_eq!(report.caret, Some(6));
        assert_eq!(report.steps[1], "enter: newline inserted, caret move scheduled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_during_composition_left_to_ime() {
        let report = run(
            r#"
            compose-start
            compose-update "ㅎ"
            enter
            compose-end "하"
            "#,
            GuardConfig::default(),
            Platform::ios_safari(),
        )
        .await;
        assert_eq!(report.text, "하\n");
        assert_eq!(report.steps[2], "enter: left to the IME");
    }

    #[tokio::test(start_paused = true)]
    async fn test_workaround_off_uses_default_newline() {
        let config = GuardConfig::default().with_enter_workaround(EnterWorkaround::Ios);
        let report = run(
            r#"
            type "ab"
            caret 1
            enter
            "#,
            config,
            Platform::default(),
        )
        .await;
        assert_eq!(report.text, "a\nb\n");
        assert_eq!(report.steps[2], "enter: default newline at 1");
        assert_eq!(report.caret, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_formatting_and_stats() {
        let report = run(
            r#"
            type "title"
            format "bold" from=0 to=5
            enter
            type "body"
            video "https://youtu.be/dQw4w9WgXcQ"
            "#,
            GuardConfig::default(),
            Platform::default(),
        )
        .await;
        assert_eq!(report.text, "title\nbody[video]\n");
        assert_eq!(report.stats.chars, 10);
        assert_eq!(report.stats.embeds, 1);
        let json = serde_json::to_string(&report.delta).unwrap();
        assert_eq!(
            json,
            r#"[{"insert":"title\nbody","attributes":{"bold":true}},{"insert":{"video":"https://www.youtube.com/embed/dQw4w9WgXcQ?showinfo=0"}},{"insert":"\n"}]"#
        );
    }

    #[tokio::test]
    async fn test_missing_image_reported() {
        let report = run(
            r#"image "does-not-exist.png""#,
            GuardConfig::default(),
            Platform::default(),
        )
        .await;
        assert!(report.steps[0].starts_with("image: failed to read does-not-exist.png"));
        assert_eq!(report.stats.embeds, 0);
    }

    #[tokio::test]
    async fn test_too_many_images() {
        let config = GuardConfig::default().with_max_images(Some(1));
        let report = run(r#"image "a.png" "b.png""#, config, Platform::default()).await;
        assert_eq!(report.steps[0], "image: selected 2 images, at most 1 are allowed");
    }
}
