//! Image insertion: pick local files, encode each as a data URL, embed each
//! at the caret.
//!
//! Every file is read in its own task. The embed goes wherever the caret is
//! when that file's read completes, so with several files the insertion order
//! is completion order, not selection order.

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use mime_sniffer::MimeTypeSniffer;
use smol_str::SmolStr;
use tokio::sync::oneshot;

use crate::embed::Embed;
use crate::error::{ImageError, SurfaceError};
use crate::scheduler::{DeferredTasks, Spawner};
use crate::surface::{SurfaceLink, TextSurface};
use crate::types::Selection;

/// What the picker should offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    /// `accept` filter, e.g. `image/*`.
    pub accept: SmolStr,
    pub multiple: bool,
}

impl PickRequest {
    pub fn images(multiple: bool) -> Self {
        Self {
            accept: SmolStr::new_static("image/*"),
            multiple,
        }
    }
}

/// One selected file.
pub trait ImageSource: 'static {
    /// Display name, used in errors and logs.
    fn name(&self) -> &str;

    /// MIME type reported by the platform, if any. Content sniffing wins
    /// over this when it recognizes the bytes.
    fn mime_hint(&self) -> Option<&str>;

    /// Read the whole file.
    fn read(&self) -> impl Future<Output = Result<Bytes, ImageError>>;
}

/// Native file-selection affordance.
pub trait FilePicker {
    type File: ImageSource;

    /// Open the picker and wait for the user's choice. An empty list means
    /// the user dismissed it.
    fn pick(&self, request: PickRequest) -> impl Future<Output = Result<Vec<Self::File>, ImageError>>;
}

/// User-facing warnings (modal, toast, alert).
pub trait Notifier {
    fn warn(&self, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        tracing::warn!(message, "user warning");
    }
}

/// An image held in memory: pasted bytes, a test fixture, a file already
/// read by the host.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    name: String,
    mime_hint: Option<String>,
    data: Result<Bytes, String>,
    delay: Duration,
}

impl MemoryImage {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_hint: None,
            data: Ok(data.into()),
            delay: Duration::ZERO,
        }
    }

    /// A file whose read fails with `reason`.
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_hint: None,
            data: Err(reason.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_mime_hint(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    /// Simulate a slow read.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ImageSource for MemoryImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_hint(&self) -> Option<&str> {
        self.mime_hint.as_deref()
    }

    async fn read(&self) -> Result<Bytes, ImageError> {
        if !self.delay.is_zero() {
            n0_future::time::sleep(self.delay).await;
        }
        self.data.clone().map_err(|reason| ImageError::Read {
            name: self.name.clone(),
            reason,
        })
    }
}

/// A completed insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInsertion {
    pub name: String,
    pub mime: String,
    /// Offset the embed was inserted at.
    pub offset: usize,
    /// Length of the data URL.
    pub encoded_len: usize,
}

/// Sniffers fall back to these when they don't recognize the bytes.
fn is_generic_mime(mime: &str) -> bool {
    matches!(mime, "application/octet-stream" | "text/plain")
}

/// Encode `data` as a `data:` URL, returning the resolved MIME type too.
///
/// Rejects content that is not an image.
pub fn encode_data_url(
    name: &str,
    data: &Bytes,
    mime_hint: Option<&str>,
) -> Result<(String, String), ImageError> {
    let sniffed = data.sniff_mime_type().filter(|m| !is_generic_mime(m));
    let mime = sniffed
        .or(mime_hint)
        .unwrap_or("application/octet-stream")
        .to_string();

    if !mime.starts_with("image/") {
        return Err(ImageError::NotAnImage {
            name: name.to_string(),
            mime,
        });
    }

    let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(data));
    Ok((mime, data_url))
}

#[derive(Debug)]
struct PendingImage {
    name: String,
    outcome: oneshot::Receiver<Result<ImageInsertion, ImageError>>,
}

/// In-flight insertions from one selection.
///
/// Dropping the batch does not cancel anything; the tasks are owned by the
/// coordinator and only stop at unmount.
#[derive(Debug, Default)]
pub struct ImageBatch {
    pending: Vec<PendingImage>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for every file to finish. Results are in selection order.
    pub async fn settled(self) -> Vec<Result<ImageInsertion, ImageError>> {
        let mut results = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let result = match pending.outcome.await {
                Ok(result) => result,
                Err(_) => Err(ImageError::Cancelled { name: pending.name }),
            };
            results.push(result);
        }
        results
    }
}

/// The image flow for one mounted surface.
pub struct ImagePipeline<S> {
    link: SurfaceLink<S>,
    spawner: Rc<dyn Spawner>,
    tasks: DeferredTasks,
    notifier: Rc<dyn Notifier>,
    max_images: Option<usize>,
    allow_multiple: bool,
}

impl<S: TextSurface + 'static> ImagePipeline<S> {
    pub(crate) fn new(
        link: SurfaceLink<S>,
        spawner: Rc<dyn Spawner>,
        tasks: DeferredTasks,
        notifier: Rc<dyn Notifier>,
        max_images: Option<usize>,
        allow_multiple: bool,
    ) -> Self {
        Self {
            link,
            spawner,
            tasks,
            notifier,
            max_images,
            allow_multiple,
        }
    }

    /// Open the picker and start one insertion per selected file.
    ///
    /// Selecting more than the configured maximum warns the user and starts
    /// nothing.
    pub async fn select_and_insert<P: FilePicker>(
        &self,
        picker: &P,
    ) -> Result<ImageBatch, ImageError> {
        let files = picker.pick(PickRequest::images(self.allow_multiple)).await?;
        self.insert_files(files)
    }

    /// Start one insertion per file, applying the batch limit.
    pub fn insert_files<F: ImageSource>(&self, files: Vec<F>) -> Result<ImageBatch, ImageError> {
        if files.is_empty() {
            tracing::debug!("image selection dismissed");
            return Ok(ImageBatch::default());
        }

        if let Some(max) = self.max_images {
            if files.len() > max {
                let error = ImageError::TooMany {
                    selected: files.len(),
                    max,
                };
                tracing::warn!(selected = files.len(), max, "image selection over limit");
                self.notifier.warn(&error.to_string());
                return Err(error);
            }
        }

        tracing::debug!(count = files.len(), "starting image insertions");
        let pending = files
            .into_iter()
            .map(|file| {
                let name = file.name().to_string();
                let (tx, rx) = oneshot::channel();
                let link = self.link.clone();
                let token = self.tasks.spawn(&*self.spawner, async move {
                    let outcome = insert_one(&link, file).await;
                    match &outcome {
                        Ok(insertion) => tracing::debug!(
                            name = %insertion.name,
                            offset = insertion.offset,
                            mime = %insertion.mime,
                            "image inserted"
                        ),
                        Err(ImageError::Surface {
                            source: SurfaceError::Unmounted,
                            ..
                        }) => tracing::debug!("surface unmounted before image read finished"),
                        Err(e) => tracing::warn!(error = %e, "image insertion failed"),
                    }
                    // Receiver may be gone; the insertion stands either way.
                    let _ = tx.send(outcome);
                });
                tracing::trace!(task = token.id(), name = %name, "image read started");
                PendingImage { name, outcome: rx }
            })
            .collect();

        Ok(ImageBatch { pending })
    }
}

async fn insert_one<S: TextSurface, F: ImageSource>(
    link: &SurfaceLink<S>,
    file: F,
) -> Result<ImageInsertion, ImageError> {
    let name = file.name().to_string();
    let data = file.read().await?;
    let (mime, data_url) = encode_data_url(&name, &data, file.mime_hint())?;
    let encoded_len = data_url.len();
    let embed = Embed::Image(data_url);

    // Caret position at completion time, not at selection time.
    let inserted = link
        .with_mut(|surface| -> Result<usize, SurfaceError> {
            let len = surface.len_chars();
            let end = surface.end_offset();
            let offset = surface
                .selection()
                .map(|sel| sel.clamped(end).start())
                .unwrap_or(end);
            surface.insert_embed(offset, &embed)?;
            // One char on delta surfaces, the whole markup on plain-text ones.
            let grown = surface.len_chars().saturating_sub(len).max(1);
            surface.set_selection(Selection::collapsed(offset + grown))?;
            Ok(offset)
        })
        .and_then(|r| r);

    match inserted {
        Ok(offset) => Ok(ImageInsertion {
            name,
            mime,
            offset,
            encoded_len,
        }),
        Err(source) => Err(ImageError::Surface { name, source }),
    }
}
