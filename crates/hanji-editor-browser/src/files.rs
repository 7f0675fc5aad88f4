//! Native file selection through a detached `<input type=file>`.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use gloo_events::EventListener;
use hanji_editor_core::{FilePicker, ImageError, ImageSource, PickRequest};
use tokio::sync::oneshot;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, HtmlInputElement};

use crate::error::js_error_message;

/// A file chosen in the picker.
pub struct BrowserFile {
    file: File,
    name: String,
    mime: Option<String>,
}

impl BrowserFile {
    pub fn new(file: File) -> Self {
        let name = file.name();
        let mime = Some(file.type_()).filter(|t| !t.is_empty());
        Self { file, name, mime }
    }

    pub fn file(&self) -> &File {
        &self.file
    }
}

impl ImageSource for BrowserFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_hint(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    async fn read(&self) -> Result<Bytes, ImageError> {
        let buffer = JsFuture::from(self.file.array_buffer())
            .await
            .map_err(|e| ImageError::Read {
                name: self.name.clone(),
                reason: js_error_message(&e),
            })?;
        let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
        Ok(Bytes::from(bytes))
    }
}

/// Opens the browser's file dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserFilePicker;

impl FilePicker for BrowserFilePicker {
    type File = BrowserFile;

    async fn pick(&self, request: PickRequest) -> Result<Vec<BrowserFile>, ImageError> {
        let picker_err = |e: wasm_bindgen::JsValue| ImageError::Picker(js_error_message(&e));

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| ImageError::Picker("no document".into()))?;
        let input: HtmlInputElement = document
            .create_element("input")
            .map_err(picker_err)?
            .dyn_into()
            .map_err(|_| ImageError::Picker("created element is not an input".into()))?;
        input.set_type("file");
        input.set_accept(&request.accept);
        input.set_multiple(request.multiple);

        // Either listener may fire first; whichever does takes the sender.
        let (tx, rx) = oneshot::channel::<Vec<BrowserFile>>();
        let tx = Rc::new(RefCell::new(Some(tx)));

        let _on_change = {
            let tx = tx.clone();
            let target = input.clone();
            EventListener::once(&input, "change", move |_| {
                let files = collect_files(&target);
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(files);
                }
            })
        };
        let _on_cancel = {
            let tx = tx.clone();
            EventListener::once(&input, "cancel", move |_| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Vec::new());
                }
            })
        };

        input.click();
        let files = rx.await.unwrap_or_default();
        tracing::debug!(count = files.len(), "file picker closed");
        Ok(files)
    }
}

fn collect_files(input: &HtmlInputElement) -> Vec<BrowserFile> {
    let Some(list) = input.files() else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .map(BrowserFile::new)
        .collect()
}
