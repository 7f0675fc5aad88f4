use hanji_editor_core::ConfigError;
use miette::Diagnostic;
use wasm_bindgen::JsValue;

/// Errors attaching the coordinator to a DOM element.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[non_exhaustive]
pub enum AttachError {
    #[error("element is already attached to an input coordinator")]
    #[diagnostic(
        code(hanji::browser::already_attached),
        help("drop the existing AttachedGuard before attaching again")
    )]
    AlreadyAttached,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("DOM error: {0}")]
    #[diagnostic(code(hanji::browser::dom))]
    Dom(String),
}

impl From<JsValue> for AttachError {
    fn from(value: JsValue) -> Self {
        AttachError::Dom(js_error_message(&value))
    }
}

/// Best-effort message for a thrown JS value.
pub(crate) fn js_error_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}
