//! DOM event wiring for one editor element.
//!
//! `attach` installs composition, keydown, beforeinput and blur listeners that
//! forward to an `InputCoordinator`. Listeners are RAII `EventListener`s held
//! by the returned `AttachedGuard`; dropping the guard removes them and
//! unmounts the coordinator.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::{EventListener, EventListenerOptions};
use hanji_editor_core::{
    EnterAction, FilePicker, GuardConfig, ImageBatch, ImageError, InputCoordinator, Key,
    KeyEvent,
};
use wasm_bindgen::JsCast;
use web_sys::{CompositionEvent, HtmlTextAreaElement, InputEvent, KeyboardEvent};

use crate::error::AttachError;
use crate::platform::platform;
use crate::runtime::{AlertNotifier, WasmSpawner};
use crate::surface::TextAreaSurface;

/// Marks an element that already has listeners installed.
pub const ATTACHED_ATTR: &str = "data-hanji-attached";

/// Build a `KeyEvent` from a DOM keyboard event.
///
/// The caret offset is left unset; the coordinator reads it from the surface.
pub fn key_event_from_dom(event: &KeyboardEvent) -> KeyEvent {
    KeyEvent::new(Key::from_dom_key(&event.key()))
        .with_shift(event.shift_key())
        .with_ctrl(event.ctrl_key())
        .with_alt(event.alt_key())
        .with_meta(event.meta_key())
}

/// Listeners and coordinator for one attached element.
pub struct AttachedGuard {
    element: HtmlTextAreaElement,
    coordinator: Rc<InputCoordinator<TextAreaSurface>>,
    _listeners: Vec<EventListener>,
}

impl AttachedGuard {
    pub fn coordinator(&self) -> &Rc<InputCoordinator<TextAreaSurface>> {
        &self.coordinator
    }

    pub fn element(&self) -> &HtmlTextAreaElement {
        &self.element
    }

    /// Run the image flow with `picker` (usually `BrowserFilePicker`) from a
    /// toolbar button.
    pub async fn pick_images<P: FilePicker>(&self, picker: &P) -> Result<ImageBatch, ImageError> {
        self.coordinator.select_and_insert_images(picker).await
    }
}

impl Drop for AttachedGuard {
    fn drop(&mut self) {
        self.coordinator.unmount();
        if let Err(e) = self.element.remove_attribute(ATTACHED_ATTR) {
            tracing::debug!(error = ?e, "failed to clear attach marker");
        }
        tracing::debug!("detached from element");
    }
}

/// Attach an input coordinator to `element`.
///
/// Fails with `AlreadyAttached` if another guard is live for the same element.
pub fn attach(element: &HtmlTextAreaElement, config: GuardConfig) -> Result<AttachedGuard, AttachError> {
    if element.has_attribute(ATTACHED_ATTR) {
        return Err(AttachError::AlreadyAttached);
    }

    let surface = Rc::new(RefCell::new(TextAreaSurface::new(element.clone())));
    let coordinator = Rc::new(InputCoordinator::mount(
        surface,
        config,
        platform().clone(),
        Rc::new(WasmSpawner),
        Rc::new(AlertNotifier),
    )?);
    element.set_attribute(ATTACHED_ATTR, "")?;

    let mut listeners = Vec::with_capacity(6);

    listeners.push({
        let coordinator = coordinator.clone();
        EventListener::new(element, "compositionstart", move |_| {
            coordinator.on_composition_start();
        })
    });

    listeners.push({
        let coordinator = coordinator.clone();
        EventListener::new(element, "compositionupdate", move |event| {
            let data = event
                .dyn_ref::<CompositionEvent>()
                .and_then(|e| e.data())
                .unwrap_or_default();
            coordinator.on_composition_update(&data);
        })
    });

    listeners.push({
        let coordinator = coordinator.clone();
        EventListener::new(element, "compositionend", move |_| {
            coordinator.on_composition_end();
        })
    });

    listeners.push({
        let coordinator = coordinator.clone();
        EventListener::new(element, "blur", move |_| {
            coordinator.on_blur();
        })
    });

    listeners.push({
        let coordinator = coordinator.clone();
        let options = EventListenerOptions::enable_prevent_default();
        EventListener::new_with_options(element, "keydown", options, move |event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            // Keys consumed by the IME arrive as "Process" with isComposing set.
            if event.is_composing() {
                return;
            }
            let action = coordinator.on_key_down(&key_event_from_dom(event));
            if action.prevents_default() {
                event.prevent_default();
            }
        })
    });

    // Android keyboards report Enter as "Unidentified" on keydown; the line
    // break only shows up as a beforeinput.
    listeners.push({
        let coordinator = coordinator.clone();
        let options = EventListenerOptions::enable_prevent_default();
        EventListener::new_with_options(element, "beforeinput", options, move |event| {
            let Some(event) = event.dyn_ref::<InputEvent>() else {
                return;
            };
            if event.is_composing() {
                return;
            }
            let input_type = event.input_type();
            if input_type != "insertLineBreak" && input_type != "insertParagraph" {
                return;
            }
            let action = coordinator.on_enter_key(&KeyEvent::enter());
            if action == EnterAction::Suppress {
                event.prevent_default();
            }
        })
    });

    tracing::debug!("attached to element");
    Ok(AttachedGuard {
        element: element.clone(),
        coordinator,
        _listeners: listeners,
    })
}
