//! Glue to the browser event loop: task spawning, user alerts, logging.

use futures_util::future::LocalBoxFuture;
use hanji_editor_core::{Notifier, Spawner};

/// Spawns deferred tasks on the page's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmSpawner;

impl Spawner for WasmSpawner {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// Shows warnings with `window.alert`, the way simple editor pages do.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertNotifier;

impl Notifier for AlertNotifier {
    fn warn(&self, message: &str) {
        tracing::warn!(message, "user warning");
        match web_sys::window().map(|w| w.alert_with_message(message)) {
            Some(Ok(())) => {}
            _ => tracing::debug!("alert unavailable"),
        }
    }
}

/// Install the panic hook and a console tracing subscriber.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logging() {
    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    console_error_panic_hook::set_once();

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    let reg = Registry::default().with(wasm_layer);

    let _ = set_global_default(reg);
}
