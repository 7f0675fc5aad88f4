//! Platform detection from `navigator`.

use std::sync::OnceLock;

use hanji_editor_core::Platform;

static PLATFORM: OnceLock<Platform> = OnceLock::new();

/// Get cached platform info. Detection runs once on first call.
pub fn platform() -> &'static Platform {
    PLATFORM.get_or_init(detect_platform)
}

fn detect_platform() -> Platform {
    let Some(window) = web_sys::window() else {
        return Platform::default();
    };

    let navigator = window.navigator();
    let user_agent = navigator.user_agent().unwrap_or_default();
    let platform_str = navigator.platform().unwrap_or_default();
    let detected =
        Platform::from_user_agent(&user_agent, &platform_str, navigator.max_touch_points());
    tracing::debug!(?detected, "detected platform");
    detected
}
