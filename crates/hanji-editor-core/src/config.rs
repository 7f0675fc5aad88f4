//! Coordinator configuration.
//!
//! The batch limit and repositioning delay differ between the editor pages this
//! was built for (5 vs. unbounded images; 10, 30 or 50ms), so both are
//! configuration rather than constants.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::platform::Platform;

/// Default delay before the caret is moved after a manual newline.
pub const DEFAULT_REPOSITION_DELAY: Duration = Duration::from_millis(50);

/// Upper bound for the repositioning delay. Longer delays would let the user
/// type into a caret position that is about to be overwritten.
pub const MAX_REPOSITION_DELAY: Duration = Duration::from_millis(1000);

/// Default maximum number of images per selection.
pub const DEFAULT_MAX_IMAGES: usize = 5;

/// Default character limit shown by the counter.
pub const DEFAULT_CHAR_LIMIT: usize = 6000;

/// On which platforms the manual Enter handling is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnterWorkaround {
    /// Everywhere.
    #[default]
    Always,
    /// iOS and iPadOS only.
    Ios,
    /// Any mobile platform.
    Mobile,
    /// Never intercept Enter; the surface handles it.
    Never,
}

impl EnterWorkaround {
    /// Whether the workaround applies on `platform`.
    pub fn applies_to(self, platform: &Platform) -> bool {
        match self {
            EnterWorkaround::Always => true,
            EnterWorkaround::Ios => platform.ios,
            EnterWorkaround::Mobile => platform.mobile,
            EnterWorkaround::Never => false,
        }
    }
}

impl FromStr for EnterWorkaround {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(EnterWorkaround::Always),
            "ios" => Ok(EnterWorkaround::Ios),
            "mobile" => Ok(EnterWorkaround::Mobile),
            "never" | "off" => Ok(EnterWorkaround::Never),
            _ => Err(ConfigError::UnknownWorkaround(s.to_string())),
        }
    }
}

/// Configuration for one `InputCoordinator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GuardConfig {
    /// Delay before the caret is set after a manual newline, in milliseconds.
    pub reposition_delay_ms: u64,
    /// Maximum images per selection. `None` means unbounded.
    pub max_images: Option<usize>,
    /// Refocus the surface when the caret is repositioned.
    pub restore_focus: bool,
    /// Let the file picker select more than one file.
    pub allow_multiple: bool,
    /// Platforms on which Enter is intercepted.
    pub enter_workaround: EnterWorkaround,
    /// Character limit reported by `DocumentStats`. `None` disables the limit.
    pub char_limit: Option<usize>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            reposition_delay_ms: DEFAULT_REPOSITION_DELAY.as_millis() as u64,
            max_images: Some(DEFAULT_MAX_IMAGES),
            restore_focus: true,
            allow_multiple: true,
            enter_workaround: EnterWorkaround::Always,
            char_limit: Some(DEFAULT_CHAR_LIMIT),
        }
    }
}

impl GuardConfig {
    pub fn reposition_delay(&self) -> Duration {
        Duration::from_millis(self.reposition_delay_ms)
    }

    pub fn with_reposition_delay(mut self, delay: Duration) -> Self {
        self.reposition_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
        self.max_images = max_images;
        self
    }

    pub fn with_enter_workaround(mut self, mode: EnterWorkaround) -> Self {
        self.enter_workaround = mode;
        self
    }

    /// Check bounds. The coordinator refuses to mount with an invalid config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reposition_delay() > MAX_REPOSITION_DELAY {
            return Err(ConfigError::DelayTooLong {
                given_ms: self.reposition_delay().as_millis(),
                max_ms: MAX_REPOSITION_DELAY.as_millis(),
            });
        }
        if self.max_images == Some(0) {
            return Err(ConfigError::Invalid {
                key: "max-images".into(),
                reason: "must be at least 1; omit it for no limit".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reposition_delay(), Duration::from_millis(50));
        assert_eq!(config.max_images, Some(5));
    }

    #[test]
    fn test_delay_bound() {
        let config = GuardConfig::default().with_reposition_delay(Duration::from_secs(2));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DelayTooLong {
                given_ms: 2000,
                max_ms: 1000
            })
        );
    }

    #[test]
    fn test_zero_images_rejected() {
        let config = GuardConfig::default().with_max_images(Some(0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_workaround_parse_and_gate() {
        assert_eq!("iOS".parse::<EnterWorkaround>(), Ok(EnterWorkaround::Ios));
        assert!("sometimes".parse::<EnterWorkaround>().is_err());

        let desktop = Platform::default();
        assert!(EnterWorkaround::Always.applies_to(&desktop));
        assert!(!EnterWorkaround::Ios.applies_to(&desktop));
        assert!(EnterWorkaround::Ios.applies_to(&Platform::ios_safari()));
        assert!(!EnterWorkaround::Never.applies_to(&Platform::ios_safari()));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"reposition-delay-ms": 10, "max-images": null}"#).unwrap();
        assert_eq!(config.reposition_delay_ms, 10);
        assert_eq!(config.max_images, None);
        assert!(config.restore_focus);
    }
}
