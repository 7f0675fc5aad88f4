//! `GuardConfig` from KDL.
//!
//! ```kdl
//! reposition-delay-ms 30
//! max-images 5
//! restore-focus true
//! allow-multiple true
//! enter-workaround "ios"
//! char-limit 6000
//! ```
//!
//! Missing settings keep their defaults. `0`, `"unbounded"` or `"none"` turn
//! a limit off.

use hanji_editor_core::{ConfigError, GuardConfig};
use kdl::{KdlDocument, KdlValue};

use crate::kdl_error::parse_kdl;

/// Parse and validate a config file.
pub fn parse_config(source: &str) -> miette::Result<GuardConfig> {
    let doc = parse_kdl(source)?;
    let config = config_from_kdl(&doc)?;
    config.validate()?;
    Ok(config)
}

/// Apply the settings in `doc` over the defaults. Does not validate.
pub fn config_from_kdl(doc: &KdlDocument) -> Result<GuardConfig, ConfigError> {
    let mut config = GuardConfig::default();

    for node in doc.nodes() {
        let key = node.name().value();
        let value = node.entries().first().map(|e| e.value());
        let invalid = |reason: &str| ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "reposition-delay-ms" => {
                config.reposition_delay_ms = value
                    .and_then(KdlValue::as_i64)
                    .and_then(|ms| u64::try_from(ms).ok())
                    .ok_or_else(|| invalid("expected a non-negative integer"))?;
            }
            "max-images" => {
                config.max_images =
                    limit(value).ok_or_else(|| invalid("expected a count or \"unbounded\""))?;
            }
            "char-limit" => {
                config.char_limit =
                    limit(value).ok_or_else(|| invalid("expected a count or \"none\""))?;
            }
            "restore-focus" => {
                config.restore_focus = value
                    .and_then(KdlValue::as_bool)
                    .ok_or_else(|| invalid("expected true or false"))?;
            }
            "allow-multiple" => {
                config.allow_multiple = value
                    .and_then(KdlValue::as_bool)
                    .ok_or_else(|| invalid("expected true or false"))?;
            }
            "enter-workaround" => {
                config.enter_workaround = value
                    .and_then(KdlValue::as_string)
                    .ok_or_else(|| invalid("expected a mode name"))?
                    .parse()?;
            }
            _ => return Err(invalid("unknown setting")),
        }
    }

    Ok(config)
}

/// `Some(None)` for "no limit", `None` if the value is malformed.
fn limit(value: Option<&KdlValue>) -> Option<Option<usize>> {
    let value = value?;
    if let Some(s) = value.as_string() {
        return matches!(s, "unbounded" | "none").then_some(None);
    }
    let n = usize::try_from(value.as_i64()?).ok()?;
    Some((n > 0).then_some(n))
}
