//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the engines and
//! the REST layer, so request handling never reads process-wide environment variables.
//! The `*_from_env_value` helpers take the raw `Option<String>` from `std::env::var(..).ok()`
//! which keeps them testable without touching the real environment.

use crate::constants::DEFAULT_MAX_DISPLAY;
use crate::notifications::NotificationOptions;
use crate::validation::validate_max_display;
use crate::{HrpError, HrpResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    max_display: usize,
    notification_options: NotificationOptions,
}

impl CoreConfig {
    /// # Errors
    ///
    /// Returns `HrpError::InvalidInput` if `max_display` is zero.
    pub fn new(max_display: usize, notification_options: NotificationOptions) -> HrpResult<Self> {
        Ok(Self {
            max_display: validate_max_display(max_display)?,
            notification_options,
        })
    }

    pub fn max_display(&self) -> usize {
        self.max_display
    }

    pub fn notification_options(&self) -> NotificationOptions {
        self.notification_options
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_display: DEFAULT_MAX_DISPLAY,
            notification_options: NotificationOptions::default(),
        }
    }
}

/// Parse the display bound from an optional string value.
///
/// `None` or blank yields the default of 50.
pub fn max_display_from_env_value(value: Option<String>) -> HrpResult<usize> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_MAX_DISPLAY);
    };

    let parsed = value
        .parse::<usize>()
        .map_err(|_| HrpError::InvalidInput(format!("max_display is not a number: {value}")))?;
    validate_max_display(parsed)
}

/// Parse a boolean switch such as `HRP_NOTIFY_STATUS_CHANGES`.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case. `None` or blank yields
/// `default`.
pub fn flag_from_env_value(name: &str, value: Option<String>, default: bool) -> HrpResult<bool> {
    let Some(value) = value.map(|v| v.trim().to_ascii_lowercase()).filter(|v| !v.is_empty())
    else {
        return Ok(default);
    };

    match value.as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(HrpError::InvalidInput(format!(
            "{name} must be a boolean, got {value}"
        ))),
    }
}

/// Build notification options from the `HRP_NOTIFY_*` switches.
pub fn notification_options_from_env_values(
    enabled: Option<String>,
    notify_new_patients: Option<String>,
    notify_status_changes: Option<String>,
) -> HrpResult<NotificationOptions> {
    let defaults = NotificationOptions::default();
    Ok(NotificationOptions {
        enabled: flag_from_env_value("HRP_NOTIFICATIONS_ENABLED", enabled, defaults.enabled)?,
        notify_new_patients: flag_from_env_value(
            "HRP_NOTIFY_NEW_PATIENTS",
            notify_new_patients,
            defaults.notify_new_patients,
        )?,
        notify_status_changes: flag_from_env_value(
            "HRP_NOTIFY_STATUS_CHANGES",
            notify_status_changes,
            defaults.notify_status_changes,
        )?,
        auto_mark_as_read: defaults.auto_mark_as_read,
    })
}
