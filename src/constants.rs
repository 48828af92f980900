// Static values for the assistant. Runtime overrides come from the environment
// (or .env) through clap, see config.rs.

use std::env;

/// Reference documentation for the Geotab GO9 telematics device.
pub const URL_GO9: &str = "https://www.geotab.com/es/go9-support-document/";
/// Reference documentation for the GO Focus / Focus Plus camera devices.
pub const URL_FOCUS: &str = "https://support.geotab.com/camera-devices/doc/go-focus-plus-new";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_PORT: u16 = 9900;
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 1;

pub const APP_TITLE: &str = "Support Geotab";
pub const APP_CAPTION: &str = "AI Technical Support Assistant - GO9 & GO Focus";
pub const SOURCE_ATTRIBUTION: &str = "Source: Official Geotab Documentation";
pub const INPUT_PLACEHOLDER: &str = "E.g.: What do the red, green, and blue LEDs mean?";

/// Appended to partial text while an answer is being revealed.
pub const REVEAL_CURSOR: &str = "▌";

// Asset locations are resolved relative to the working directory unless overridden.
lazy_static::lazy_static! {
    pub static ref TEMPLATES_DIR: String = env::var("GEOTAB_SUPPORT_TEMPLATES").unwrap_or_else(|_| "templates".to_string());
    pub static ref STATIC_DIR: String = env::var("GEOTAB_SUPPORT_STATIC").unwrap_or_else(|_| "static".to_string());
}
