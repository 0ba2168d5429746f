//! Device setting key conventions.
//!
//! Tags are ordinary device settings whose key carries the `tag.` prefix.

use kosh_api_models::DeviceSettings;

/// Key prefix that marks a setting as a tag.
pub const TAG_PREFIX: &str = "tag.";

/// Setting key for tag `name`, adding the prefix when missing.
#[must_use]
pub fn tag_key(name: &str) -> String {
    if name.starts_with(TAG_PREFIX) {
        name.to_string()
    } else {
        format!("{TAG_PREFIX}{name}")
    }
}

/// Returns `true` when `key` names a tag.
#[must_use]
pub fn is_tag(key: &str) -> bool {
    key.starts_with(TAG_PREFIX)
}

/// Split a settings map into plain settings and tags; tag keys lose their
/// prefix.
#[must_use]
pub fn split_settings(settings: DeviceSettings) -> (DeviceSettings, DeviceSettings) {
    let mut plain = DeviceSettings::new();
    let mut tags = DeviceSettings::new();
    for (key, value) in settings {
        match key.strip_prefix(TAG_PREFIX) {
            Some(tag) => {
                tags.insert(tag.to_string(), value);
            }
            None => {
                plain.insert(key, value);
            }
        }
    }
    (plain, tags)
}
