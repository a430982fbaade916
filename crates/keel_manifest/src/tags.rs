//! Resource tag rules.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{ManifestError, ManifestResult};

/// Tag key -> tag value.
pub type Tags = BTreeMap<String, String>;

/// Characters allowed in tag keys.
pub const TAG_KEY_PATTERN: &str = r"^[a-zA-Z0-9 +\-=._:/@]+$";
pub const TAG_KEY_MAX_LENGTH: usize = 127;
pub const TAG_VALUE_MAX_LENGTH: usize = 255;

/// Validate a set of tags, returning one message per violation.
///
/// `location` names where the tags were declared and is included in each message.
pub fn validate_tags(tags: &Tags, location: &str) -> Vec<String> {
    let key_pattern = Regex::new(TAG_KEY_PATTERN).ok();
    let mut errors = Vec::new();

    for (key, value) in tags {
        if key.chars().count() > TAG_KEY_MAX_LENGTH {
            errors.push(format!(
                "{}: Tag keys may contain a maximum of {} characters",
                location, TAG_KEY_MAX_LENGTH
            ));
        } else if !key_pattern.as_ref().map_or(false, |re| re.is_match(key)) {
            errors.push(format!(
                "{}: Tag key '{}' must be non-empty, consisting of numbers, letters, and some special characters (+ - = . _ : / @)",
                location, key
            ));
        }

        if value.is_empty() {
            errors.push(format!(
                "{}: Tag values must have at least 1 character",
                location
            ));
        } else if value.chars().count() > TAG_VALUE_MAX_LENGTH {
            errors.push(format!(
                "{}: Tag values may contain a maximum of {} characters",
                location, TAG_VALUE_MAX_LENGTH
            ));
        }
    }

    errors
}

/// Parse command-line tags of the form `key1=value1,key2=value2`.
pub fn parse_tag_args(arg: &str) -> ManifestResult<Tags> {
    let mut tags = Tags::new();
    if arg.trim().is_empty() {
        return Ok(tags);
    }

    for pair in arg.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ManifestError::InvalidTag(pair.to_string()))?;
        tags.insert(key.to_string(), value.to_string());
    }

    let errors = validate_tags(&tags, "-t");
    if !errors.is_empty() {
        return Err(ManifestError::InvalidTag(errors.join("; ")));
    }

    Ok(tags)
}
