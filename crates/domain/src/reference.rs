//! Tagged entity references embedded in narrative prose.
//!
//! Narratives reference entities as `[entity_key:display text]`. The key
//! matches `[a-z0-9_]+`; the display text is anything up to the closing
//! bracket. Parsed manually to avoid a regex dependency in the domain layer.

use serde::{Deserialize, Serialize};

use crate::keys::is_valid_key;

/// One parsed `[key:display]` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedRef {
    pub key: String,
    pub display: String,
    /// Byte offset of the opening bracket in the source text.
    pub offset: usize,
}

/// Extract every well-formed `[key:display]` tag from `text`.
///
/// Malformed brackets (bad key, missing colon, unclosed) are skipped, not
/// errors; the narrative validator reports them separately.
pub fn parse_refs(text: &str) -> Vec<TaggedRef> {
    let bytes = text.as_bytes();
    let mut refs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }
        let start = i;
        // Scan the key up to ':'.
        let mut j = i + 1;
        while j < bytes.len()
            && (bytes[j].is_ascii_lowercase() || bytes[j].is_ascii_digit() || bytes[j] == b'_')
        {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b':' || j == i + 1 {
            i += 1;
            continue;
        }
        let key_end = j;
        // Scan display text up to ']'.
        let mut k = j + 1;
        while k < bytes.len() && bytes[k] != b']' {
            k += 1;
        }
        if k >= bytes.len() || k == j + 1 {
            i += 1;
            continue;
        }

        let key = &text[start + 1..key_end];
        if is_valid_key(key) {
            refs.push(TaggedRef {
                key: key.to_string(),
                display: text[key_end + 1..k].to_string(),
                offset: start,
            });
            i = k + 1;
        } else {
            i += 1;
        }
    }

    refs
}

/// Replace every `[key:display]` tag with its display text.
pub fn strip_refs(text: &str) -> String {
    let refs = parse_refs(text);
    if refs.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for tag in &refs {
        out.push_str(&text[cursor..tag.offset]);
        out.push_str(&tag.display);
        // offset + '[' + key + ':' + display + ']'
        cursor = tag.offset + 1 + tag.key.len() + 1 + tag.display.len() + 1;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Whether the text still contains any well-formed tag.
pub fn contains_refs(text: &str) -> bool {
    !parse_refs(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_ref() {
        let refs = parse_refs("[bartender_001:Marcus] nods.");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].key, "bartender_001");
        assert_eq!(refs[0].display, "Marcus");
        assert_eq!(refs[0].offset, 0);
    }

    #[test]
    fn test_parse_multiple_refs() {
        let refs = parse_refs("[guard_01:The guard] eyes [rusty_key:the key].");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].key, "guard_01");
        assert_eq!(refs[1].key, "rusty_key");
        assert_eq!(refs[1].display, "the key");
    }

    #[test]
    fn test_malformed_refs_skipped() {
        assert!(parse_refs("[Bad Key:text]").is_empty());
        assert!(parse_refs("[no_colon]").is_empty());
        assert!(parse_refs("[unclosed:text").is_empty());
        assert!(parse_refs("[:empty]").is_empty());
        assert!(parse_refs("[key:]").is_empty());
    }

    #[test]
    fn test_strip_refs() {
        let stripped = strip_refs("[bartender_001:Marcus] nods at [door_main:the oak door].");
        assert_eq!(stripped, "Marcus nods at the oak door.");
    }

    #[test]
    fn test_strip_leaves_plain_text() {
        let text = "Nothing tagged here [just brackets].";
        assert_eq!(strip_refs(text), text);
    }

    #[test]
    fn test_strip_never_leaves_tags() {
        let stripped = strip_refs("[a_1:x][b_2:y] and [c_3:z]");
        assert!(!contains_refs(&stripped));
        assert_eq!(stripped, "xy and z");
    }

    #[test]
    fn test_display_may_contain_brackets_open() {
        let refs = parse_refs("[key_1:text [with open]");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].display, "text [with open");
    }
}
