//! Tag handle expansion and resolution against a document's directives.

use std::collections::HashMap;

use garnet_scanner::{Marker, ScanError, ScanErrorKind, YamlVersion};

/// The default prefix the secondary handle (`!!`) expands to.
const CORE_SCHEMA_PREFIX: &str = "tag:yaml.org,2002:";

/// The directives of a single document.
///
/// Each of the YAML version, the primary handle prefix, the secondary handle
/// prefix and every named handle may be registered at most once per
/// document.
#[derive(Clone, Debug, Default)]
pub(crate) struct DirectiveSet {
    version: Option<YamlVersion>,
    primary: Option<String>,
    secondary: Option<String>,
    named: HashMap<String, String>,
}

impl DirectiveSet {
    pub(crate) fn new() -> DirectiveSet {
        DirectiveSet::default()
    }

    /// The declared version, or the default 1.2.
    pub(crate) fn version(&self) -> YamlVersion {
        self.version.unwrap_or_default()
    }

    /// Register the `%YAML` directive.
    pub(crate) fn set_version(&mut self, version: YamlVersion, mark: Marker) -> Result<(), ScanError> {
        if self.version.is_some() {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "YAML version cannot be specified more than once.",
            ));
        }
        self.version = Some(version);
        Ok(())
    }

    /// Register a `%TAG` directive.
    pub(crate) fn set_handle(
        &mut self,
        handle: String,
        prefix: String,
        mark: Marker,
    ) -> Result<(), ScanError> {
        match handle.as_str() {
            "!" => {
                if self.primary.is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "Primary handle cannot be specified more than once.",
                    ));
                }
                self.primary = Some(prefix);
            }
            "!!" => {
                if self.secondary.is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "Secondary handle cannot be specified more than once.",
                    ));
                }
                self.secondary = Some(prefix);
            }
            _ => {
                if self.named.insert(handle, prefix).is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "The same named handle cannot be specified more than once.",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The kind a tag resolves to once its handle has been expanded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum TagKind {
    Null,
    Boolean,
    Integer,
    FloatingPoint,
    String,
    Sequence,
    Mapping,
    /// The lone `!`; resolves to a string for scalars, and leaves the kind
    /// of collections to their shape.
    NonSpecific,
    /// Any tag outside the core schema; kept verbatim on the node.
    Custom,
}

/// Expand the tag's handle through the directive set and classify it.
pub(crate) fn resolve_tag(
    text: &str,
    directives: &DirectiveSet,
    mark: Marker,
) -> Result<TagKind, ScanError> {
    if text == "!" {
        return Ok(TagKind::NonSpecific);
    }

    let expanded = if let Some(uri) = text.strip_prefix("!<") {
        // Verbatim tags are used as-is.
        uri.strip_suffix('>').unwrap_or(uri).to_owned()
    } else if let Some(suffix) = text.strip_prefix("!!") {
        let prefix = directives.secondary.as_deref().unwrap_or(CORE_SCHEMA_PREFIX);
        format!("{prefix}{suffix}")
    } else if let Some(handle_end) = text[1..].find('!') {
        let handle = &text[..handle_end + 2];
        let suffix = &text[handle_end + 2..];
        match directives.named.get(handle) {
            Some(prefix) => format!("{prefix}{suffix}"),
            None => {
                return Err(ScanError::new(
                    ScanErrorKind::Parse,
                    mark,
                    format!("tag handle {handle} has not been registered with a TAG directive."),
                ));
            }
        }
    } else {
        let suffix = &text[1..];
        let prefix = directives.primary.as_deref().unwrap_or("!");
        format!("{prefix}{suffix}")
    };

    Ok(match expanded.strip_prefix(CORE_SCHEMA_PREFIX) {
        Some("null") => TagKind::Null,
        Some("bool") => TagKind::Boolean,
        Some("int") => TagKind::Integer,
        Some("float") => TagKind::FloatingPoint,
        Some("str") => TagKind::String,
        Some("seq") => TagKind::Sequence,
        Some("map") => TagKind::Mapping,
        _ => TagKind::Custom,
    })
}

#[cfg(test)]
mod test {
    use super::{resolve_tag, DirectiveSet, TagKind};
    use garnet_scanner::Marker;

    fn resolve(text: &str, directives: &DirectiveSet) -> TagKind {
        resolve_tag(text, directives, Marker::default()).unwrap()
    }

    #[test]
    fn test_core_schema_tags() {
        let empty = DirectiveSet::new();
        assert_eq!(resolve("!!str", &empty), TagKind::String);
        assert_eq!(resolve("!!int", &empty), TagKind::Integer);
        assert_eq!(resolve("!!map", &empty), TagKind::Mapping);
        assert_eq!(resolve("!<tag:yaml.org,2002:seq>", &empty), TagKind::Sequence);
        assert_eq!(resolve("!", &empty), TagKind::NonSpecific);
        assert_eq!(resolve("!local", &empty), TagKind::Custom);
    }

    #[test]
    fn test_named_handle() {
        let mut directives = DirectiveSet::new();
        directives
            .set_handle("!e!".to_owned(), "tag:yaml.org,2002:".to_owned(), Marker::default())
            .unwrap();
        assert_eq!(resolve("!e!bool", &directives), TagKind::Boolean);
        assert!(resolve_tag("!f!bool", &directives, Marker::default()).is_err());
    }

    #[test]
    fn test_rebound_secondary_handle() {
        let mut directives = DirectiveSet::new();
        directives
            .set_handle("!!".to_owned(), "tag:example.com,2000:".to_owned(), Marker::default())
            .unwrap();
        // `!!str` no longer points into the core schema.
        assert_eq!(resolve("!!str", &directives), TagKind::Custom);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut directives = DirectiveSet::new();
        let mark = Marker::default();
        directives.set_handle("!".to_owned(), "!a-".to_owned(), mark).unwrap();
        assert!(directives.set_handle("!".to_owned(), "!b-".to_owned(), mark).is_err());
    }
}
