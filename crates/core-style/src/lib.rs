//! Syntax-style table: dotted-group style lookup with cascading fallback
//! (spec §4.x), plus a small overlay-span layer for cursor/selection
//! decorations that ride on top of whatever the table resolves.
//!
//! A `StyleDefinition` is intentionally all-`Option` fields: a group entry
//! only overrides what it sets, and [`StyleSheet::resolve`] cascades from
//! `default` through each dot-separated prefix of the group name up to the
//! full name, letting e.g. `"markup.heading"` fill in color while leaving
//! `"markup.heading.1"` to add `bold` on top.

mod overlay;

pub use overlay::{OverlayAttr, OverlaySpan, OverlayLayer};

use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Rgb(u8, u8, u8),
    Indexed(u8),
    Default,
}

/// A single style group's attributes. Every field is independently
/// optional so fallback can merge field-by-field rather than all-or-
/// nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleDefinition {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub dim: Option<bool>,
}

impl StyleDefinition {
    /// Overlays `other`'s set fields on top of `self`, with `other` taking
    /// precedence — used to cascade from less specific to more specific
    /// groups.
    fn overlay(mut self, other: &StyleDefinition) -> Self {
        if other.fg.is_some() {
            self.fg = other.fg;
        }
        if other.bg.is_some() {
            self.bg = other.bg;
        }
        if other.bold.is_some() {
            self.bold = other.bold;
        }
        if other.italic.is_some() {
            self.italic = other.italic;
        }
        if other.underline.is_some() {
            self.underline = other.underline;
        }
        if other.dim.is_some() {
            self.dim = other.dim;
        }
        self
    }
}

/// Table of dotted-group style definitions with a `default` fallback.
#[derive(Debug, Default)]
pub struct StyleSheet {
    default: StyleDefinition,
    groups: AHashMap<String, StyleDefinition>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, def: StyleDefinition) -> Self {
        self.default = def;
        self
    }

    pub fn set(&mut self, group: impl Into<String>, def: StyleDefinition) {
        self.groups.insert(group.into(), def);
    }

    /// Resolves `group` by cascading `default -> "a" -> "a.b" -> "a.b.c"`,
    /// each prefix's set fields overriding the ones before it. A group
    /// with no matching entries at all just returns `default`.
    pub fn resolve(&self, group: &str) -> StyleDefinition {
        let mut resolved = self.default;
        for (i, _) in group.match_indices('.') {
            if let Some(def) = self.groups.get(&group[..i]) {
                resolved = resolved.overlay(def);
            }
        }
        if let Some(def) = self.groups.get(group) {
            resolved = resolved.overlay(def);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_through_dotted_prefixes() {
        let mut sheet = StyleSheet::new().with_default(StyleDefinition {
            fg: Some(Color::Indexed(7)),
            ..Default::default()
        });
        sheet.set(
            "markup",
            StyleDefinition {
                bold: Some(false),
                ..Default::default()
            },
        );
        sheet.set(
            "markup.heading",
            StyleDefinition {
                bold: Some(true),
                fg: Some(Color::Rgb(255, 0, 0)),
                ..Default::default()
            },
        );

        let resolved = sheet.resolve("markup.heading.1");
        assert_eq!(resolved.fg, Some(Color::Rgb(255, 0, 0)));
        assert_eq!(resolved.bold, Some(true));
    }

    #[test]
    fn resolve_with_no_entries_returns_default() {
        let sheet = StyleSheet::new().with_default(StyleDefinition {
            dim: Some(true),
            ..Default::default()
        });
        assert_eq!(sheet.resolve("nothing.here").dim, Some(true));
    }

    #[test]
    fn more_specific_group_overrides_less_specific_on_shared_fields() {
        let mut sheet = StyleSheet::new();
        sheet.set(
            "a",
            StyleDefinition {
                fg: Some(Color::Indexed(1)),
                bold: Some(true),
                ..Default::default()
            },
        );
        sheet.set(
            "a.b",
            StyleDefinition {
                fg: Some(Color::Indexed(2)),
                ..Default::default()
            },
        );
        let resolved = sheet.resolve("a.b");
        assert_eq!(resolved.fg, Some(Color::Indexed(2)));
        assert_eq!(resolved.bold, Some(true));
    }
}
