//! Positional tree queries over a parsed HTML document.
//!
//! Every path is a sequence of `(element name, 1-based position)` steps over
//! element children only, mirroring `div[2]/span[1]` style selectors.

use scraper::ElementRef;

use super::error::{Location, ParseError};

/// One child-position step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    name: &'static str,
    position: usize,
}

/// Creates a step selecting the `position`-th (1-based) `name` child.
pub const fn step(name: &'static str, position: usize) -> Step {
    Step { name, position }
}

/// A named path; the name is reported when a required node is missing.
#[derive(Debug, Clone, Copy)]
pub struct NodePath {
    /// Human-readable node name.
    pub name: &'static str,
    /// Steps from the query origin.
    pub steps: &'static [Step],
}

/// Iterates the element children of `parent` named `name`.
pub fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

/// Resolves `steps` from `from`, returning `None` at the first missing step.
pub fn resolve<'a>(from: ElementRef<'a>, steps: &[Step]) -> Option<ElementRef<'a>> {
    steps.iter().try_fold(from, |node, s| {
        child_elements(node, s.name).nth(s.position.checked_sub(1)?)
    })
}

/// Resolves a required path, converting absence into a [`ParseError`].
pub fn require<'a>(
    from: ElementRef<'a>,
    path: &NodePath,
    location: Location,
) -> Result<ElementRef<'a>, ParseError> {
    resolve(from, path.steps).ok_or_else(|| ParseError::missing(location, path.name))
}

/// Concatenated descendant text.
pub fn inner_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Descendant text with surrounding whitespace removed.
pub fn trimmed_text(el: ElementRef<'_>) -> String {
    inner_text(el).trim().to_owned()
}

/// Rows of a table, whether or not the parser wrapped them in a section.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(child_elements(child, "tr")),
            _ => {}
        }
    }
    rows
}

/// Maps blank text to `None`.
pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}
