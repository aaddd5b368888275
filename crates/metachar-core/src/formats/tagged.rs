//! # Tagged Text
//!
//! Reader and writer for the angle-bracket markup used by sheet documents.
//!
//! The grammar is deliberately small:
//! - `<name>` opens an element, `</name>` closes it
//! - An element holds either text or a list of child elements, never both
//! - There are no attributes, escapes or self-closing tags
//!
//! Nesting deeper than `MAX_ELEMENT_DEPTH` is rejected as malformed.
//!
//! User text never contains `<` or `>` (see `sanitize_text`), so a leaf's
//! text runs verbatim up to the next `<`.

use crate::MetaCharError;
use crate::primitives::MAX_ELEMENT_DEPTH;

/// Body of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Leaf(String),
    Children(Vec<Element>),
}

/// A named element of a tagged-text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub content: Content,
}

impl Element {
    #[must_use]
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Content::Leaf(text.into()),
        }
    }

    /// Text of a leaf element.
    pub fn text(&self) -> Result<&str, MetaCharError> {
        match &self.content {
            Content::Leaf(text) => Ok(text),
            Content::Children(_) => Err(MetaCharError::CorruptField {
                field: self.name.clone(),
                value: "nested elements".to_string(),
            }),
        }
    }

    /// Child elements. A leaf holding only whitespace has none.
    pub fn children(&self) -> Result<&[Element], MetaCharError> {
        match &self.content {
            Content::Children(children) => Ok(children),
            Content::Leaf(text) if text.trim().is_empty() => Ok(&[]),
            Content::Leaf(_) => Err(MetaCharError::MalformedDocument(format!(
                "expected elements inside <{}>",
                self.name
            ))),
        }
    }
}

// =============================================================================
// READER
// =============================================================================

/// Parse a sequence of top-level elements.
pub fn parse_elements(input: &str) -> Result<Vec<Element>, MetaCharError> {
    let mut reader = Reader {
        input,
        pos: 0,
        depth: 0,
    };
    let mut elements = Vec::new();

    loop {
        let Some(offset) = input[reader.pos..].find('<') else {
            reader.expect_blank(input.len())?;
            return Ok(elements);
        };
        let lt = reader.pos.saturating_add(offset);
        reader.expect_blank(lt)?;

        if input[lt..].starts_with("</") {
            return Err(MetaCharError::MalformedDocument(format!(
                "unexpected closing tag at byte {lt}"
            )));
        }
        elements.push(reader.element(lt)?);
    }
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
    /// Elements currently open.
    depth: usize,
}

impl Reader<'_> {
    /// Read the element whose opening tag starts at `lt`.
    fn element(&mut self, lt: usize) -> Result<Element, MetaCharError> {
        if self.depth >= MAX_ELEMENT_DEPTH {
            return Err(MetaCharError::MalformedDocument(format!(
                "elements nested deeper than {MAX_ELEMENT_DEPTH} at byte {lt}"
            )));
        }
        let name = self.tag_name(lt.saturating_add(1))?;

        self.depth = self.depth.saturating_add(1);
        let content = self.content(&name, lt);
        self.depth = self.depth.saturating_sub(1);

        Ok(Element {
            name,
            content: content?,
        })
    }

    /// Read everything up to and including `</name>`.
    fn content(&mut self, name: &str, opened_at: usize) -> Result<Content, MetaCharError> {
        let start = self.pos;
        let mut children = Vec::new();

        loop {
            let Some(offset) = self.input[self.pos..].find('<') else {
                return Err(MetaCharError::MalformedDocument(format!(
                    "<{name}> opened at byte {opened_at} is never closed"
                )));
            };
            let lt = self.pos.saturating_add(offset);

            if self.input[lt..].starts_with("</") {
                let body_end = self.pos;
                let closing = self.tag_name(lt.saturating_add(2))?;
                if closing != name {
                    return Err(MetaCharError::MalformedDocument(format!(
                        "</{closing}> at byte {lt} does not close <{name}>"
                    )));
                }
                if children.is_empty() {
                    return Ok(Content::Leaf(self.input[start..lt].to_string()));
                }
                self.check_blank(body_end, lt, name)?;
                return Ok(Content::Children(children));
            }

            self.check_blank(self.pos, lt, name)?;
            children.push(self.element(lt)?);
        }
    }

    /// Read a tag name starting at `from` and move past its `>`.
    fn tag_name(&mut self, from: usize) -> Result<String, MetaCharError> {
        let rest = self.input.get(from..).unwrap_or("");
        let end = rest.find('>').ok_or_else(|| {
            MetaCharError::MalformedDocument(format!("unterminated tag at byte {from}"))
        })?;
        let name = &rest[..end];

        if name.is_empty() || name.contains('<') || name.chars().any(char::is_whitespace) {
            return Err(MetaCharError::MalformedDocument(format!(
                "invalid tag name {name:?} at byte {from}"
            )));
        }

        self.pos = from.saturating_add(end).saturating_add(1);
        Ok(name.to_string())
    }

    fn check_blank(&self, from: usize, to: usize, parent: &str) -> Result<(), MetaCharError> {
        if self.input.get(from..to).is_some_and(|text| text.trim().is_empty()) {
            Ok(())
        } else {
            Err(MetaCharError::MalformedDocument(format!(
                "text mixed with elements inside <{parent}> at byte {from}"
            )))
        }
    }

    fn expect_blank(&self, to: usize) -> Result<(), MetaCharError> {
        if self.input.get(self.pos..to).is_some_and(|text| text.trim().is_empty()) {
            Ok(())
        } else {
            Err(MetaCharError::MalformedDocument(format!(
                "text outside any element at byte {}",
                self.pos
            )))
        }
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// `<tag>value</tag>` on its own line.
pub fn write_leaf(out: &mut String, tag: &str, value: &str) {
    out.push_str(&format!("<{tag}>{value}</{tag}>\n"));
}

pub fn open_tag(out: &mut String, tag: &str) {
    out.push_str(&format!("<{tag}>\n"));
}

pub fn close_tag(out: &mut String, tag: &str) {
    out.push_str(&format!("</{tag}>\n"));
}
