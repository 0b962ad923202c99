//! HTML-subset markup parser.
//!
//! Produces a plain element tree that the runtime mounts. Supports
//! elements, quoted/unquoted/boolean attributes, text, comments, void
//! elements, self-closing tags and implicit closing of unclosed elements.

use crate::error::{ParseError, ParseResult};
use serde::{Deserialize, Serialize};

/// A node of parsed markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MarkupNode {
    Element(MarkupElement),
    Text { content: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupElement {
    pub tag: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
    /// Byte offset of the opening `<`
    pub start: usize,
}

impl MarkupElement {
    fn new(tag: String, start: usize) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
            start,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}

struct MarkupParser<'src> {
    source: &'src str,
    pos: usize,
}

impl<'src> MarkupParser<'src> {
    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.bump();
        }
        &self.source[start..self.pos]
    }

    fn parse(mut self) -> ParseResult<Vec<MarkupNode>> {
        let mut roots: Vec<MarkupNode> = Vec::new();
        let mut stack: Vec<MarkupElement> = Vec::new();

        while self.pos < self.source.len() {
            if self.rest().starts_with("<!--") {
                let start = self.pos;
                match self.rest().find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => return Err(ParseError::invalid_syntax(start, "unterminated comment")),
                }
            } else if self.rest().starts_with("</") {
                let start = self.pos;
                self.pos += 2;
                let tag = self.take_while(|c| !c.is_whitespace() && c != '>').to_ascii_lowercase();
                self.skip_whitespace();
                if self.bump() != Some('>') {
                    return Err(ParseError::unexpected_eof(self.source.len()));
                }

                if !stack.iter().any(|el| el.tag == tag) {
                    return Err(ParseError::invalid_syntax(
                        start,
                        format!("closing tag </{}> has no matching open element", tag),
                    ));
                }

                // Implicitly close anything left open inside the matching element
                while let Some(element) = stack.pop() {
                    let done = element.tag == tag;
                    attach(&mut stack, &mut roots, MarkupNode::Element(element));
                    if done {
                        break;
                    }
                }
            } else if self.rest().starts_with('<') {
                let (element, self_closing) = self.parse_open_tag()?;
                if self_closing || is_void_element(&element.tag) {
                    attach(&mut stack, &mut roots, MarkupNode::Element(element));
                } else {
                    stack.push(element);
                }
            } else {
                let text = self.take_while(|c| c != '<');
                if !text.trim().is_empty() {
                    attach(
                        &mut stack,
                        &mut roots,
                        MarkupNode::Text {
                            content: text.trim().to_string(),
                        },
                    );
                }
            }
        }

        // Unclosed elements are closed at end of input
        while let Some(element) = stack.pop() {
            attach(&mut stack, &mut roots, MarkupNode::Element(element));
        }

        Ok(roots)
    }

    fn parse_open_tag(&mut self) -> ParseResult<(MarkupElement, bool)> {
        let start = self.pos;
        self.bump(); // '<'

        let tag = self
            .take_while(|c| c.is_ascii_alphanumeric() || c == '-')
            .to_ascii_lowercase();
        if tag.is_empty() {
            return Err(ParseError::invalid_syntax(start, "expected tag name after '<'"));
        }

        let mut element = MarkupElement::new(tag, start);

        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None => return Err(ParseError::unexpected_eof(self.source.len())),
                Some('>') => {
                    self.bump();
                    return Ok((element, false));
                }
                Some('/') => {
                    self.bump();
                    if self.bump() != Some('>') {
                        return Err(ParseError::invalid_syntax(self.pos, "expected '>' after '/'"));
                    }
                    return Ok((element, true));
                }
                Some(_) => {
                    let name_start = self.pos;
                    let name = self
                        .take_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\''));
                    if name.is_empty() {
                        return Err(ParseError::invalid_syntax(name_start, "expected attribute name"));
                    }
                    let name = name.to_string();

                    self.skip_whitespace();
                    let value = if self.peek_char() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.parse_attribute_value()?
                    } else {
                        String::new()
                    };

                    element.attributes.push((name, value));
                }
            }
        }
    }

    fn parse_attribute_value(&mut self) -> ParseResult<String> {
        match self.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                let start = self.pos;
                self.bump();
                let value = self.take_while(|c| c != quote).to_string();
                if self.bump() != Some(quote) {
                    return Err(ParseError::invalid_syntax(start, "unterminated attribute value"));
                }
                Ok(decode_entities(&value))
            }
            Some(_) => Ok(self
                .take_while(|c| !c.is_whitespace() && c != '>')
                .to_string()),
            None => Err(ParseError::unexpected_eof(self.source.len())),
        }
    }
}

fn attach(stack: &mut [MarkupElement], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Parse a markup document into its root nodes
pub fn parse_markup(source: &str) -> ParseResult<Vec<MarkupNode>> {
    MarkupParser { source, pos: 0 }.parse()
}
