//! A minimal HTML tokenizer for test fixtures.

use crate::html::{AttributeSet, HtmlTokenizer, TagEvent};

/// Fixture-grade tokenizer.
///
/// Handles tags, quoted and bare attributes, flag attributes, comments,
/// and self-closing tags — enough for controlled test documents. It is not
/// an HTML5 tokenizer and makes no attempt at error recovery; production
/// callers supply their own tokenizer collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl HtmlTokenizer for SimpleTokenizer {
    fn tokenize<'a>(&'a self, document: &'a str) -> Box<dyn Iterator<Item = TagEvent> + 'a> {
        Box::new(tokenize(document).into_iter())
    }
}

fn tokenize(document: &str) -> Vec<TagEvent> {
    let mut events = Vec::new();
    let mut index = 0;
    while index < document.len() {
        let rest = &document[index..];
        if let Some(after_comment) = rest.strip_prefix("<!--") {
            index += after_comment
                .find("-->")
                .map_or(rest.len(), |end| 4 + end + 3);
            continue;
        }
        if let Some(close) = rest.strip_prefix("</") {
            let Some(end) = close.find('>') else {
                break;
            };
            events.push(TagEvent::Close {
                name: close[..end].trim().to_ascii_lowercase(),
            });
            index += 2 + end + 1;
            continue;
        }
        if let Some(open) = rest.strip_prefix('<') {
            let Some(end) = open.find('>') else {
                break;
            };
            let inner = open[..end].trim().trim_end_matches('/').trim();
            if !inner.is_empty() && !inner.starts_with('!') {
                let (name, attr_text) = match inner.find(char::is_whitespace) {
                    Some(split) => (&inner[..split], &inner[split..]),
                    None => (inner, ""),
                };
                events.push(TagEvent::Open {
                    name: name.to_ascii_lowercase(),
                    attributes: parse_attributes(attr_text),
                });
            }
            index += 1 + end + 1;
            continue;
        }
        let c = rest.chars().next().unwrap_or('\u{0}');
        events.push(TagEvent::Text(c));
        index += c.len_utf8().max(1);
    }
    events.push(TagEvent::End);
    events
}

fn parse_attributes(text: &str) -> AttributeSet {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        // Attribute name runs to whitespace or '='.
        let mut name_end = text.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                name_end = i;
                break;
            }
            chars.next();
            name_end = text.len();
        }
        let name = text[start..name_end].to_string();
        // Skip whitespace before a possible '='.
        while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_some_and(|&(_, c)| c == '=') {
            chars.next();
            while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
                chars.next();
            }
            let value = match chars.peek().copied() {
                Some((value_start, quote @ ('"' | '\''))) => {
                    chars.next();
                    let mut value_end = text.len();
                    for (i, c) in chars.by_ref() {
                        if c == quote {
                            value_end = i;
                            break;
                        }
                    }
                    text[value_start + 1..value_end].to_string()
                }
                Some((value_start, _)) => {
                    let mut value_end = text.len();
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_whitespace() {
                            value_end = i;
                            break;
                        }
                        chars.next();
                        value_end = text.len();
                    }
                    text[value_start..value_end].to_string()
                }
                None => String::new(),
            };
            pairs.push((name, value));
        } else {
            // Flag attribute (selected, checked, multiple).
            pairs.push((name, String::new()));
        }
    }
    AttributeSet::from_pairs(pairs)
}
