//! Minimal selector language: `#id`, `.class`, `[attr]`, bare tag name.

use super::core::ElementData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selector {
    Id(String),
    Class(String),
    Attr(String),
    Tag(String),
}

impl Selector {
    pub(crate) fn parse(input: &str) -> Selector {
        let input = input.trim();
        if let Some(id) = input.strip_prefix('#') {
            return Selector::Id(id.to_string());
        }
        if let Some(class) = input.strip_prefix('.') {
            return Selector::Class(class.to_string());
        }
        if let Some(rest) = input.strip_prefix('[') {
            let attr = rest.strip_suffix(']').unwrap_or(rest);
            return Selector::Attr(attr.to_string());
        }
        Selector::Tag(input.to_string())
    }

    pub(crate) fn matches(&self, element: &ElementData) -> bool {
        match self {
            Selector::Id(id) => element.id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => element.classes.iter().any(|c| c == class),
            Selector::Attr(attr) => element.attributes.contains_key(attr),
            Selector::Tag(tag) => element.tag == *tag,
        }
    }
}
