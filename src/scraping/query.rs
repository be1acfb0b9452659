//! Structural queries over a markup snapshot.
//!
//! Pure and synchronous. `scraper::Html` is not `Send`, so documents are
//! parsed, read into owned values and dropped before the caller awaits again.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// All matches in document order. An unparseable selector matches nothing.
    pub fn select(&self, selector: &str) -> Vec<Node<'_>> {
        match parse_selector(selector) {
            Some(sel) => self.html.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn first(&self, selector: &str) -> Option<Node<'_>> {
        let sel = parse_selector(selector)?;
        self.html.select(&sel).next().map(Node)
    }

    /// Text of the first match, or `""`.
    pub fn first_text(&self, selector: &str) -> String {
        self.first(selector).map(|n| n.text()).unwrap_or_default()
    }

    pub fn exists(&self, selector: &str) -> bool {
        self.first(selector).is_some()
    }
}

/// An element inside a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a>(ElementRef<'a>);

impl<'a> Node<'a> {
    /// Descendant text, trimmed and with inner whitespace collapsed.
    pub fn text(&self) -> String {
        collapse_whitespace(&self.0.text().collect::<String>())
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0.value().attr(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.value().classes().any(|c| c == class)
    }

    pub fn select(&self, selector: &str) -> Vec<Node<'a>> {
        match parse_selector(selector) {
            Some(sel) => self.0.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn first(&self, selector: &str) -> Option<Node<'a>> {
        let sel = parse_selector(selector)?;
        self.0.select(&sel).next().map(Node)
    }

    /// Text of the first descendant match, or `""`.
    pub fn first_text(&self, selector: &str) -> String {
        self.first(selector).map(|n| n.text()).unwrap_or_default()
    }

    /// Attribute of the first descendant match, or `""`.
    pub fn first_attr(&self, selector: &str, name: &str) -> String {
        self.first(selector)
            .and_then(|n| n.attr(name))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Like [`Node::first_attr`], but also considers the node itself.
    pub fn self_or_first_attr(&self, selector: &str, name: &str) -> String {
        if let Some(sel) = parse_selector(selector) {
            if sel.matches(&self.0) {
                return self.attr(name).map(|v| v.trim().to_string()).unwrap_or_default();
            }
        }
        self.first_attr(selector, name)
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("unparseable selector {:?}: {:?}", selector, e);
            None
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
