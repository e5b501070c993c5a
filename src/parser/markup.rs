//! Thin query layer over `scraper`: selector lookups plus text/attribute reads.

use scraper::{ElementRef, Html, Selector};

/// Parse a selector known at compile time.
pub fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

pub fn first<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

pub fn all<'a>(scope: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    scope.select(selector).collect()
}

pub fn doc_first<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

pub fn doc_all<'a>(doc: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    doc.select(selector).collect()
}

/// All descendant text, whitespace-collapsed and trimmed.
pub fn text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the element's direct text nodes only, ignoring child elements.
pub fn own_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|n| n.value().as_text())
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
