//! Rendered-page snapshot and the DOM helpers shared by every heuristic.
//!
//! A [`RenderedPage`] is what a session hands back after navigation: the
//! serialized DOM plus whatever the browser measured (image geometry, visible
//! text). Static markup fetched over plain HTTP produces the same type with
//! the measured parts left empty, and the helpers here derive approximations
//! from the markup instead.

use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;

/// An `<img>` as laid out by the browser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageInfo {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl ImageInfo {
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Final URL of the document.
    pub url: String,
    pub html: String,
    /// Rendered image geometry; `None` for unrendered markup.
    pub images: Option<Vec<ImageInfo>>,
    /// `document.body.innerText`; `None` for unrendered markup.
    pub body_text: Option<String>,
}

impl RenderedPage {
    /// Wraps markup that was never rendered by a browser.
    #[must_use]
    pub fn from_markup(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            images: None,
            body_text: None,
        }
    }

    /// Lowercased host of the page URL, if it parses.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }

    /// Resolves `href` against the page URL. Absolute URLs pass through.
    #[must_use]
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with("data:") || href.starts_with("javascript:") {
            return None;
        }
        match Url::parse(href) {
            Ok(url) => Some(url.to_string()),
            Err(_) => Url::parse(&self.url)
                .ok()?
                .join(href)
                .ok()
                .map(|u| u.to_string()),
        }
    }

    /// Measured images, or `<img>` tags with their declared `width`/`height`
    /// attributes when the page was not rendered.
    #[must_use]
    pub fn image_infos(&self, document: &Html) -> Vec<ImageInfo> {
        if let Some(images) = &self.images {
            return images.clone();
        }
        let Some(img) = parse_selector("img") else {
            return Vec::new();
        };
        document
            .select(&img)
            .filter_map(|el| {
                let src = self.absolutize(el.value().attr("src")?)?;
                Some(ImageInfo {
                    src,
                    alt: el.value().attr("alt").unwrap_or_default().to_string(),
                    width: dimension(el, "width"),
                    height: dimension(el, "height"),
                })
            })
            .collect()
    }

    /// Visible body text, derived from text nodes for unrendered markup.
    #[must_use]
    pub fn visible_text(&self, document: &Html) -> String {
        if let Some(text) = &self.body_text {
            return text.clone();
        }
        let root = parse_selector("body")
            .and_then(|body| document.select(&body).next())
            .unwrap_or_else(|| document.root_element());
        block_text(root)
    }
}

fn dimension(el: ElementRef<'_>, attr: &str) -> f64 {
    el.value()
        .attr(attr)
        .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parses a CSS selector, logging and skipping ones the engine can't handle.
#[must_use]
pub fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(selector = raw, error = %e, "skipping unparseable selector");
            None
        }
    }
}

/// `textContent` with whitespace runs collapsed and the ends trimmed.
#[must_use]
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of `el` with one line per non-empty text node, skipping script and
/// style content.
#[must_use]
pub fn block_text(el: ElementRef<'_>) -> String {
    el.descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value().as_element().is_some_and(|e| {
                        matches!(e.name(), "script" | "style" | "noscript" | "template")
                    })
                });
                (!hidden).then(|| text.trim().to_string())
            }
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nearest element, starting with `el` itself, that matches `selector`.
#[must_use]
pub fn closest<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| selector.matches(candidate))
}

/// Lowercased value of `attr`, or an empty string.
#[must_use]
pub fn attr_lower(el: ElementRef<'_>, attr: &str) -> String {
    el.value().attr(attr).unwrap_or_default().to_lowercase()
}
