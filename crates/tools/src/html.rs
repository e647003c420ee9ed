//! HTML text helpers shared by the search parser and the page fetcher.

use scraper::{ElementRef, Html, Selector};
use sleuth_core::search::FetchedPage;

/// Elements whose text never reaches the model.
const HIDDEN_ELEMENTS: [&str; 6] = ["script", "style", "header", "footer", "nav", "noscript"];

pub(crate) fn text_content(elem: ElementRef<'_>) -> String {
    elem.text().collect::<Vec<_>>().join(" ")
}

pub(crate) fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = compact_ws(&text_content(document.select(&sel).next()?));
    (!text.is_empty()).then_some(text)
}

fn meta_description(document: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[name="description"]"#).ok()?;
    let content = document.select(&sel).next()?.value().attr("content")?;
    let content = compact_ws(content);
    (!content.is_empty()).then_some(content)
}

/// Text of `root` minus anything inside a hidden element.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            let t: &str = text;
            parts.push(t);
        }
    }
    compact_ws(&parts.join(" "))
}

/// Extract title, meta description and readable body text from a page.
pub fn parse_html(html: &str) -> FetchedPage {
    let document = Html::parse_document(html);

    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    let text = match body {
        Some(body) => visible_text(body),
        None => visible_text(document.root_element()),
    };

    FetchedPage {
        title: first_text(&document, "title"),
        description: meta_description(&document),
        text,
    }
}
