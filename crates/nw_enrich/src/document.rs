use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};

lazy_static! {
    /// Class/id fragments publishers actually use around publish dates.
    static ref DATED_ATTR: Regex =
        Regex::new(r"(?i)date|time|datetime|published|the-date|cal").unwrap();
}

/// Parsed HTML page. The extractors are pure reads over this; all I/O stays
/// in the fetcher.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Trimmed text of the first element matching `css`, if non-empty.
    pub fn first_text(&self, css: &str) -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        self.html.select(&selector).find_map(|el| {
            let text = el.text().collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    /// `content` of the first meta tag carrying the given `property`.
    pub fn meta_property(&self, property: &str) -> Option<String> {
        let selector = Selector::parse("meta").unwrap();
        self.html
            .select(&selector)
            .filter(|el| el.value().attr("property") == Some(property))
            .find_map(|el| {
                let content = el.value().attr("content")?.trim();
                (!content.is_empty()).then(|| content.to_string())
            })
    }

    /// Trimmed text of the first element whose class or id attribute looks
    /// date-ish.
    pub fn first_dated_text(&self) -> Option<String> {
        let selector = Selector::parse("*").unwrap();
        for el in self.html.select(&selector) {
            let attrs = el.value();
            let dated = attrs.attr("class").map_or(false, |c| DATED_ATTR.is_match(c))
                || attrs.attr("id").map_or(false, |i| DATED_ATTR.is_match(i));
            if dated {
                let text = el.text().collect::<String>();
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        None
    }

    /// Every text node in the document, concatenated.
    pub fn full_text(&self) -> String {
        self.html.root_element().text().collect()
    }
}
