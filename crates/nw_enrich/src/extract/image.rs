use crate::document::Document;

/// Top image: the `og:image` meta tag or nothing. Image absence is
/// non-fatal and there is no fallback beyond this tag.
pub fn extract(doc: &Document) -> Option<String> {
    doc.meta_property("og:image")
}
