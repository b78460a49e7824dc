use crate::document::Document;

/// Removes newlines, tabs, carriage returns and ASCII spaces. Lossy for
/// Latin-script text but deterministic, and CJK body text comes through
/// intact.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\n' | '\t' | '\r' | ' '))
        .collect()
}

/// Whole-document plain text, normalized. Empty output means the article
/// has no usable body and must be skipped, not summarized.
pub fn extract(doc: &Document) -> String {
    normalize(&doc.full_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a b\tc\nd\re"), "abcde");
        assert_eq!(normalize("半導体 の 記事\n本文"), "半導体の記事本文");
        assert_eq!(normalize(" \n\t\r "), "");
    }

    #[test]
    fn test_extract() {
        let doc = Document::parse("<html><body><p>記事 本文</p>\n<p>続き</p></body></html>");
        assert_eq!(extract(&doc), "記事本文続き");

        let empty = Document::parse("");
        assert_eq!(extract(&empty), "");
    }
}
