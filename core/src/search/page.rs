//! Page text extraction for fetched search hits.

use scraper::{Html, Selector};

/// Maximum characters of page text handed on per search hit
pub const MAX_PAGE_CHARS: usize = 10_000;

/// Flatten an HTML page to a single line of plain text.
///
/// Script, style and noscript content is removed first. The result has no runs of
/// whitespace and is at most `max_chars` characters long.
pub fn clean_html(html: &str, max_chars: usize) -> String {
    let mut document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("script, style, noscript") {
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let text = html2text::from_read(document.html().as_bytes(), 100);

    let joined = text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_styles() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script>var secret = "tracking";</script></head>
            <body><h1>Rainfall</h1><p>Seattle   gets
            rain.</p><noscript>enable js</noscript></body></html>"#;

        let text = clean_html(html, MAX_PAGE_CHARS);

        assert!(text.contains("Rainfall"));
        assert!(text.contains("Seattle gets rain."));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
        assert!(!text.contains("enable js"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn truncates_to_limit() {
        let body = "word ".repeat(5_000);
        let html = format!("<html><body><p>{body}</p></body></html>");

        let text = clean_html(&html, MAX_PAGE_CHARS);

        assert_eq!(text.chars().count(), MAX_PAGE_CHARS);
    }
}
