//! Reduce raw page markup to clean, line-oriented text.
//!
//! Only the `<body>` subtree is read. Elements that never render as visible
//! text ([`SKIPPED_ELEMENTS`]) are dropped together with their contents, the
//! remaining text nodes are joined one per line, and whitespace is then
//! normalised by [`clean_text`].

use scraper::{ElementRef, Html, Node};

/// Elements whose contents never reach the extracted text.
pub const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extract the visible body text of `html`.
///
/// Deterministic and infallible: markup without body text yields `""`.
///
/// ```
/// use gleaner_web::normalize::normalize;
///
/// let html = "<html><body><script>x=1</script><p>Price: $10</p></body></html>";
/// assert_eq!(normalize(html), "Price: $10");
/// ```
pub fn normalize(html: &str) -> String {
    body_text(&Html::parse_document(html), html.len())
}

/// Body text and title of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    pub title: Option<String>,
    pub text: String,
}

/// [`normalize`] plus the document `<title>`, from a single parse of `html`.
///
/// ```
/// use gleaner_web::normalize::normalize_page;
///
/// let page = normalize_page("<title>Deals</title><p>Price: $10</p>");
/// assert_eq!(page.title.as_deref(), Some("Deals"));
/// assert_eq!(page.text, "Price: $10");
/// ```
pub fn normalize_page(html: &str) -> NormalizedPage {
    let document = Html::parse_document(html);
    NormalizedPage {
        title: title_text(&document),
        text: body_text(&document, html.len()),
    }
}

fn body_text(document: &Html, source_len: usize) -> String {
    let Some(body) = find_body(document) else {
        return String::new();
    };

    let mut joined = String::with_capacity(source_len / 4);
    for text in visible_text_nodes(body) {
        if !joined.is_empty() {
            joined.push('\n');
        }
        joined.push_str(text);
    }
    clean_text(&joined)
}

fn title_text(document: &Html) -> Option<String> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "title")
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

/// Normalise whitespace in already-extracted text.
///
/// Each line is trimmed with interior whitespace runs collapsed to one
/// space, runs of blank lines shrink to a single blank line, and leading and
/// trailing blank lines are removed.
///
/// ```
/// use gleaner_web::normalize::clean_text;
///
/// assert_eq!(clean_text("\n\n  a   b \n\n\n\n c\n\n"), "a b\n\nc");
/// ```
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_blank = false;

    for line in raw.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&line);
    }

    out
}

fn find_body(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
}

/// Trimmed text nodes under `body` that are not inside a skipped element and
/// carry something other than whitespace.
fn visible_text_nodes(body: ElementRef<'_>) -> impl Iterator<Item = &str> {
    body.descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let text: &str = text.trim();
        if text.is_empty() {
            return None;
        }
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        (!hidden).then_some(text)
    })
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_scenario() {
        let html = "<html><body><script>x=1</script><p>Price: $10</p></body></html>";
        assert_eq!(normalize(html), "Price: $10");
    }

    #[test]
    fn empty_body_yields_empty_string() {
        assert_eq!(normalize("<html><body></body></html>"), "");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<html><body>\n   \n</body></html>"), "");
    }

    #[test]
    fn frameset_document_has_no_body() {
        let html = "<html><head><title>t</title></head><frameset><frame src=a></frameset></html>";
        assert_eq!(normalize(html), "");
    }

    #[test]
    fn head_content_is_excluded() {
        let html = "<html><head><title>Shop</title><style>p{color:red}</style></head>\
                    <body><p>Item</p></body></html>";
        assert_eq!(normalize(html), "Item");
    }

    #[test]
    fn script_style_noscript_and_template_are_removed() {
        let html = r#"<body>
            <style>.a { display: none }</style>
            <p>Visible</p>
            <script type="text/javascript">var secret = "leak";</script>
            <noscript>Enable JavaScript</noscript>
            <template><p>Hidden template</p></template>
            <div><script>nested()</script><span>Also visible</span></div>
        </body>"#;
        assert_eq!(normalize(html), "Visible\nAlso visible");
    }

    #[test]
    fn each_text_node_gets_its_own_line() {
        let html = "<body><h1>Title</h1><ul><li>One</li><li>Two</li></ul></body>";
        assert_eq!(normalize(html), "Title\nOne\nTwo");
    }

    #[test]
    fn blank_line_runs_collapse_to_one() {
        let html = "<body><pre>first\n\n\n\n\nsecond</pre></body>";
        assert_eq!(normalize(html), "first\n\nsecond");
    }

    #[test]
    fn entities_are_decoded_and_spaces_collapsed() {
        let html = "<body><p>Fish&nbsp;&amp;  Chips \t $5</p></body>";
        assert_eq!(normalize(html), "Fish & Chips $5");
    }

    #[test]
    fn whitespace_and_script_differences_do_not_change_output() {
        let compact = "<html><body><p>Price: $10</p><p>In stock</p></body></html>";
        let noisy = "<html>\n  <body>\n\n    <script>track()</script>\n    <p>\n      Price:   $10\n    </p>\n\n\n\
                     <style>p{}</style>\n    <p>In stock</p>\n  </body>\n</html>\n";
        assert_eq!(normalize(compact), normalize(noisy));
        assert_eq!(normalize(noisy), "Price: $10\nIn stock");
    }

    #[test]
    fn output_has_no_tags_or_outer_blank_lines() {
        let html = "<body>\n\n<div><b>bold</b> &lt;not a tag&gt;</div>\n\n</body>";
        let text = normalize(html);
        assert_eq!(text, "bold\n<not a tag>");
        assert_eq!(text, text.trim());
    }

    #[test]
    fn clean_text_is_idempotent() {
        let once = clean_text("  a \n\n\n b  \n");
        assert_eq!(clean_text(&once), once);
    }

    #[test]
    fn title_is_read_from_head() {
        let html = "<html><head><title>\n  Daily   Deals </title></head><body></body></html>";
        assert_eq!(normalize_page(html).title.as_deref(), Some("Daily Deals"));
        assert_eq!(normalize_page("<body>no title</body>").title, None);
    }

    #[test]
    fn page_text_matches_normalize() {
        let html = "<html><head><title>Menu</title></head><body><p>Soup</p><script>x</script><p>Bread</p></body></html>";
        let page = normalize_page(html);
        assert_eq!(page.text, normalize(html));
        assert_eq!(page.text, "Soup\nBread");
    }
}
