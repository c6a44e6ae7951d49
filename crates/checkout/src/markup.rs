//! Token and marker extraction from server-rendered cart markup
//!
//! Narrow functions with fixed contracts so the extraction strategy can be
//! swapped or mocked without touching callers. The scanners tolerate
//! attribute reordering and whitespace; they do not attempt to be a general
//! HTML parser.

/// Link fragment that marks a removable line item on the cart page. One
/// occurrence per line item, each followed by the item's variant id.
const REMOVE_LINK_FRAGMENT: &str = "remove_line_item?variant_id=";

/// Extract the anti-forgery token from a `<meta name="csrf-token">` tag.
///
/// Attribute order is not assumed: both
/// `<meta name="csrf-token" content="...">` and
/// `<meta content="..." name="csrf-token">` are handled.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let mut rest = html;
    while let Some(start) = rest.find("<meta") {
        let tag_body = &rest[start..];
        let end = tag_body.find('>')?;
        let tag = &tag_body[..end];

        if attr_value(tag, "name").as_deref() == Some("csrf-token") {
            return attr_value(tag, "content");
        }
        rest = &tag_body[end + 1..];
    }
    None
}

/// Extract the variant ids of every removable line item on the cart page.
///
/// An empty result is the cart-emptiness marker: no removable line item
/// means the cart is empty.
pub fn extract_removable_variant_ids(html: &str) -> Vec<u64> {
    let mut ids = Vec::new();
    for chunk in html.split(REMOVE_LINK_FRAGMENT).skip(1) {
        let digits: String = chunk.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(id) = digits.parse::<u64>() {
            ids.push(id);
        }
    }
    ids
}

/// Value of `name="..."` inside a single tag, if present.
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_token_in_document_order() {
        let html = r#"
            <html><head>
            <meta charset="utf-8">
            <meta name="csrf-token" content="abc123tok">
            </head><body></body></html>
        "#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("abc123tok"));
    }

    #[test]
    fn extracts_token_with_reversed_attributes() {
        let html = r#"<meta content="tok-rev" name="csrf-token">"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("tok-rev"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(extract_csrf_token("<html><body>no meta</body></html>"), None);
        assert_eq!(
            extract_csrf_token(r#"<meta name="viewport" content="width=device-width">"#),
            None
        );
    }

    #[test]
    fn removable_ids_collected_from_links() {
        let html = r#"
            <a href="/en/GB/cart/remove_line_item?variant_id=115604" class="rm">x</a>
            <a href="/en/GB/cart/remove_line_item?variant_id=118563&amp;q=1">x</a>
        "#;
        assert_eq!(extract_removable_variant_ids(html), vec![115604, 118563]);
    }

    #[test]
    fn empty_cart_page_yields_no_ids() {
        let html = "<html><body><p>Your cart is empty</p></body></html>";
        assert!(extract_removable_variant_ids(html).is_empty());
    }

    #[test]
    fn malformed_id_is_skipped() {
        let html = "remove_line_item?variant_id=notanumber";
        assert!(extract_removable_variant_ids(html).is_empty());
    }
}
