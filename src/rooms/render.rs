use pulldown_cmark::{Options, Parser};

/// Markdown to HTML, then through the user-generated-content allow-list.
pub fn render(raw: &str) -> String {
    let parser = Parser::new_ext(raw, Options::ENABLE_STRIKETHROUGH);

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);

    // trimmed so that rendering already rendered output is a fixed point
    ammonia::clean(&html_output).trim().to_owned()
}

/// Allow-list filter only, for fields that are echoed back but never
/// interpreted as markdown (the recipient name).
pub fn sanitize(raw: &str) -> String {
    ammonia::clean(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_rendered() {
        let html = render("**bold** and *it*");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>it</em>"));

        let html = render("- one\n- two");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn script_stripped() {
        let html = render("<script>alert(1)</script>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));
        assert_eq!(render(&html), html);
    }

    #[test]
    fn event_handlers_stripped() {
        let html = render("<img src=x onerror=alert(1)>");
        assert!(!html.contains("onerror"));

        let html = render(r#"hello <b onclick="steal()">there</b>"#);
        assert!(html.contains("<b>there</b>"));
        assert!(!html.contains("onclick"));
    }

    #[test]
    fn javascript_links_neutralised() {
        let html = render("[click](javascript:alert(1))");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("click"));
        assert_eq!(render(&html), html);
    }

    #[test]
    fn recipient_name_filtered() {
        assert_eq!(sanitize("Bob"), "Bob");
        assert!(!sanitize("<script>x</script>Bob").contains("<script"));
    }

    #[test]
    fn deterministic() {
        let input = "# title\n\nsome `code` and a [link](https://example.com)";
        assert_eq!(render(input), render(input));
    }
}
