//! HTML fragments for code blocks and render results.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::host::RegionContent;

/// Plain `<pre><code>` rendering for blocks no processor claimed.
pub fn raw_code_html(language: &str, code: &str) -> String {
    let escaped = encode_text(code);
    let lang_class = if language.is_empty() {
        String::new()
    } else {
        format!(" class=\"language-{}\"", encode_double_quoted_attribute(language))
    };
    format!("<pre><code{}>{}</code></pre>\n", lang_class, escaped)
}

/// HTML for a filled output region.
pub(crate) fn region_html(content: &RegionContent) -> String {
    match content {
        RegionContent::Image { format, data } => match format {
            crate::ImageFormat::Svg => {
                format!("<div class=\"graphviz\">{}</div>\n", String::from_utf8_lossy(data))
            }
            crate::ImageFormat::Png => format!(
                "<div class=\"graphviz\"><img src=\"data:{};base64,{}\"></div>\n",
                format.mime_type(),
                STANDARD.encode(data)
            ),
        },
        RegionContent::Html(html) | RegionContent::ClientGraph(html) => html.clone(),
        RegionContent::Error(message) => format!(
            "<div class=\"graphviz-error\"><pre>{}</pre></div>\n",
            encode_text(message)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageFormat;

    #[test]
    fn test_raw_code_html() {
        assert_eq!(
            raw_code_html("python", "print('<hi>' & x)"),
            "<pre><code class=\"language-python\">print('&lt;hi&gt;' &amp; x)</code></pre>\n"
        );
        assert_eq!(
            raw_code_html("a\"b", "x"),
            "<pre><code class=\"language-a&quot;b\">x</code></pre>\n"
        );
        assert_eq!(raw_code_html("", "x"), "<pre><code>x</code></pre>\n");
    }

    #[test]
    fn test_png_is_inlined() {
        let html = region_html(&RegionContent::Image {
            format: ImageFormat::Png,
            data: vec![0x89, b'P', b'N', b'G'],
        });
        assert_eq!(
            html,
            "<div class=\"graphviz\"><img src=\"data:image/png;base64,iVBORw==\"></div>\n"
        );
    }

    #[test]
    fn test_svg_is_embedded() {
        let html = region_html(&RegionContent::Image {
            format: ImageFormat::Svg,
            data: b"<svg></svg>".to_vec(),
        });
        assert!(html.contains("<svg></svg>"));
    }

    #[test]
    fn test_error_placeholder_is_escaped() {
        let html = region_html(&RegionContent::Error("syntax error near '<'".into()));
        assert!(html.starts_with("<div class=\"graphviz-error\">"));
        assert!(html.contains("&lt;"));
    }
}
