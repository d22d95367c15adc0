//! HTML templates for menu images and label substitution.
//!
//! Templates are built once from the layout table, so every label cell sits
//! exactly on top of the area the remote system will make tappable. Labels
//! are addressed with `{{LABEL_n}}` placeholders (1-based).

use crate::layout::{layout_for, Rect, MAX_ACTIONS};
use crate::{Error, Result, CANVAS_HEIGHT, CANVAS_WIDTH};
use std::fmt::Write as _;
use std::sync::OnceLock;

const PLACEHOLDER_OPEN: &str = "{{LABEL_";
const PLACEHOLDER_CLOSE: &str = "}}";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
html, body { margin: 0; padding: 0; width: {{WIDTH}}px; height: {{HEIGHT}}px; overflow: hidden; background: #f5f5f5; }
.cell { position: absolute; box-sizing: border-box; display: flex; align-items: center; justify-content: center;
        border: 4px solid #ffffff; background: #06c755; color: #ffffff; padding: 24px; overflow: hidden;
        font-family: "Noto Sans", "Helvetica Neue", Arial, sans-serif; font-weight: 700; font-size: 64px;
        text-align: center; line-height: 1.2; word-break: break-word; }
.cell span { display: -webkit-box; -webkit-box-orient: vertical; -webkit-line-clamp: 3; overflow: hidden; }
</style>
</head>
<body>
{{CELLS}}</body>
</html>
"#;

static TEMPLATES: OnceLock<Vec<String>> = OnceLock::new();

fn build_template(areas: &[Rect]) -> String {
    let mut cells = String::new();
    for (i, r) in areas.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(
            cells,
            r#"<div class="cell" style="left:{}px;top:{}px;width:{}px;height:{}px"><span>{}{}{}</span></div>"#,
            r.x,
            r.y,
            r.width,
            r.height,
            PLACEHOLDER_OPEN,
            i + 1,
            PLACEHOLDER_CLOSE
        );
    }
    PAGE_TEMPLATE
        .replace("{{WIDTH}}", &CANVAS_WIDTH.to_string())
        .replace("{{HEIGHT}}", &CANVAS_HEIGHT.to_string())
        .replace("{{CELLS}}", &cells)
}

fn templates() -> &'static [String] {
    TEMPLATES.get_or_init(|| {
        (1..=MAX_ACTIONS)
            .filter_map(|count| layout_for(count).ok())
            .map(build_template)
            .collect()
    })
}

/// Look up the registered template for `count` labels.
pub fn template_for(count: usize) -> Result<&'static str> {
    count
        .checked_sub(1)
        .and_then(|idx| templates().get(idx))
        .map(String::as_str)
        .ok_or(Error::TemplateNotFound(count))
}

/// Escape text for use inside HTML element content or attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A placeholder occurrence: byte range in the template and its 1-based index.
struct Placeholder {
    start: usize,
    end: usize,
    index: usize,
}

fn scan_placeholders(template: &str) -> Vec<Placeholder> {
    let mut found = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = template[pos..].find(PLACEHOLDER_OPEN) {
        let start = pos + rel;
        let digits_at = start + PLACEHOLDER_OPEN.len();
        let tail = &template[digits_at..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && tail[digits..].starts_with(PLACEHOLDER_CLOSE) {
            if let Ok(index) = tail[..digits].parse::<usize>() {
                let end = digits_at + digits + PLACEHOLDER_CLOSE.len();
                found.push(Placeholder { start, end, index });
                pos = end;
                continue;
            }
        }
        pos = digits_at;
    }
    found
}

/// Number of label placeholders in `template`.
pub fn placeholder_count(template: &str) -> usize {
    scan_placeholders(template).len()
}

/// Substitute `labels` into `template`, escaping each label.
///
/// The template must hold exactly the placeholders `{{LABEL_1}}` through
/// `{{LABEL_n}}` with `n == labels.len()`, each once. Substitution is a single
/// pass over the template, so label text is never re-scanned.
pub fn render<S: AsRef<str>>(template: &str, labels: &[S]) -> Result<String> {
    let placeholders = scan_placeholders(template);
    let mut seen = vec![false; labels.len()];
    for p in &placeholders {
        match p.index.checked_sub(1).filter(|&i| i < seen.len()) {
            Some(i) if !seen[i] => seen[i] = true,
            _ => {
                return Err(Error::PlaceholderCountMismatch {
                    expected: labels.len(),
                    found: placeholders.len(),
                })
            }
        }
    }
    if placeholders.len() != labels.len() {
        return Err(Error::PlaceholderCountMismatch {
            expected: labels.len(),
            found: placeholders.len(),
        });
    }

    let mut out = String::with_capacity(template.len() + labels.iter().map(|l| l.as_ref().len()).sum::<usize>());
    let mut cursor = 0usize;
    for p in &placeholders {
        out.push_str(&template[cursor..p.start]);
        out.push_str(&escape_html(labels[p.index - 1].as_ref()));
        cursor = p.end;
    }
    out.push_str(&template[cursor..]);
    Ok(out)
}

/// Select the template for `labels.len()` and render it.
pub fn render_for_labels<S: AsRef<str>>(labels: &[S]) -> Result<String> {
    let template = template_for(labels.len())?;
    render(template, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_one_placeholder_per_area() {
        for count in 1..=MAX_ACTIONS {
            let t = template_for(count).unwrap();
            assert_eq!(placeholder_count(t), count);
        }
        assert!(matches!(template_for(0), Err(Error::TemplateNotFound(0))));
        assert!(matches!(template_for(7), Err(Error::TemplateNotFound(7))));
    }

    #[test]
    fn cells_are_positioned_on_the_layout() {
        let t = template_for(3).unwrap();
        assert!(t.contains("left:1066px;top:455px;width:534px;height:455px"));
        assert!(t.contains("width: 1600px; height: 910px"));
    }

    #[test]
    fn render_replaces_each_placeholder_once() {
        let labels = ["Shop", "News", "Help"];
        let out = render_for_labels(&labels).unwrap();
        for label in labels {
            assert_eq!(out.matches(label).count(), 1, "{} should appear once", label);
        }
        assert_eq!(placeholder_count(&out), 0);
        assert!(!out.contains("{{"));
    }

    #[test]
    fn labels_are_escaped() {
        let out = render_for_labels(&["<script>alert('x')</script> & \"more\""]).unwrap();
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;more&quot;"));
    }

    #[test]
    fn label_text_cannot_inject_placeholders() {
        let out = render_for_labels(&["{{LABEL_2}}", "second"]).unwrap();
        assert_eq!(out.matches("{{LABEL_2}}").count(), 1);
        assert_eq!(out.matches("second").count(), 1);
    }

    #[test]
    fn mismatched_templates_are_rejected() {
        let err = render("<p>{{LABEL_1}}</p>", &["a", "b"]).unwrap_err();
        assert!(matches!(err, Error::PlaceholderCountMismatch { expected: 2, found: 1 }));

        let err = render("<p>{{LABEL_1}}{{LABEL_1}}</p>", &["a", "b"]).unwrap_err();
        assert!(matches!(err, Error::PlaceholderCountMismatch { expected: 2, found: 2 }));

        let err = render("<p>{{LABEL_3}}</p>", &["a"]).unwrap_err();
        assert!(matches!(err, Error::PlaceholderCountMismatch { expected: 1, found: 1 }));
    }

    #[test]
    fn non_placeholder_braces_are_left_alone() {
        let out = render("{{LABEL_}} {{LABEL_x}} {{LABEL_1}}", &["ok"]).unwrap();
        assert_eq!(out, "{{LABEL_}} {{LABEL_x}} ok");
    }

    #[test]
    fn empty_labels_render() {
        let out = render("[{{LABEL_1}}]", &[""]).unwrap();
        assert_eq!(out, "[]");
    }
}
