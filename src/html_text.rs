//! Readable text from an article page.

/// Elements whose whole subtree is dropped.
const SKIPPED_ELEMENTS: &[&str] = &[
    "head",
    "script",
    "style",
    "noscript",
    "nav",
    "header",
    "footer",
    "annotation",
    "annotation-xml",
    "svg",
];

/// Elements that end a line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "tr", "section", "h1", "h2", "h3", "h4", "h5", "h6", "figcaption",
    "blockquote", "table", "pre",
];

/// Convert an HTML page to plain text, keeping one line per block element.
///
/// When the page has an `<article>` element only its contents are used.
pub fn extract_article_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let (start, end) = article_bounds(&lower).unwrap_or((0, html.len()));
    let body = &html[start..end];
    let lower_body = &lower[start..end];

    let mut raw = String::with_capacity(body.len() / 2);
    let mut pos = 0;

    while pos < body.len() {
        let Some(offset) = body[pos..].find('<') else {
            raw.push_str(&body[pos..]);
            break;
        };
        raw.push_str(&body[pos..pos + offset]);
        let tag_start = pos + offset;

        if lower_body[tag_start..].starts_with("<!--") {
            pos = match lower_body[tag_start..].find("-->") {
                Some(close) => tag_start + close + 3,
                None => body.len(),
            };
            continue;
        }

        let Some(close) = body[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + close + 1;
        let tag = &lower_body[tag_start + 1..tag_end - 1];
        let name = tag_name(tag);
        let is_closing = tag.starts_with('/');

        if !is_closing && !tag.ends_with('/') && SKIPPED_ELEMENTS.contains(&name) {
            pos = skip_element(lower_body, tag_end, name);
            continue;
        }
        if BLOCK_ELEMENTS.contains(&name) {
            raw.push('\n');
        }
        pos = tag_end;
    }

    decode_entities(&raw)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn article_bounds(lower: &str) -> Option<(usize, usize)> {
    let start = lower.find("<article")?;
    let end = lower
        .rfind("</article>")
        .filter(|&end| end > start)
        .map(|end| end + "</article>".len())
        .unwrap_or(lower.len());
    Some((start, end))
}

fn tag_name(tag: &str) -> &str {
    let tag = tag.trim_start_matches('/');
    let end = tag
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .unwrap_or(tag.len());
    &tag[..end]
}

/// Position just past the element's closing tag, or the end of input when it is never closed.
fn skip_element(lower: &str, from: usize, name: &str) -> usize {
    let closing = format!("</{}", name);
    lower[from..]
        .find(&closing)
        .and_then(|offset| {
            let close_start = from + offset;
            lower[close_start..].find('>').map(|gt| close_start + gt + 1)
        })
        .unwrap_or(lower.len())
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&candidate[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
