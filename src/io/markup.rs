//! Tag-level HTML scanning for schedule pages
//!
//! No DOM is built. Tag names are matched case-insensitively on an ASCII
//! lowercased copy of the page, which keeps byte offsets aligned with the
//! original text.

/// A heading and the list items that follow it, up to the next heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingSection {
    pub title: String,
    pub items: Vec<String>,
}

/// Byte offsets of one `<hN>...</hN>` element
#[derive(Debug, Clone, Copy)]
struct HeadingSpan {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
}

/// Split a page into heading sections.
///
/// When `content_marker` is given and found (e.g. `editable-content`), only
/// headings after it are considered; otherwise the whole page is scanned.
pub fn heading_sections(html: &str, content_marker: Option<&str>) -> Vec<HeadingSection> {
    let lc = html.to_ascii_lowercase();
    let from = content_marker
        .filter(|marker| !marker.is_empty())
        .and_then(|marker| lc.find(&marker.to_ascii_lowercase()))
        .unwrap_or(0);

    let mut spans = Vec::new();
    let mut pos = from;
    while let Some(span) = next_heading(&lc, pos) {
        pos = span.end;
        spans.push(span);
    }

    spans
        .iter()
        .enumerate()
        .map(|(i, span)| {
            let region_end = spans.get(i + 1).map_or(html.len(), |next| next.start);
            HeadingSection {
                title: clean_text(&html[span.inner_start..span.inner_end]),
                items: list_items(&html[span.end..region_end]),
            }
        })
        .collect()
}

/// Locate the next heading element at or after `from` in the lowercased page
fn next_heading(lc: &str, from: usize) -> Option<HeadingSpan> {
    let bytes = lc.as_bytes();
    let mut search = from;
    loop {
        let start = lc.get(search..)?.find("<h")? + search;
        let level = *bytes.get(start + 2)?;
        let after = bytes.get(start + 3).copied();
        let is_heading = (b'1'..=b'6').contains(&level)
            && matches!(after, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r'));
        if !is_heading {
            search = start + 2;
            continue;
        }

        let inner_start = lc[start..].find('>')? + start + 1;
        let close = format!("</h{}>", level as char);
        let inner_end = lc[inner_start..].find(&close)? + inner_start;
        return Some(HeadingSpan { start, inner_start, inner_end, end: inner_end + close.len() });
    }
}

/// Text of every `<li>` in `region`. Unclosed items end at the next `<li`.
fn list_items(region: &str) -> Vec<String> {
    let lc = region.to_ascii_lowercase();
    let mut items = Vec::new();
    let mut pos = 0;

    while let Some(rel) = lc[pos..].find("<li") {
        let start = pos + rel;
        let next = lc.as_bytes().get(start + 3).copied();
        if !matches!(next, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            pos = start + 3;
            continue;
        }
        let Some(open_rel) = lc[start..].find('>') else { break };
        let inner_start = start + open_rel + 1;

        let close = lc[inner_start..].find("</li>").map(|i| inner_start + i);
        let reopen = lc[inner_start..].find("<li").map(|i| inner_start + i);
        let inner_end = match (close, reopen) {
            (Some(c), Some(r)) => c.min(r),
            (Some(c), None) => c,
            (None, Some(r)) => r,
            (None, None) => region.len(),
        };

        let text = clean_text(&region[inner_start..inner_end]);
        if !text.is_empty() {
            items.push(text);
        }
        pos = inner_end;
    }

    items
}

/// Strip tags, decode entities, collapse whitespace
pub fn clean_text(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}

/// Remove all `<...>` tags
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode the named entities schedule pages use plus numeric references.
/// Unknown entities are left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity_char(&tail[1..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "nbsp" => ' ',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "rsquo" => '\u{2019}',
        "lsquo" => '\u{2018}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        _ => return None,
    };
    Some(ch)
}

/// Collapse runs of whitespace into a single space and trim
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
