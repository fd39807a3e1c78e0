//! Cleanup applied to a post body before it is tokenized.

/// Tags that survive preparation. Everything else is removed, keeping its text.
pub const ALLOWED_TAGS: [&str; 16] = [
    "a",
    "img",
    "div",
    "p",
    "br",
    "blockquote",
    "pre",
    "ol",
    "ul",
    "li",
    "hr",
    "b",
    "i",
    "u",
    "strong",
    "em",
];

const TAB_SPAN: &str = r#"<span class="tab"></span>"#;

pub fn prepare(html: &str) -> String {
    let html = strip_inter_tag_whitespace(html);
    let html = html.replace(TAB_SPAN, "    ");
    strip_tags(&html)
}

/// Removes whitespace runs that sit between the end of one tag and the start
/// of the next.
pub fn strip_inter_tag_whitespace(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        out.push(c);
        if c != '>' {
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            end = j + w.len_utf8();
            chars.next();
        }
        if end > start && !html[end..].starts_with('<') {
            out.push_str(&html[start..end]);
        }
    }
    out
}

fn tag_name(inner: &str) -> String {
    inner
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Drops every tag not in [`ALLOWED_TAGS`] along with HTML comments. A `<`
/// that never closes is left as text.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];

        if let Some(comment) = after.strip_prefix("!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        let starts_tag = after
            .trim_start_matches('/')
            .starts_with(|c: char| c.is_ascii_alphabetic());
        match after.find('>') {
            Some(gt) if starts_tag => {
                let inner = &after[..gt];
                if ALLOWED_TAGS.contains(&tag_name(inner).as_str()) {
                    out.push('<');
                    out.push_str(inner);
                    out.push('>');
                }
                rest = &after[gt + 1..];
            }
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Longest HTML5 entity name, plus a little room for numeric references.
const MAX_REFERENCE_LEN: usize = 40;

/// Resolves one `&...;` reference, named (full HTML5 table) or numeric.
fn decode_reference(reference: &str) -> Option<String> {
    quick_xml::escape::unescape_with(reference, quick_xml::escape::resolve_html5_entity)
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Decodes named and numeric character references. Unknown or malformed
/// references are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi > 0 && semi <= MAX_REFERENCE_LEN)
            .filter(|&semi| !after[..semi].contains(['&', ' ']))
            .and_then(|semi| decode_reference(&rest[amp..amp + semi + 2]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push_str(&c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
