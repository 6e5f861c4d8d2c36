/// Replace every `{{ KEY }}` in `input` with the matching value. Whitespace
/// inside the braces is ignored; unknown or unterminated placeholders are
/// kept as they are.
pub fn substitute_placeholders(input: &str, variables: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}").map(|i| open + 2 + i) else {
            break;
        };
        // The innermost `{{` before the closing braces starts the placeholder.
        let start = rest[open..close].rfind("{{").map_or(open, |i| open + i);

        output.push_str(&rest[..start]);
        let key = rest[start + 2..close].trim();
        match variables.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => output.push_str(value),
            None => output.push_str(&rest[start..close + 2]),
        }
        rest = &rest[close + 2..];
    }

    output.push_str(rest);
    output
}

/// Strip markup from `html` and decode the common entities.
///
/// A `<` only opens a tag when followed by a letter, `/` or `!` and closed by
/// a later `>`. Any other `<` is kept as text.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let tail = &rest[open..];
        let opens_tag =
            tail[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!');

        match tail.find('>') {
            Some(close) if opens_tag => rest = &tail[close + 1..],
            _ => {
                text.push('<');
                rest = &tail[1..];
            }
        }
    }
    text.push_str(rest);

    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}
