/// Pulls one SQL statement out of a model reply. Never fails; the result is
/// only known to be valid once it runs.
pub fn extract_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    // Fences can be nested; peel until the text stops changing
    loop {
        let inner = strip_fence(sql);
        if inner == sql {
            break;
        }
        sql = inner;
    }

    sql.to_string()
}

/// Removes one leading fence and its language tag; returns trimmed text.
fn strip_fence(text: &str) -> &str {
    let Some(fence) = opening_fence(text) else {
        return text;
    };

    let body = &text[fence.len()..];
    let body = match body.find(fence) {
        Some(end) => &body[..end],
        None => body,
    };

    // Drop a language tag such as `sql` on the opening line
    let body = match body.split_once('\n') {
        Some((first, rest)) if is_language_tag(first.trim()) => rest,
        None if is_language_tag(body.trim()) => "",
        _ => strip_inline_tag(body),
    };

    body.trim()
}

/// `sql SELECT 1` on the fence line itself.
fn strip_inline_tag(body: &str) -> &str {
    match body.get(..3) {
        Some(tag)
            if tag.eq_ignore_ascii_case("sql")
                && body[3..].starts_with(char::is_whitespace) =>
        {
            &body[3..]
        }
        _ => body,
    }
}

fn opening_fence(text: &str) -> Option<&'static str> {
    ["```", "~~~"]
        .into_iter()
        .find(|fence| text.starts_with(fence))
}

fn is_language_tag(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
        && !line.eq_ignore_ascii_case("select")
}
