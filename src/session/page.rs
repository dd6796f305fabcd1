// src/session/page.rs — HTML page classification for the login flow
//
// Naive tag scanning over ASCII-lowercased HTML. Lowercasing ASCII keeps
// byte offsets intact, so indices found in the lowercased copy are valid
// in the original text.

/// Login path used by the site's sign-in form.
pub const DEFAULT_LOGIN_PATH: &str = "/users/sign_in";

/// Substrings that mark an interstitial challenge page.
pub const CAPTCHA_MARKERS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "cf-challenge",
    "cf_chl_",
    "captcha-container",
];

/// Whether `html` is the sign-in page served at the default login path.
///
/// Markers: a `<form>` whose action points at the login path, an input
/// named `user[password]`, or an element with id `new_user`.
pub fn is_login_page(html: &str) -> bool {
    is_login_page_for(html, DEFAULT_LOGIN_PATH)
}

/// [`is_login_page`] for a site whose sign-in form lives at `login_path`.
pub fn is_login_page_for(html: &str, login_path: &str) -> bool {
    let lc = html.to_ascii_lowercase();
    let login_path = login_path.to_ascii_lowercase();

    let form_posts_to_login = tags(&lc, "form").any(|tag| {
        attr(tag, "action")
            .map(|action| action_matches(&action, &login_path))
            .unwrap_or(false)
    });
    if form_posts_to_login {
        return true;
    }

    let password_input = tags(&lc, "input")
        .any(|tag| attr(tag, "name").as_deref() == Some("user[password]"));
    if password_input {
        return true;
    }

    any_tag_with_id(&lc, "new_user")
}

/// Whether `html` carries any captcha or challenge marker.
pub fn is_captcha_page(html: &str) -> bool {
    let lc = html.to_ascii_lowercase();
    CAPTCHA_MARKERS.iter().any(|m| lc.contains(m))
}

/// CSRF token from `<meta name="csrf-token" content=…>`, falling back to
/// `<input name="authenticity_token" value=…>`.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let lc = html.to_ascii_lowercase();

    let from_meta = tags_with_offsets(&lc, "meta").find_map(|(start, end)| {
        let tag_lc = &lc[start..end];
        if attr(tag_lc, "name").as_deref() != Some("csrf-token") {
            return None;
        }
        attr_in(tag_lc, &html[start..end], "content").filter(|v| !v.is_empty())
    });
    if from_meta.is_some() {
        return from_meta;
    }

    let from_input = tags_with_offsets(&lc, "input").find_map(|(start, end)| {
        let tag_lc = &lc[start..end];
        if attr(tag_lc, "name").as_deref() != Some("authenticity_token") {
            return None;
        }
        attr_in(tag_lc, &html[start..end], "value").filter(|v| !v.is_empty())
    });
    from_input
}

fn action_matches(action: &str, login_path: &str) -> bool {
    // Absolute or relative; ignore query strings.
    let without_query = action.split(['?', '#']).next().unwrap_or(action);
    without_query.ends_with(login_path)
}

fn any_tag_with_id(lc: &str, id: &str) -> bool {
    let mut from = 0;
    while let Some(rel) = lc[from..].find('<') {
        let start = from + rel;
        let Some(end_rel) = lc[start..].find('>') else {
            break;
        };
        let end = start + end_rel + 1;
        if attr(&lc[start..end], "id").as_deref() == Some(id) {
            return true;
        }
        from = end;
    }
    false
}

/// Every opening tag `<name ...>` as a slice of `lc`.
fn tags<'a>(lc: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    tags_with_offsets(lc, name).map(move |(s, e)| &lc[s..e])
}

/// Byte ranges of every opening tag `<name ...>` in `lc`.
fn tags_with_offsets<'a>(lc: &'a str, name: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    let open = format!("<{name}");
    let mut from = 0;
    std::iter::from_fn(move || loop {
        let start = from + lc.get(from..)?.find(&open)?;
        let after_name = start + open.len();
        let end = start + lc[start..].find('>')? + 1;
        from = end;
        // `<form` must not match `<formula`
        match lc.as_bytes().get(after_name) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {
                return Some((start, end))
            }
            _ => continue,
        }
    })
}

/// Value of attribute `name` within a single lowercased tag.
fn attr(tag: &str, name: &str) -> Option<String> {
    attr_in(tag, tag, name)
}

/// Locate attribute `name` in `tag_lc` and read its value from `tag`, the
/// same tag with its original case. Handles double, single and unquoted
/// values.
fn attr_in(tag_lc: &str, tag: &str, name: &str) -> Option<String> {
    let bytes = tag_lc.as_bytes();
    let mut i = 0;
    while let Some(rel) = tag_lc[i..].find(name) {
        let pos = i + rel;
        i = pos + name.len();

        let preceded_ok = pos > 0 && bytes[pos - 1].is_ascii_whitespace();
        if !preceded_ok {
            continue;
        }
        let mut j = pos + name.len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        let value = match bytes.get(j) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let rest = &tag[j + 1..];
                let close = rest.find(q as char)?;
                &rest[..close]
            }
            Some(_) => {
                let rest = &tag[j..];
                let close = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                rest[..close].trim_end_matches('/')
            }
            None => return None,
        };
        return Some(decode_entities(value));
    }
    None
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
