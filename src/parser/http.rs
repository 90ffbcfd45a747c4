//! Route normalization shared by every framework detector. Methods are
//! uppercased, paths get exactly one canonical spelling so that the same
//! endpoint written for Flask, FastAPI, Express, or Next.js produces the
//! same route id.

pub fn normalize_method(raw: &str) -> String {
    let mut method = raw.trim().to_ascii_uppercase();
    if let Some(stripped) = method.strip_suffix("_ASYNC") {
        method = stripped.to_string();
    }
    match method.as_str() {
        "ALL" | "ANY" | "ROUTE" | "USE" => "ANY".to_string(),
        _ => method,
    }
}

/// Canonical path form: leading `/`, no trailing `/` (except the root), no
/// duplicate separators, and every parameter segment spelled `:name`.
/// `{id}`, `<id>`, `<int:id>`, and `[id]` all normalize to `:id`;
/// catch-all segments (`[...slug]`, `*`) normalize to `*`.
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        segments.push(normalize_segment(segment));
    }
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&segment);
    }
    out
}

fn normalize_segment(segment: &str) -> String {
    if segment.starts_with('*') {
        return "*".to_string();
    }
    if let Some(inner) = strip_delimiters(segment, '{', '}') {
        return param(inner);
    }
    if let Some(inner) = strip_delimiters(segment, '<', '>') {
        return param(inner);
    }
    if let Some(inner) = strip_delimiters(segment, '[', ']') {
        if inner.starts_with("...") {
            return "*".to_string();
        }
        return param(inner);
    }
    if let Some(name) = segment.strip_prefix(':') {
        return param(name);
    }
    segment.to_string()
}

/// `:name`, with converter prefixes (`int:id`) and regexes (`id:\d+`)
/// reduced to the bare name.
fn param(inner: &str) -> String {
    let inner = inner.trim();
    let name = match inner.split_once(':') {
        // Flask/Django spell converters before the name, FastAPI after.
        Some((head, tail)) if looks_like_converter(head) => tail,
        Some((head, _)) => head,
        None => inner,
    };
    let name: String = name
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        ":param".to_string()
    } else {
        format!(":{name}")
    }
}

fn strip_delimiters(segment: &str, open: char, close: char) -> Option<&str> {
    segment.strip_prefix(open)?.strip_suffix(close)
}

fn looks_like_converter(head: &str) -> bool {
    matches!(
        head,
        "int" | "str" | "float" | "path" | "uuid" | "slug" | "string"
    )
}

pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = normalize_path(prefix);
    let path = normalize_path(path);
    match (prefix.as_str(), path.as_str()) {
        ("/", _) => path,
        (_, "/") => prefix,
        _ => format!("{prefix}{path}"),
    }
}

pub fn route_id(method: &str, path: &str) -> String {
    format!("{method} {path}")
}
