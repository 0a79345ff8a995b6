// record.rs — Field extraction for one serialized record line
//
// The clipboard format is a stable, line-bounded dump of `key=value` fields.
// Fields are found by substring scan rather than a grammar: a key only
// matches at a field boundary (start of line, after `(`, `,` or whitespace)
// so `Name=` never matches inside `PinName=`.
//
// Preconditions: one line of serialized text.
// Postconditions: borrowed slices of that line, or owned cleaned copies.
// Failure modes: absent keys yield `None`; callers decide whether that is fatal.
// Side effects: none.

/// Text following `key=` when the key starts at a field boundary.
pub fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{key}=");
    let mut from = 0;
    while let Some(pos) = line[from..].find(&pattern) {
        let at = from + pos;
        let boundary = line[..at]
            .chars()
            .next_back()
            .map_or(true, |c| matches!(c, '(' | ',' | ' ' | '\t'));
        if boundary {
            return Some(&line[at + pattern.len()..]);
        }
        from = at + pattern.len();
    }
    None
}

/// `key=value` where the value runs to the next comma.
pub fn value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    field(line, key).map(|rest| rest.find(',').map_or(rest, |i| &rest[..i]))
}

/// `key=value` where the value runs to the next whitespace.
pub fn word<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    field(line, key).map(|rest| rest.find(char::is_whitespace).map_or(rest, |i| &rest[..i]))
}

/// `key="value"` where the value may itself contain commas. The slice keeps
/// its opening quote; `clean` strips it.
pub fn quoted<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = field(line, key)?;
    if !rest.starts_with('"') {
        return value(line, key);
    }
    if let Some(end) = rest.find("\",") {
        return Some(&rest[..end]);
    }
    match rest[1..].find('"') {
        Some(close) => Some(&rest[..close + 2]),
        None => Some(rest),
    }
}

/// `key=(a,b,c,)` as its non-empty entries.
pub fn list<'a>(line: &'a str, key: &str) -> Option<Vec<&'a str>> {
    let rest = field(line, key)?.strip_prefix('(')?;
    let body = rest.find(')').map_or(rest, |i| &rest[..i]);
    Some(
        body.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect(),
    )
}

/// Strip one level of wrapping: a leading `(`, `'`, `"` and a trailing `)`,
/// `'`, `"`, each checked once in that order. Escaped line breaks become
/// real ones.
pub fn clean(raw: &str) -> String {
    let mut s = raw;
    for lead in ['(', '\'', '"'] {
        if let Some(rest) = s.strip_prefix(lead) {
            s = rest;
        }
    }
    for trail in [')', '\'', '"'] {
        if let Some(rest) = s.strip_suffix(trail) {
            s = rest;
        }
    }
    s.replace("\\r\\n", "\n")
}

/// Last segment of an object path such as
/// `Class'"/Script/Engine.StaticMeshComponent"'` or
/// `/Engine/EditorBlueprintResources/StandardMacros.StandardMacros:ForEachLoop`.
pub fn leaf(raw: &str) -> String {
    let mut path = clean(raw);
    if let (Some(open), Some(close)) = (path.find('\''), path.rfind('\'')) {
        if close > open {
            path = clean(&path[open + 1..close]);
        }
    }
    match path.rfind('.') {
        Some(dot) => path[dot + 1..].to_string(),
        None => path,
    }
}

/// Identifier for a pin or variable name: spaces removed, first letter upper-cased.
pub fn var_name(name: &str) -> String {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let mut chars = compact.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => compact,
    }
}

/// Identifier for a function name: spaces removed.
pub fn function_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}
