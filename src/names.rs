// Identifier conventions for the generated Go sources.

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// Exported Go identifier for a proto field name.
///
/// `first_name` becomes `FirstName`. A leading underscore becomes `X` so
/// the result is still exported, and a letter after a digit is uppercased.
pub fn exported(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    if name.starts_with('_') {
        out.push('X');
        chars.next();
    }

    let mut upper_next = true;
    while let Some(c) = chars.next() {
        if c == '_' {
            if chars.peek().is_some_and(|n| n.is_ascii_lowercase()) {
                upper_next = true;
            } else {
                out.push('_');
            }
            continue;
        }
        if c.is_ascii_digit() {
            out.push(c);
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Methods every generated message carries.
const MESSAGE_METHODS: &[&str] = &["New", "Type", "Descriptor", "Encode", "Decode", "IsZero"];

/// Exported struct field name; a clash with a generated method gets a
/// trailing underscore.
pub fn field_name(proto_name: &str) -> String {
    let name = exported(proto_name);
    if MESSAGE_METHODS.contains(&name.as_str()) { format!("{name}_") } else { name }
}

/// Upper-cases the first character only.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Local identifier safe to use as a Go variable or parameter.
pub fn sanitize_local(name: &str) -> String {
    if GO_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Lowercase file stem: `Users/Model.proto` becomes `model`.
pub fn file_stem(source: &str) -> String {
    let base = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    stem.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_names() {
        assert_eq!(exported("first_name"), "FirstName");
        assert_eq!(exported("id"), "Id");
        assert_eq!(exported("_hidden"), "XHidden");
        assert_eq!(exported("field_1x"), "Field_1X");
        assert_eq!(exported("alreadyCamel"), "AlreadyCamel");
    }

    #[test]
    fn field_names_avoid_method_clashes() {
        assert_eq!(field_name("type"), "Type_");
        assert_eq!(field_name("is_zero"), "IsZero_");
        assert_eq!(field_name("type_id"), "TypeId");
    }

    #[test]
    fn service_names_and_capitalize() {
        assert_eq!(exported("user_admin"), "UserAdmin");
        assert_eq!(exported("Users"), "Users");
        assert_eq!(capitalize("http_rule"), "Http_rule");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn stems() {
        assert_eq!(file_stem("users/Model.proto"), "model");
        assert_eq!(file_stem("C:\\x\\Service.v1.proto"), "service.v1");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn keywords_get_suffix() {
        assert_eq!(sanitize_local("type"), "type_");
        assert_eq!(sanitize_local("value"), "value");
    }
}
