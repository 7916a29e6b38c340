//! Type reference text parsing.
//!
//! Parses the scoped text form produced by [`TypeRef::scoped_name`]:
//!
//! - Named types: `[corlib]System.Int32`, `[Game]Demo.Outer/Inner`
//! - Generic instances: `[Game]Demo.Job`1<[corlib]System.Boolean>`
//! - Generic parameters: `!0` (type-level), `!!0` (method-level)
//! - Arrays and by-refs: `[corlib]System.Int32[]`, `!!0&`
//!
//! Type names must not contain any of `< > , [ ] & !`; compiler-generated
//! containers use `$` instead of angle brackets.

use crate::model::{TypeName, TypeRef};

const RESERVED: &[char] = &['<', '>', ',', '[', ']', '&', '!'];

/// Parse a scoped type reference string into a [`TypeRef`].
pub fn parse_type_ref(text: &str) -> Result<TypeRef, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty type reference".to_string());
    }

    if let Some(inner) = text.strip_suffix('&') {
        return Ok(TypeRef::by_ref(parse_type_ref(inner)?));
    }
    if let Some(inner) = text.strip_suffix("[]") {
        return Ok(TypeRef::array_of(parse_type_ref(inner)?));
    }
    if let Some(pos) = text.strip_prefix("!!") {
        return parse_position(pos, text).map(TypeRef::method_param);
    }
    if let Some(pos) = text.strip_prefix('!') {
        return parse_position(pos, text).map(TypeRef::type_param);
    }

    let rest = text
        .strip_prefix('[')
        .ok_or_else(|| format!("type reference is missing its [scope]: {}", text))?;
    let close = rest
        .find(']')
        .ok_or_else(|| format!("unterminated scope in type reference: {}", text))?;
    let scope = &rest[..close];
    let name_part = &rest[close + 1..];

    let (base, args_str) = match name_part.find('<') {
        Some(angle) => (&name_part[..angle], Some(&name_part[angle..])),
        None => (name_part, None),
    };
    validate_name(base, text)?;
    let definition = TypeName::new(scope, base);

    match args_str {
        None => Ok(TypeRef::Named(definition)),
        Some(args_str) => {
            let inner = args_str
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
                .ok_or_else(|| format!("malformed generic argument list: {}", text))?;
            let args = split_type_params(inner)
                .into_iter()
                .map(parse_type_ref)
                .collect::<Result<Vec<_>, _>>()?;
            if args.is_empty() {
                return Err(format!("generic instance without arguments: {}", text));
            }
            Ok(TypeRef::instance(definition, args))
        }
    }
}

fn parse_position(pos: &str, text: &str) -> Result<u16, String> {
    pos.parse::<u16>()
        .map_err(|_| format!("invalid generic parameter position: {}", text))
}

fn validate_name(name: &str, text: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("empty type name in: {}", text));
    }
    if name.contains(RESERVED) {
        return Err(format!("reserved character in type name '{}'", name));
    }
    Ok(())
}

/// Err when `name` would not read back unchanged from the scoped text form.
pub(crate) fn check_writable(name: &TypeName) -> Result<(), String> {
    for part in [&name.scope, &name.full_name] {
        if part.trim() != part.as_str() {
            return Err(format!("surrounding whitespace in type name part '{}'", part));
        }
    }
    if name.scope.contains(RESERVED) {
        return Err(format!("reserved character in scope '{}'", name.scope));
    }
    validate_name(&name.full_name, &name.full_name)
}

/// Split a generic argument list respecting nested brackets.
///
/// Given `"A, B<C, D>, E"`, returns `["A", "B<C, D>", "E"]`.
pub fn split_type_params(s: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => depth -= 1,
            ',' if depth == 0 => {
                result.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < s.len() && !s[start..].trim().is_empty() {
        result.push(s[start..].trim());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OwnerKind;

    #[test]
    fn test_parse_named_and_params() {
        let t = parse_type_ref("[corlib]System.Int32").unwrap();
        assert_eq!(t, TypeRef::named("corlib", "System.Int32"));

        assert!(matches!(
            parse_type_ref("!!3").unwrap(),
            TypeRef::Param(p) if p.owner == OwnerKind::Method && p.position == 3
        ));
        assert!(matches!(
            parse_type_ref("!1").unwrap(),
            TypeRef::Param(p) if p.owner == OwnerKind::Type && p.position == 1
        ));
    }

    #[test]
    fn test_parse_nested_instance() {
        let text = "[Game]Demo.Pair`2<[corlib]System.Int32[],[Game]Demo.Job`1<!!0>>&";
        let t = parse_type_ref(text).unwrap();
        assert!(matches!(t, TypeRef::ByRef(_)));
        assert_eq!(t.scoped_name(), text);
        assert_eq!(t.full_name(), "Demo.Pair`2<System.Int32[],Demo.Job`1<!!0>>&");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_type_ref("").is_err());
        assert!(parse_type_ref("System.Int32").is_err());
        assert!(parse_type_ref("[corlib]Bad<").is_err());
        assert!(parse_type_ref("[Game]Demo.Job`1<>").is_err());
        assert!(parse_type_ref("!x").is_err());
    }

    #[test]
    fn test_split_type_params() {
        let params = split_type_params("[a]X, [a]Y<[b]Z, [b]W>, !0");
        assert_eq!(params, vec!["[a]X", "[a]Y<[b]Z, [b]W>", "!0"]);
        assert!(split_type_params("").is_empty());
    }
}
