//! Instantiation-independent member keys.
//!
//! A call site names its callee closed (`Demo.Outer`1<System.Int32>::Run<System.Single>`)
//! while the declaration it must be joined against is open
//! (`Demo.Outer`1<!0>::Run<!!0>`). Both canonicalize to `Demo.Outer`1::Run`1`:
//!
//! 1. split the full name on `::` (outside brackets)
//! 2. strip every `<...>` list from every segment
//! 3. suffix the final segment with the member's own generic arity
//!
//! Nested declaring types lose their argument lists too, so only the innermost
//! member's arity survives.

use jobmono_types::{MethodRef, MEMBER_SEPARATOR};

pub fn canonicalize(method: &MethodRef) -> String {
    canonicalize_name(&method.full_name(), method.generic_arity as usize)
}

/// Canonical key of `full_name` for a member of the given generic arity.
pub fn canonicalize_name(full_name: &str, arity: usize) -> String {
    let segments = split_members(full_name);
    let last = segments.len().saturating_sub(1);
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let stripped = strip_generic_args(segment);
            if i == last {
                format!("{}`{}", stripped, arity)
            } else {
                stripped
            }
        })
        .collect::<Vec<_>>()
        .join(MEMBER_SEPARATOR)
}

/// Split on the member separator, ignoring separators inside brackets.
fn split_members(full_name: &str) -> Vec<&str> {
    let bytes = full_name.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                out.push(&full_name[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out.push(&full_name[start..]);
    out
}

/// Remove every angle-bracket argument list, nested ones included.
pub fn strip_generic_args(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut depth = 0usize;
    for c in segment.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
