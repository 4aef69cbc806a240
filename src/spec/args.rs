//! Build argument substitution
//!
//! Args are literal `${NAME}` string substitutions performed once at load
//! time, before anything executes. A `${NAME}` referencing an undeclared
//! arg is left as a literal; a request supplying an undeclared arg is an
//! error.

use std::collections::BTreeMap;

use crate::error::{PacksmithError, Result};

/// Merge request-supplied args over the spec's declared defaults
///
/// Every request arg must be declared in the spec; the declared value is
/// the default used when the request does not supply one.
pub fn merge_args(
    declared: &BTreeMap<String, String>,
    request: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut merged = declared.clone();
    for (key, value) in request {
        if !declared.contains_key(key) {
            return Err(PacksmithError::UnknownArg { name: key.clone() });
        }
        merged.insert(key.clone(), value.clone());
    }
    Ok(merged)
}

/// Replace `${NAME}` occurrences with the named arg's value
///
/// Unknown names and malformed references stay literal.
pub fn expand(input: &str, args: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                let name = &tail[..end];
                match args.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Expand every value of a map in place
pub fn expand_map(map: &mut BTreeMap<String, String>, args: &BTreeMap<String, String>) {
    for value in map.values_mut() {
        *value = expand(value, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_known_arg() {
        let a = args(&[("VERSION", "1.2.3")]);
        assert_eq!(expand("v${VERSION}-final", &a), "v1.2.3-final");
    }

    #[test]
    fn test_expand_unknown_stays_literal() {
        let a = args(&[("VERSION", "1.2.3")]);
        assert_eq!(expand("${NOPE}", &a), "${NOPE}");
    }

    #[test]
    fn test_expand_unterminated_reference() {
        let a = args(&[("V", "x")]);
        assert_eq!(expand("a${V", &a), "a${V");
    }

    #[test]
    fn test_expand_multiple() {
        let a = args(&[("A", "1"), ("B", "2")]);
        assert_eq!(expand("${A}${B}${A}", &a), "121");
    }

    #[test]
    fn test_merge_args_rejects_undeclared() {
        let declared = args(&[("OK", "default")]);
        let request = args(&[("NOPE", "x")]);
        let err = merge_args(&declared, &request).unwrap_err();
        assert!(matches!(err, PacksmithError::UnknownArg { .. }));
    }

    #[test]
    fn test_merge_args_overrides_default() {
        let declared = args(&[("OK", "default")]);
        let request = args(&[("OK", "given")]);
        let merged = merge_args(&declared, &request).unwrap();
        assert_eq!(merged["OK"], "given");
    }
}
