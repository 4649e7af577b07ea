//! Variable placeholders
//!
//! Manifests reference variables as `((name))`. A dotted name such as
//! `((tls.certificate))` looks up `tls` and then walks mapping keys of its
//! value. A placeholder that makes up a whole scalar is replaced by the
//! variable's value node; a placeholder embedded in a longer string is
//! replaced by the textual form of a scalar value.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use thiserror::Error;

/// Errors raised while resolving placeholders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    /// Every missing name, sorted
    #[error("unresolved variables: {}", .names.join(", "))]
    Unresolved { names: Vec<String> },

    #[error("variable '{name}' is embedded in a string but its value is not a scalar")]
    NotScalar { name: String },
}

/// Source of variable values
pub trait VariableSource {
    /// Value of the top-level variable `name`.
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl VariableSource for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<S: VariableSource + ?Sized> VariableSource for &S {
    fn lookup(&self, name: &str) -> Option<&Value> {
        (**self).lookup(name)
    }
}

/// A source without any variables
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableSource for NoVariables {
    fn lookup(&self, _name: &str) -> Option<&Value> {
        None
    }
}

struct Placeholder<'a> {
    range: Range<usize>,
    name: &'a str,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/')
}

/// Placeholders in `text`, left to right. Malformed ones are left as literal text.
fn placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find("((") {
        let open = pos + offset;
        let name_start = open + 2;
        let Some(len) = text[name_start..].find("))") else {
            break;
        };
        let name = &text[name_start..name_start + len];
        if !name.is_empty() && name.chars().all(is_name_char) {
            let end = name_start + len + 2;
            found.push(Placeholder {
                range: open..end,
                name,
            });
            pos = end;
        } else {
            pos = open + 1;
        }
    }
    found
}

/// Names referenced by placeholders anywhere in `document`, sorted.
pub fn referenced_names(document: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_names(document, &mut names);
    names
}

fn collect_names(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => names.extend(placeholders(s).into_iter().map(|p| p.name.to_string())),
        Value::Sequence(seq) => seq.iter().for_each(|v| collect_names(v, names)),
        Value::Mapping(map) => map.values().for_each(|v| collect_names(v, names)),
        Value::Tagged(tagged) => collect_names(&tagged.value, names),
        _ => {}
    }
}

fn find<'v>(vars: &'v dyn VariableSource, name: &str) -> Option<&'v Value> {
    let mut parts = name.split('.');
    let head = parts.next()?;
    parts.try_fold(vars.lookup(head)?, |value, key| {
        value.as_mapping().and_then(|m| m.get(key))
    })
}

/// Return a copy of `document` with every placeholder resolved.
///
/// All unresolved names are collected before failing, so one error lists
/// everything that is missing.
pub fn resolve(document: &Value, vars: &dyn VariableSource) -> Result<Value, VariableError> {
    let mut missing = BTreeSet::new();
    let resolved = resolve_value(document, vars, &mut missing)?;
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(VariableError::Unresolved {
            names: missing.into_iter().collect(),
        })
    }
}

fn resolve_value(
    value: &Value,
    vars: &dyn VariableSource,
    missing: &mut BTreeSet<String>,
) -> Result<Value, VariableError> {
    match value {
        Value::String(s) => resolve_string(s, vars, missing),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| resolve_value(v, vars, missing))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, vars, missing)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::Tagged(tagged) => Ok(Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: resolve_value(&tagged.value, vars, missing)?,
        }))),
        other => Ok(other.clone()),
    }
}

fn resolve_string(
    text: &str,
    vars: &dyn VariableSource,
    missing: &mut BTreeSet<String>,
) -> Result<Value, VariableError> {
    let found = placeholders(text);
    if found.is_empty() {
        return Ok(Value::String(text.to_string()));
    }

    if let [only] = found.as_slice() {
        if only.range == (0..text.len()) {
            return Ok(match find(vars, only.name) {
                Some(value) => value.clone(),
                None => {
                    missing.insert(only.name.to_string());
                    Value::String(text.to_string())
                }
            });
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for placeholder in &found {
        out.push_str(&text[last..placeholder.range.start]);
        match find(vars, placeholder.name) {
            Some(value) => out.push_str(&scalar_text(placeholder.name, value)?),
            None => {
                missing.insert(placeholder.name.to_string());
            }
        }
        last = placeholder.range.end;
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

fn scalar_text(name: &str, value: &Value) -> Result<String, VariableError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(VariableError::NotScalar {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, Value> {
        let mut vars = BTreeMap::new();
        vars.insert("domain".to_string(), Value::from("example.com"));
        vars.insert("port".to_string(), Value::from(8443));
        vars.insert(
            "tls".to_string(),
            serde_yaml::from_str("{ certificate: CERT, private_key: KEY }").unwrap(),
        );
        vars.insert(
            "zones".to_string(),
            serde_yaml::from_str("[z1, z2]").unwrap(),
        );
        vars
    }

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_whole_value_keeps_type() {
        let out = resolve(&doc("{ port: ((port)), azs: ((zones)) }"), &vars()).unwrap();
        assert_eq!(out["port"], Value::from(8443));
        assert_eq!(out["azs"], doc("[z1, z2]"));
    }

    #[test]
    fn test_embedded_placeholder_is_text() {
        let out = resolve(&doc("url: https://api.((domain)):((port))/v2"), &vars()).unwrap();
        assert_eq!(out["url"], Value::from("https://api.example.com:8443/v2"));
    }

    #[test]
    fn test_tagged_values_are_resolved() {
        let out = resolve(&doc("secret: !vault ((domain))"), &vars()).unwrap();
        let Value::Tagged(tagged) = &out["secret"] else {
            panic!("tag was lost: {out:?}");
        };
        assert_eq!(tagged.tag, "vault");
        assert_eq!(tagged.value, Value::from("example.com"));

        let err = resolve(&doc("secret: !vault ((db_password))"), &NoVariables).unwrap_err();
        assert_eq!(
            err,
            VariableError::Unresolved {
                names: vec!["db_password".into()]
            }
        );
    }

    #[test]
    fn test_dotted_name_walks_mapping() {
        let out = resolve(&doc("cert: ((tls.certificate))"), &vars()).unwrap();
        assert_eq!(out["cert"], Value::from("CERT"));
    }

    #[test]
    fn test_unresolved_names_are_sorted_and_complete() {
        let err = resolve(
            &doc("{ b: ((zeta)), a: [ ((alpha)), x-((tls.missing)) ], c: ((zeta)) }"),
            &vars(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            VariableError::Unresolved {
                names: vec!["alpha".into(), "tls.missing".into(), "zeta".into()]
            }
        );
    }

    #[test]
    fn test_embedded_non_scalar_fails() {
        let err = resolve(&doc("azs: zones=((zones))"), &vars()).unwrap_err();
        assert_eq!(err, VariableError::NotScalar { name: "zones".into() });
    }

    #[test]
    fn test_malformed_placeholders_stay_literal() {
        let input = doc("{ a: '(( spaced ))', b: '((unterminated', c: '(((domain)))' }");
        let out = resolve(&input, &vars()).unwrap();
        assert_eq!(out["a"], Value::from("(( spaced ))"));
        assert_eq!(out["b"], Value::from("((unterminated"));
        assert_eq!(out["c"], Value::from("(example.com)"));
    }

    #[test]
    fn test_referenced_names() {
        let names = referenced_names(&doc("{ a: ((x)), b: [ '((y)) and ((x))' ] }"));
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_no_variables() {
        assert!(resolve(&doc("a: plain"), &NoVariables).is_ok());
        assert!(resolve(&doc("a: ((x))"), &NoVariables).is_err());
    }
}
