//! Deep merge of compose documents
//!
//! `overlay` is merged into `base` key by key:
//! mappings recurse, sequences concatenate (base first), equal leaves are
//! left alone and unequal leaves are handed to a [`ConflictResolver`] or
//! rejected with [`SwarmComposeError::MergeConflict`].

use super::config::mapping_pairs;
use crate::error::{Result, SwarmComposeError};
use serde_yaml::{Mapping, Value};

/// Decides the merged value when two documents disagree on a leaf
pub trait ConflictResolver {
    /// Resolve the conflict at `path` by updating `base` in place
    fn resolve(&self, path: &[String], base: &mut Value, overlay: &Value) -> Result<()>;
}

impl<F> ConflictResolver for F
where
    F: Fn(&[String], &mut Value, &Value) -> Result<()>,
{
    fn resolve(&self, path: &[String], base: &mut Value, overlay: &Value) -> Result<()> {
        self(path, base, overlay)
    }
}

/// Merge `overlay` into `base` and return the result
pub fn merge(
    mut base: Value,
    overlay: &Value,
    resolver: Option<&dyn ConflictResolver>,
) -> Result<Value> {
    let mut path = Vec::new();
    merge_value(&mut base, overlay, &mut path, resolver)?;
    Ok(base)
}

/// Merge documents in order; later documents extend earlier ones
pub fn merge_all<I>(documents: I) -> Result<Value>
where
    I: IntoIterator<Item = Value>,
{
    let mut documents = documents.into_iter();
    let Some(mut merged) = documents.next() else {
        return Ok(Value::Mapping(Mapping::new()));
    };
    for document in documents {
        merged = merge(merged, &document, None)?;
    }
    Ok(merged)
}

fn merge_value(
    base: &mut Value,
    overlay: &Value,
    path: &mut Vec<String>,
    resolver: Option<&dyn ConflictResolver>,
) -> Result<()> {
    if *base == *overlay {
        return Ok(());
    }

    match (base, overlay) {
        (base @ Value::Null, overlay) if path.is_empty() => {
            *base = overlay.clone();
            Ok(())
        }
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            merge_mapping(base, overlay, path, resolver)
        }
        (Value::Sequence(base), Value::Sequence(overlay)) => {
            extend_unique(base, overlay);
            Ok(())
        }
        (base, overlay) => match resolver {
            Some(resolver) => resolver.resolve(path, base, overlay),
            None => Err(SwarmComposeError::MergeConflict {
                path: path.join("."),
            }),
        },
    }
}

fn merge_mapping(
    base: &mut Mapping,
    overlay: &Mapping,
    path: &mut Vec<String>,
    resolver: Option<&dyn ConflictResolver>,
) -> Result<()> {
    for (key, value) in overlay {
        match base.get_mut(key) {
            None => {
                base.insert(key.clone(), value.clone());
            }
            Some(existing) => {
                path.push(key_name(key));
                let result = merge_value(existing, value, path, resolver);
                path.pop();
                result?;
            }
        }
    }
    Ok(())
}

/// Append overlay items that are not already present
fn extend_unique(base: &mut Vec<Value>, overlay: &[Value]) {
    for item in overlay {
        if !base.contains(item) {
            base.push(item.clone());
        }
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

/// Conflict resolver used when merging an `extends` target into a service.
///
/// `environment` may be written as a mapping on one side and a list on the
/// other; both are flattened into `KEY=value` tokens with the overlay's
/// tokens first. Any other conflicting key keeps the base value.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentMerge;

impl ConflictResolver for EnvironmentMerge {
    fn resolve(&self, path: &[String], base: &mut Value, overlay: &Value) -> Result<()> {
        if path.last().map(String::as_str) != Some("environment") {
            return Ok(());
        }

        let merged = match (&*base, overlay) {
            (Value::Mapping(map), Value::Sequence(list)) => {
                let mut tokens = list.clone();
                tokens.extend(env_tokens(map, path)?);
                tokens
            }
            (Value::Sequence(list), Value::Mapping(map)) => {
                let mut tokens = env_tokens(map, path)?;
                tokens.extend(list.iter().cloned());
                tokens
            }
            _ => {
                return Err(SwarmComposeError::InvalidConfig(format!(
                    "Unknown type of \"{}\" value (should be either list or mapping)",
                    path.join(".")
                )))
            }
        };

        *base = Value::Sequence(merged);
        Ok(())
    }
}

fn env_tokens(map: &Mapping, path: &[String]) -> Result<Vec<Value>> {
    let pairs = mapping_pairs(map).map_err(|reason| {
        SwarmComposeError::InvalidConfig(format!("{}: {}", path.join("."), reason))
    })?;
    Ok(pairs
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => Value::String(format!("{}={}", key, value)),
            None => Value::String(key),
        })
        .collect())
}
