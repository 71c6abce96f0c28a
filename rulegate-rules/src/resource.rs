//! Field access on resource instances.
//!
//! Rules read resources through `Resource.a.b` paths. A resource type
//! exposes those paths by implementing [`Resource`].

use serde::Serialize;
use std::sync::Arc;

use crate::value::Value;

/// A type whose fields rules can read.
///
/// Return `None` for paths the type does not have; evaluation then fails
/// with [`EvalError::FieldNotFound`](crate::EvalError::FieldNotFound).
///
/// # Example
///
/// ```
/// use rulegate_rules::{Resource, Value};
///
/// struct Team { name: String, coach: String }
///
/// impl Resource for Team {
///     fn field(&self, path: &[String]) -> Option<Value> {
///         match path {
///             [f] if f == "Name" => Some(self.name.clone().into()),
///             [a, b] if a == "Coach" && b == "Name" => Some(self.coach.clone().into()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Resource {
    /// Read the value at `path`.
    fn field(&self, path: &[String]) -> Option<Value>;
}

impl<R: Resource + ?Sized> Resource for &R {
    fn field(&self, path: &[String]) -> Option<Value> {
        (**self).field(path)
    }
}

impl<R: Resource + ?Sized> Resource for Box<R> {
    fn field(&self, path: &[String]) -> Option<Value> {
        (**self).field(path)
    }
}

impl<R: Resource + ?Sized> Resource for Arc<R> {
    fn field(&self, path: &[String]) -> Option<Value> {
        (**self).field(path)
    }
}

impl Resource for serde_json::Value {
    fn field(&self, path: &[String]) -> Option<Value> {
        json_field(self, path)
    }
}

/// Walk a JSON document along `path`.
///
/// Missing members resolve to `None`; explicit nulls to [`Value::Null`].
pub fn json_field(root: &serde_json::Value, path: &[String]) -> Option<Value> {
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    Value::from_json(current)
}

/// Read a field from any serializable value.
///
/// Serializes on every call; types on a hot path should implement
/// [`Resource`] directly.
pub fn serialized_field<T: Serialize + ?Sized>(value: &T, path: &[String]) -> Option<Value> {
    let json = serde_json::to_value(value).ok()?;
    json_field(&json, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_json_resource() {
        let team = json!({ "Name": "Team A", "Coach": { "Name": "Luigi", "Age": 41 }, "Sponsor": null });
        assert_eq!(team.field(&path("Coach.Name")), Some(Value::Str("Luigi".into())));
        assert_eq!(team.field(&path("Coach.Age")), Some(Value::Int(41)));
        assert_eq!(team.field(&path("Sponsor")), Some(Value::Null));
        assert_eq!(team.field(&path("Coach.Email")), None);
        assert_eq!(team.field(&path("Coach")), None);
    }

    #[test]
    fn test_serialized_field() {
        #[derive(Serialize)]
        struct Machine {
            serial: String,
            hours: u32,
        }

        let machine = Machine {
            serial: "M-1".into(),
            hours: 1200,
        };
        assert_eq!(serialized_field(&machine, &path("hours")), Some(Value::Int(1200)));
        assert_eq!(serialized_field(&machine, &path("owner")), None);
    }
}
