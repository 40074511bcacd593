//! Property values as JSON.
//!
//! | kind      | written as                      |
//! |-----------|---------------------------------|
//! | `Enum`    | the value's name                |
//! | `Flags`   | array of bit names, table order |
//! | `Vector2` | `[x, y]`                        |
//! | `Color`   | `[r, g, b, a]`                  |
//! | others    | the plain JSON scalar           |

use serde_json::Value as Json;

use crate::error::LoadError;
use crate::registry::{Color, PropertyKind, Registry, Value, Vec2};

pub(crate) fn encode(registry: &Registry, kind: PropertyKind, value: &Value) -> Json {
    match (kind, value) {
        (PropertyKind::Enum(id), Value::Int(v)) => match registry.enum_map(id).to_name(*v) {
            Some(name) => Json::from(name),
            None => Json::from(*v),
        },
        (PropertyKind::Flags(id), Value::Int(v)) => {
            Json::from(registry.enum_map(id).flags_to_names(*v))
        }
        (_, Value::None) => Json::Null,
        (_, Value::Bool(b)) => Json::from(*b),
        (_, Value::Int(i)) => Json::from(*i),
        (_, Value::Float(f)) => Json::from(*f),
        (_, Value::String(s)) => Json::from(s.as_str()),
        (_, Value::Vector2(v)) => Json::from(vec![v.x, v.y]),
        (_, Value::Color(c)) => Json::from(vec![c.r, c.g, c.b, c.a]),
    }
}

pub(crate) fn decode(
    registry: &Registry,
    property: &str,
    kind: PropertyKind,
    json: &Json,
) -> Result<Value, LoadError> {
    let invalid = |reason: &str| LoadError::InvalidValue {
        property: property.to_owned(),
        reason: reason.to_owned(),
    };

    let value = match kind {
        PropertyKind::Bool => json.as_bool().map(Value::Bool),
        PropertyKind::Int => json.as_i64().map(Value::Int),
        PropertyKind::Float => json.as_f64().map(Value::Float),
        PropertyKind::String => json.as_str().map(Value::from),
        PropertyKind::Vector2 => numbers(json)
            .filter(|n| n.len() == 2)
            .map(|n| Value::Vector2(Vec2::new(n[0], n[1]))),
        PropertyKind::Color => numbers(json).and_then(|n| match n[..] {
            [r, g, b, a] => Some(Value::Color(Color::rgba(r, g, b, a))),
            [r, g, b] => Some(Value::Color(Color::rgba(r, g, b, 1.0))),
            _ => None,
        }),
        PropertyKind::Enum(id) => {
            let map = registry.enum_map(id);
            match json {
                Json::String(name) => {
                    let v = map
                        .to_value(name)
                        .ok_or_else(|| invalid(&format!("unknown {} '{name}'", map.name())))?;
                    Some(Value::Int(v))
                }
                other => other.as_i64().map(Value::Int),
            }
        }
        PropertyKind::Flags(id) => {
            let map = registry.enum_map(id);
            match json {
                Json::Array(items) => {
                    let names: Option<Vec<&str>> = items.iter().map(Json::as_str).collect();
                    let names = names.ok_or_else(|| invalid("flag names must be strings"))?;
                    let v = map
                        .names_to_flags(names)
                        .ok_or_else(|| invalid(&format!("unknown {} flag", map.name())))?;
                    Some(Value::Int(v))
                }
                other => other.as_i64().map(Value::Int),
            }
        }
    };
    value.ok_or_else(|| invalid(&format!("expected {kind:?}, found {json}")))
}

fn numbers(json: &Json) -> Option<Vec<f64>> {
    json.as_array()?.iter().map(Json::as_f64).collect()
}
