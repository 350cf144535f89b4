//! Wire-level domain model: events, items, usage, and user input.

use serde::{Serialize, Serializer};
use serde_json::Value;

pub mod events;
pub mod input;
pub mod items;

/// Serialize `inner` as a JSON object with an extra `type` discriminator.
///
/// Event and item payload structs do not carry their own discriminator; it is
/// attached here so the output matches the agent's wire format exactly.
pub(crate) fn serialize_tagged<S, T>(serializer: S, kind: &str, inner: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    #[derive(Serialize)]
    struct Tagged<'a, T> {
        #[serde(rename = "type")]
        kind: &'a str,
        #[serde(flatten)]
        inner: &'a T,
    }

    Tagged { kind, inner }.serialize(serializer)
}

/// Extract the `type` discriminator from a JSON record.
///
/// Returns an error message naming `what` when the field is absent or not a
/// string.
pub(crate) fn discriminator<'a>(value: &'a Value, what: &str) -> Result<&'a str, String> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required field: `type` in {what}"))
}
