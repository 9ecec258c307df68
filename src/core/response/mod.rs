use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};
use url::Url;

const ACCEPTED: &str = "accepted";
const REJECTED: &str = "rejected";

/// What the verifier made of a dispatched authorization response.
///
/// Encoded as a single-key object: `{"accepted": <url or null>}` or `{"rejected": "<reason>"}`.
/// [RedirectUri](DispatchOutcome::RedirectUri) is encoded like
/// [Accepted](DispatchOutcome::Accepted), and decodes as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted(Option<Url>),
    Rejected(String),
    RedirectUri(Option<Url>),
}

impl Default for DispatchOutcome {
    fn default() -> Self {
        DispatchOutcome::Accepted(None)
    }
}

impl Serialize for DispatchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            DispatchOutcome::Accepted(uri) | DispatchOutcome::RedirectUri(uri) => {
                map.serialize_entry(ACCEPTED, uri)?
            }
            DispatchOutcome::Rejected(reason) => map.serialize_entry(REJECTED, reason)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DispatchOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut object = Map::<String, Json>::deserialize(deserializer)?;

        if let Some(accepted) = object.remove(ACCEPTED) {
            let uri = Option::<Url>::deserialize(accepted).map_err(de::Error::custom)?;
            return Ok(DispatchOutcome::Accepted(uri));
        }
        if let Some(rejected) = object.remove(REJECTED) {
            let reason = String::deserialize(rejected).map_err(de::Error::custom)?;
            return Ok(DispatchOutcome::Rejected(reason));
        }

        Err(de::Error::custom(format!(
            "data corrupted: expected one of '{ACCEPTED}' or '{REJECTED}'"
        )))
    }
}
