use praetor_core::{AttributeError, AttributeKey, AttributeValue, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attributes supplied by the caller for one authorization request.
///
/// In JSON a request is an object when every key is a name, and a list of
/// `[key, value]` pairs otherwise, so integer keys survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RequestRepr", into = "RequestRepr")]
pub struct Request {
    attributes: BTreeMap<AttributeKey, AttributeValue>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RequestRepr {
    Named(BTreeMap<String, AttributeValue>),
    Pairs(Vec<(AttributeKey, AttributeValue)>),
}

impl From<RequestRepr> for Request {
    fn from(repr: RequestRepr) -> Self {
        match repr {
            RequestRepr::Named(map) => map.into_iter().collect(),
            RequestRepr::Pairs(pairs) => pairs.into_iter().collect(),
        }
    }
}

impl From<Request> for RequestRepr {
    fn from(request: Request) -> Self {
        if request
            .attributes
            .keys()
            .all(|k| matches!(k, AttributeKey::Name(_)))
        {
            RequestRepr::Named(
                request
                    .attributes
                    .into_iter()
                    .filter_map(|(k, v)| match k {
                        AttributeKey::Name(name) => Some((name, v)),
                        AttributeKey::Index(_) => None,
                    })
                    .collect(),
            )
        } else {
            RequestRepr::Pairs(request.attributes.into_iter().collect())
        }
    }
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<AttributeKey>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an attribute, returning the previous value if there was one.
    pub fn insert(
        &mut self,
        key: impl Into<AttributeKey>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &AttributeValue)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Request
where
    K: Into<AttributeKey>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Context for Request {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError> {
        Ok(self.contains(key))
    }

    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError> {
        Request::get(self, key)
            .cloned()
            .ok_or_else(|| AttributeError::Missing(key.clone()))
    }
}
