use praetor_core::{AttributeError, AttributeKey, AttributeValue, Context};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::request::Request;

/// Zero-argument attribute source, called on every lookup.
pub type AttributeResolver =
    Arc<dyn Fn() -> Result<AttributeValue, AttributeError> + Send + Sync>;

/// How the information point supplies one attribute.
#[derive(Clone)]
pub enum ContextDefinition {
    Value(AttributeValue),
    Resolver(AttributeResolver),
}

impl ContextDefinition {
    pub fn value(value: impl Into<AttributeValue>) -> Self {
        ContextDefinition::Value(value.into())
    }

    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn() -> Result<AttributeValue, AttributeError> + Send + Sync + 'static,
    {
        ContextDefinition::Resolver(Arc::new(resolve))
    }

    fn resolve(&self) -> Result<AttributeValue, AttributeError> {
        match self {
            ContextDefinition::Value(value) => Ok(value.clone()),
            ContextDefinition::Resolver(resolve) => resolve(),
        }
    }
}

impl fmt::Debug for ContextDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextDefinition::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ContextDefinition::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Turns a request into the context a decision is made against.
pub trait PolicyInformationPoint: Send + Sync {
    fn create_context<'a>(&'a self, request: &'a Request) -> Box<dyn Context + 'a>;
}

/// Information point backed by a fixed set of attribute definitions.
#[derive(Debug, Clone, Default)]
pub struct InformationPoint {
    definitions: HashMap<AttributeKey, ContextDefinition>,
}

impl InformationPoint {
    pub fn new(definitions: HashMap<AttributeKey, ContextDefinition>) -> Self {
        Self { definitions }
    }

    pub fn define(&mut self, key: impl Into<AttributeKey>, definition: ContextDefinition) {
        self.definitions.insert(key.into(), definition);
    }

    pub fn with_value(mut self, key: impl Into<AttributeKey>, value: impl Into<AttributeValue>) -> Self {
        self.define(key, ContextDefinition::value(value));
        self
    }

    pub fn with_resolver<F>(mut self, key: impl Into<AttributeKey>, resolve: F) -> Self
    where
        F: Fn() -> Result<AttributeValue, AttributeError> + Send + Sync + 'static,
    {
        self.define(key, ContextDefinition::resolver(resolve));
        self
    }
}

impl PolicyInformationPoint for InformationPoint {
    fn create_context<'a>(&'a self, request: &'a Request) -> Box<dyn Context + 'a> {
        Box::new(RequestContext {
            definitions: &self.definitions,
            request,
        })
    }
}

/// Context over one request. Definitions shadow request attributes.
pub struct RequestContext<'a> {
    definitions: &'a HashMap<AttributeKey, ContextDefinition>,
    request: &'a Request,
}

impl<'a> RequestContext<'a> {
    pub fn request(&self) -> &'a Request {
        self.request
    }
}

impl Context for RequestContext<'_> {
    fn has(&self, key: &AttributeKey) -> Result<bool, AttributeError> {
        Ok(self.definitions.contains_key(key) || self.request.contains(key))
    }

    fn get(&self, key: &AttributeKey) -> Result<AttributeValue, AttributeError> {
        if let Some(definition) = self.definitions.get(key) {
            return definition.resolve();
        }
        self.request
            .get(key)
            .cloned()
            .ok_or_else(|| AttributeError::Missing(key.clone()))
    }
}
