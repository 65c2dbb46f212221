//! Specialised per-class property accessors, generated on first use.
//!
//! Generation is optional. A class whose accessor cannot be generated is
//! served by the generic fallback resolver instead.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    error::RuntimeErrorKind,
    reflect::{Class, ClassKey, Field},
    resolver::{GetResolver, SetResolver, property_name},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("class {0} exposes no fields")]
    NoFields(&'static str),
    #[error("accessor generation unsupported for {class}: {reason}")]
    Unsupported { class: &'static str, reason: String },
}

/// A generated getter/setter pair for one class.
#[derive(Clone)]
pub struct GeneratedAccessor {
    pub getter: Arc<dyn GetResolver>,
    pub setter: Arc<dyn SetResolver>,
}

pub trait AccessorGenerator: Send + Sync {
    fn generate(&self, class: &'static Class) -> Result<GeneratedAccessor, GenerateError>;
}

/// Builds a hashed field index for the class, replacing the linear scan of
/// the fallback resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldTableGenerator;

impl AccessorGenerator for FieldTableGenerator {
    fn generate(&self, class: &'static Class) -> Result<GeneratedAccessor, GenerateError> {
        if class.fields.is_empty() {
            return Err(GenerateError::NoFields(class.name));
        }
        let accessor = Arc::new(FieldTable {
            class,
            index: class.fields.iter().map(|f| (f.name, f)).collect(),
        });
        Ok(GeneratedAccessor {
            getter: Arc::clone(&accessor) as Arc<dyn GetResolver>,
            setter: accessor,
        })
    }
}

struct FieldTable {
    class: &'static Class,
    index: HashMap<&'static str, &'static Field>,
}

impl FieldTable {
    fn no_such_property(&self, property: &Value) -> RuntimeErrorKind {
        RuntimeErrorKind::NoSuchProperty {
            type_name: self.class.name.to_owned(),
            property: property.to_string(),
        }
    }
}

impl GetResolver for FieldTable {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Host(host) = bean else {
            return Err(self.no_such_property(property));
        };
        property_name(property)
            .and_then(|name| self.index.get(name))
            .and_then(|field| (field.get)(host.as_any()))
            .ok_or_else(|| self.no_such_property(property))
    }
}

impl SetResolver for FieldTable {
    fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind> {
        let Value::Host(host) = bean else {
            return Ok(false);
        };
        let setter = property_name(property)
            .and_then(|name| self.index.get(name))
            .and_then(|field| field.set);
        Ok(setter.is_some_and(|set| set(host.as_any(), &value)))
    }
}

/// Process-wide cache of generated accessors keyed by class.
///
/// Concurrent first use may generate an accessor more than once; the first
/// one inserted wins and the rest are dropped.
pub struct AccessorCache {
    generator: Box<dyn AccessorGenerator>,
    accessors: DashMap<ClassKey, GeneratedAccessor>,
}

impl AccessorCache {
    pub fn new<G: AccessorGenerator + 'static>(generator: G) -> Self {
        Self {
            generator: Box::new(generator),
            accessors: DashMap::new(),
        }
    }

    /// Returns the accessor for `class`, generating it on first use. A
    /// generation failure is logged and reported as `None`.
    pub fn get_or_generate(&self, class: &'static Class) -> Option<GeneratedAccessor> {
        let key = class.key();
        if let Some(found) = self.accessors.get(&key) {
            return Some(found.value().clone());
        }
        match self.generator.generate(class) {
            Ok(accessor) => Some(self.accessors.entry(key).or_insert(accessor).value().clone()),
            Err(error) => {
                debug!(class = class.name, %error, "accessor generation failed, using fallback");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}
