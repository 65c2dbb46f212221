//! Built-in resolvers for the script value types, and the generic fallback.

use std::sync::Arc;

use crate::{
    encoding::Encoding,
    error::RuntimeErrorKind,
    reflect,
    resolver::{
        GetResolver, Registrar, Registration, ResolverManager, SetResolver, ToBytesResolver,
        property_name,
    },
    value::Value,
};

fn no_such_property(bean: &Value, property: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::NoSuchProperty {
        type_name: bean.type_name().to_owned(),
        property: property.to_string(),
    }
}

fn len_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

/// Resolves an integer key against a sequence of `len` elements.
fn checked_index(index: i64, len: usize) -> Result<usize, RuntimeErrorKind> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or(RuntimeErrorKind::IndexOutOfBounds { index, len })
}

/// Generic fallback shared by every class without a more specific resolver.
///
/// Host beans are read and written through a linear scan of their class
/// fields. Serialization encodes the display form.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonResolver;

impl GetResolver for CommonResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        if let Value::Host(host) = bean {
            if let Some(value) = property_name(property)
                .and_then(|name| host.class().field(name))
                .and_then(|field| (field.get)(host.as_any()))
            {
                return Ok(value);
            }
        }
        Err(no_such_property(bean, property))
    }
}

impl SetResolver for CommonResolver {
    fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind> {
        let Value::Host(host) = bean else {
            return Ok(false);
        };
        let setter = property_name(property)
            .and_then(|name| host.class().field(name))
            .and_then(|field| field.set);
        Ok(setter.is_some_and(|set| set(host.as_any(), &value)))
    }
}

impl ToBytesResolver for CommonResolver {
    fn to_bytes(&self, bean: &Value, encoding: &str) -> Result<Arc<[u8]>, RuntimeErrorKind> {
        Ok(Encoding::for_name(encoding)?.encode(&bean.to_string()).into())
    }
}

/// `list[i]`, `list.size`, `list.isEmpty`, and `list[i] = v`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListResolver;

impl GetResolver for ListResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::List(list) = bean else {
            return Err(no_such_property(bean, property));
        };
        let items = list.read();
        match property {
            Value::Int(index) => {
                let index = checked_index(*index, items.len())?;
                Ok(items.get(index).cloned().unwrap_or_default())
            }
            Value::Str(name) => match &**name {
                "size" | "length" => Ok(len_value(items.len())),
                "isEmpty" => Ok(Value::Bool(items.is_empty())),
                _ => Err(no_such_property(bean, property)),
            },
            _ => Err(no_such_property(bean, property)),
        }
    }
}

impl SetResolver for ListResolver {
    fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind> {
        let (Value::List(list), Value::Int(index)) = (bean, property) else {
            return Ok(false);
        };
        let mut items = list.write();
        let index = checked_index(*index, items.len())?;
        if let Some(slot) = items.get_mut(index) {
            *slot = value;
        }
        Ok(true)
    }
}

/// Map entry access by key. Missing keys read as `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapResolver;

fn map_key(property: &Value) -> Arc<str> {
    match property {
        Value::Str(key) => Arc::clone(key),
        other => other.to_string().into(),
    }
}

impl GetResolver for MapResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Map(map) = bean else {
            return Err(no_such_property(bean, property));
        };
        Ok(map.read().get(&map_key(property)).cloned().unwrap_or_default())
    }
}

impl SetResolver for MapResolver {
    fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind> {
        let Value::Map(map) = bean else {
            return Ok(false);
        };
        map.write().insert(map_key(property), value);
        Ok(true)
    }
}

/// Character access and length of strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringResolver;

impl GetResolver for StringResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Str(text) = bean else {
            return Err(no_such_property(bean, property));
        };
        match property {
            Value::Int(index) => {
                let len = text.chars().count();
                let index = checked_index(*index, len)?;
                Ok(text
                    .chars()
                    .nth(index)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default())
            }
            Value::Str(name) => match &**name {
                "length" | "size" => Ok(len_value(text.chars().count())),
                "isEmpty" => Ok(Value::Bool(text.is_empty())),
                _ => Err(no_such_property(bean, property)),
            },
            _ => Err(no_such_property(bean, property)),
        }
    }
}

impl ToBytesResolver for StringResolver {
    fn to_bytes(&self, bean: &Value, encoding: &str) -> Result<Arc<[u8]>, RuntimeErrorKind> {
        let encoding = Encoding::for_name(encoding)?;
        Ok(match bean {
            Value::Str(text) => encoding.encode(text).into(),
            other => encoding.encode(&other.to_string()).into(),
        })
    }
}

/// Byte access and length of byte strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesResolver;

impl GetResolver for BytesResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Bytes(bytes) = bean else {
            return Err(no_such_property(bean, property));
        };
        match property {
            Value::Int(index) => {
                let index = checked_index(*index, bytes.len())?;
                Ok(bytes
                    .get(index)
                    .map(|b| Value::Int(i64::from(*b)))
                    .unwrap_or_default())
            }
            Value::Str(name) if matches!(&**name, "length" | "size") => Ok(len_value(bytes.len())),
            _ => Err(no_such_property(bean, property)),
        }
    }
}

/// `from`, `to` and `size` of a range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RangeResolver;

impl GetResolver for RangeResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Range { from, to } = *bean else {
            return Err(no_such_property(bean, property));
        };
        match property_name(property) {
            Some("from") => Ok(Value::Int(from)),
            Some("to") => Ok(Value::Int(to)),
            Some("size") => Ok(Value::Int(from.abs_diff(to).try_into().unwrap_or(i64::MAX).saturating_add(1))),
            _ => Err(no_such_property(bean, property)),
        }
    }
}

/// Loop status properties of a live iterator (`for.iter`).
///
/// `isOdd`/`isEven` count from one, so the first item is odd.
#[derive(Debug, Default, Clone, Copy)]
pub struct IterResolver;

impl GetResolver for IterResolver {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        let Value::Iter(handle) = bean else {
            return Err(no_such_property(bean, property));
        };
        let mut iter = handle.lock();
        let index = iter.index();
        match property_name(property) {
            Some("index") => Ok(Value::Int(index)),
            Some("hasNext") => Ok(Value::Bool(iter.has_next()?)),
            Some("isFirst") => Ok(Value::Bool(index == 0)),
            Some("isLast") => Ok(Value::Bool(!iter.has_next()?)),
            Some("isOdd") => Ok(Value::Bool(index % 2 == 0)),
            Some("isEven") => Ok(Value::Bool(index % 2 != 0)),
            _ => Err(no_such_property(bean, property)),
        }
    }
}

/// Registers the resolvers for the built-in value types.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolvers;

impl Registrar for DefaultResolvers {
    fn register(&self, manager: &mut ResolverManager) {
        let string = Arc::new(StringResolver);
        let registrations = [
            Registration::exact(&reflect::LIST)
                .getter(Arc::new(ListResolver))
                .setter(Arc::new(ListResolver)),
            Registration::exact(&reflect::MAP)
                .getter(Arc::new(MapResolver))
                .setter(Arc::new(MapResolver)),
            Registration::exact(&reflect::STRING)
                .getter(Arc::clone(&string) as Arc<dyn GetResolver>)
                .to_bytes(string),
            Registration::exact(&reflect::BYTES).getter(Arc::new(BytesResolver)),
            Registration::exact(&reflect::RANGE).getter(Arc::new(RangeResolver)),
            Registration::exact(&reflect::ITER).getter(Arc::new(IterResolver)),
        ];
        for registration in registrations {
            manager.register(registration);
        }
    }
}
