use std::collections::BTreeMap;

use crate::{out::Out, value::Value};

/// Named values handed to a render. Names the template never reads are
/// ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    data: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: AsRef<str>, V: Into<Value>>(&mut self, name: T, value: V) -> &mut Self {
        self.data.insert(name.as_ref().to_string(), value.into());
        self
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<&Value> {
        self.data.get(name.as_ref())
    }

    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.data.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// `ScriptInterface` is the surface of an embeddable template engine:
/// compile named templates once, then render them any number of times.
pub trait ScriptInterface {
    /// `add_template` compiles `source` and makes it available as `name`.
    ///
    /// # Errors
    /// - If the template name is a duplicate.
    /// - If the source fails to compile.
    fn add_template<N: AsRef<str>, S: Into<String>>(
        &mut self,
        name: N,
        source: S,
    ) -> crate::ScriptResult<()>;

    /// `render` renders a template into a string.
    ///
    /// # Errors
    /// - If the template name is not found.
    /// - If execution fails.
    fn render<N: AsRef<str>>(&self, name: N, params: Option<&Params>) -> crate::ScriptResult<String>;

    /// `render_to` renders a template into any output sink, such as a byte
    /// stream with its own encoding.
    ///
    /// # Errors
    /// - If the template name is not found.
    /// - If execution or writing fails.
    fn render_to<N: AsRef<str>>(
        &self,
        name: N,
        params: Option<&Params>,
        out: &mut dyn Out,
    ) -> crate::ScriptResult<()>;

    /// `missing_params` lists the parameters a template reads that `params`
    /// does not provide. Unknown templates have none.
    fn missing_params<'b, N: AsRef<str>>(&'b self, name: N, params: &Params) -> Vec<&'b str>;
}
