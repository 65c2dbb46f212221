use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ast::Position;
use crate::config::EngineConfig;
use crate::context::Runtime;
use crate::error::{EngineError, RuntimeError, ScriptResult};
use crate::interface::{Params, ScriptInterface};
use crate::out::{Out, StringOut, WriterOut};
use crate::resolver::{Registration, ResolverManager};
use crate::template::Template;

/// `Engine` is the primary implementation of the `ScriptInterface` trait.
///
/// It owns a set of named, compiled templates and the runtime they render
/// against: the engine settings and the resolvers used for property access
/// and byte conversion. An engine is `Send + Sync`; renders only take `&self`
/// and may run concurrently.
///
/// # Examples
///
/// ```
/// use scriptlate::{Engine, Params, ScriptInterface};
///
/// // Create a new engine
/// let mut engine = Engine::new();
///
/// // Add a template
/// engine.add_template("greeting", "Hello, ${name}!").unwrap();
///
/// // Setup params
/// let mut params = Params::new();
/// params.insert("name", "World");
///
/// // Render template
/// let output = engine.render("greeting", Some(&params)).unwrap();
/// assert_eq!(output, "Hello, World!");
/// ```
pub struct Engine {
    templates: HashMap<String, Template>,
    runtime: Arc<Runtime>,
}

impl Engine {
    /// Creates an engine with the default settings and built-in resolvers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        self.runtime.config()
    }

    pub const fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn template<N: AsRef<str>>(&self, name: N) -> Option<&Template> {
        self.templates.get(name.as_ref())
    }

    fn get(&self, name: &str) -> ScriptResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| EngineError::MissingTemplate {
                template_name: name.to_string(),
            })
    }

    /// Renders a template into bytes using the configured encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is missing, the configured encoding
    /// is not supported, or execution fails.
    pub fn render_bytes<N: AsRef<str>>(&self, name: N, params: Option<&Params>) -> ScriptResult<Vec<u8>> {
        let template = self.get(name.as_ref())?;
        let mut out = WriterOut::new(Vec::new(), &self.config().encoding)
            .map_err(|kind| RuntimeError::at(Position::default(), kind))?;
        template.render_to(&self.runtime, params, &mut out)?;
        Ok(out.into_inner())
    }
}

impl Default for Engine {
    /// Creates a default `Engine` instance by calling `new()`.
    fn default() -> Self {
        Self::new()
    }
}

/// Collects settings and resolver registrations for a new [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    registrations: Vec<Registration>,
}

impl EngineBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a resolver registration. Registrations apply after the built-in
    /// resolvers, in the order given.
    #[must_use]
    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn build(self) -> Engine {
        let Self {
            config,
            registrations,
        } = self;
        debug!(
            registrations = registrations.len(),
            loose_var = config.loose_var,
            encoding = %config.encoding,
            "building engine"
        );
        let resolvers = ResolverManager::with_defaults(registrations, config.generate_accessors);
        Engine {
            templates: HashMap::new(),
            runtime: Arc::new(Runtime::new(resolvers, config)),
        }
    }
}

impl ScriptInterface for Engine {
    /// Compiles `source` and stores it under `name`.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the template was successfully added
    /// * `Err(EngineError::TemplateExists)` if a template with the given name already exists
    /// * `Err(EngineError::Parse)` if the source fails to compile
    fn add_template<N: AsRef<str>, S: Into<String>>(&mut self, name: N, source: S) -> ScriptResult<()> {
        let name = name.as_ref();

        if self.templates.contains_key(name) {
            return Err(EngineError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        let mut template = Template::compile(source, self.runtime.config())?;
        template.name = Some(name.to_string());
        debug!(name, "added template");

        self.templates.insert(name.to_string(), template);

        Ok(())
    }

    fn render<N: AsRef<str>>(&self, name: N, params: Option<&Params>) -> ScriptResult<String> {
        let template = self.get(name.as_ref())?;
        let mut out = StringOut::with_capacity(template.source().len());
        template.render_to(&self.runtime, params, &mut out)?;
        Ok(out.into_string())
    }

    fn render_to<N: AsRef<str>>(
        &self,
        name: N,
        params: Option<&Params>,
        out: &mut dyn Out,
    ) -> ScriptResult<()> {
        let template = self.get(name.as_ref())?;
        template.render_to(&self.runtime, params, out)?;
        Ok(())
    }

    /// Returns the parameters of the template not present in `params`, in
    /// the order the template first reads them.
    ///
    /// Returns an empty vector if the template doesn't exist.
    fn missing_params<'b, N: AsRef<str>>(&'b self, name: N, params: &Params) -> Vec<&'b str> {
        self.templates
            .get(name.as_ref())
            .map(|template| {
                template
                    .params()
                    .filter(|param| !params.contains(param))
                    .collect()
            })
            .unwrap_or_default()
    }
}
