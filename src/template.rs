use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    ast::Stmt,
    builder::{Sem, TemplateBuilder},
    config::EngineConfig,
    context::{InternalContext, Runtime},
    error::{ParseError, ParseErrorKind, RuntimeError},
    exec::execute_block,
    grammar::{TABLES, Term},
    interface::Params,
    lexer::TemplateLexer,
    lr::LrParser,
    out::Out,
    value::Value,
};

/// A Template is a compiled template, ready to be rendered any number of
/// times, concurrently if needed.
///
/// Compiling lexes and parses the source, resolves every variable to a slot
/// and folds constant expressions. Rendering walks the resulting tree.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use scriptlate::{EngineConfig, Params, ResolverManager, Runtime, StringOut, Template};
///
/// let config = EngineConfig::default();
/// let template = Template::compile("Hello, ${name}!", &config).unwrap();
///
/// let runtime = Arc::new(Runtime::new(ResolverManager::with_defaults([], true), config));
/// let mut params = Params::new();
/// params.insert("name", "World");
///
/// let mut out = StringOut::new();
/// template.render_to(&runtime, Some(&params), &mut out).unwrap();
/// assert_eq!(out.as_str(), "Hello, World!");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct Template {
    source: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) root: Vec<Stmt>,
    #[cfg_attr(feature = "serde", serde(skip))]
    frame_size: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    params: Vec<(Arc<str>, usize)>,
    pub(crate) name: Option<String>,
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct TemplateHelper {
            source: String,
            #[serde(default)]
            name: Option<String>,
        }

        let helper = TemplateHelper::deserialize(deserializer)?;

        // Only the source is persisted; the tree is rebuilt with default settings.
        let mut template = Self::compile(helper.source, &EngineConfig::default())
            .map_err(|e| serde::de::Error::custom(format!("Failed to compile template: {e}")))?;
        template.name = helper.name;
        Ok(template)
    }
}

impl Template {
    /// Compiles `source` into a template.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] carrying the line and column of the first
    /// lexical, syntax or scoping error.
    pub fn compile<S: Into<String>>(source: S, config: &EngineConfig) -> Result<Self, ParseError> {
        let source = source.into();
        let tables = TABLES.as_ref().map_err(|e| {
            ParseError::new(0, 0, ParseErrorKind::CorruptTables(e.to_string()))
        })?;

        let mut builder = TemplateBuilder::new(config.loose_var);
        let mut lexer = TemplateLexer::new(&source, config.trim_code_block_blank_line);
        let root = match LrParser::new(tables, Term::NAMES).parse(&mut lexer, &mut builder)? {
            Sem::Stmts(stmts) => stmts,
            other => {
                return Err(ParseError::new(
                    0,
                    0,
                    ParseErrorKind::CorruptTables(format!("template root reduced to {other:?}")),
                ));
            }
        };
        let (frame_size, params) = builder.finish();

        debug!(
            len = source.len(),
            statements = root.len(),
            frame_size,
            params = params.len(),
            "compiled template"
        );

        Ok(Self {
            source,
            root,
            frame_size,
            params,
            name: None,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Names of the parameters the template reads without declaring them.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| &**name)
    }

    /// Renders the template into `out`. Parameters the template does not
    /// use are ignored; used parameters missing from `params` are null.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuntimeError`] raised while executing, with the
    /// position of the failing expression or statement.
    pub fn render_to(
        &self,
        runtime: &Arc<Runtime>,
        params: Option<&Params>,
        out: &mut dyn Out,
    ) -> Result<(), RuntimeError> {
        let mut vars = vec![Value::Null; self.frame_size];
        if let Some(params) = params {
            for (name, slot) in &self.params {
                if let (Some(value), Some(var)) = (params.get(name), vars.get_mut(*slot)) {
                    *var = value.clone();
                }
            }
        }

        trace!(name = ?self.name, frame_size = self.frame_size, "rendering template");
        let mut ctx = InternalContext::new(vars, out, runtime);
        execute_block(&self.root, &mut ctx)?;
        Ok(())
    }
}
