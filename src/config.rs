/// Engine-wide settings shared by every template and render.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// Treat undeclared names at template level as template parameters.
    /// When disabled, every name must be declared with `var`.
    pub loose_var: bool,
    /// Drop lines that hold nothing but whitespace and one `<% %>` block.
    pub trim_code_block_blank_line: bool,
    /// Generate specialised property accessors for host classes.
    pub generate_accessors: bool,
    /// Default encoding for byte sinks created by the engine.
    pub encoding: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loose_var: true,
            trim_code_block_blank_line: true,
            generate_accessors: true,
            encoding: "UTF-8".to_owned(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_loose_var(mut self, loose_var: bool) -> Self {
        self.loose_var = loose_var;
        self
    }

    #[must_use]
    pub const fn with_trim_code_block_blank_line(mut self, trim: bool) -> Self {
        self.trim_code_block_blank_line = trim;
        self
    }

    #[must_use]
    pub const fn with_generate_accessors(mut self, generate: bool) -> Self {
        self.generate_accessors = generate;
        self
    }

    #[must_use]
    pub fn with_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.encoding = encoding.into();
        self
    }
}
