//! Generation options and structured-output formats.
//!
//! Options are passed to the server verbatim as the `options` object.
//! Valid keys: <https://github.com/ollama/ollama/blob/main/docs/modelfile.md#valid-parameters-and-values>

use schemars::JsonSchema;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Generation options sent as the request's `options` object.
///
/// Common keys have typed setters; anything else goes through [`Options::insert`].
///
/// ```
/// use llamawrap_types::Options;
///
/// let opts = Options::new().temperature(0.2).seed(42);
/// assert_eq!(opts.get("temperature"), Some(&serde_json::json!(0.2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Empty options; the server applies its own defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sampling temperature. The server default is 0.8; higher answers more creatively.
    #[must_use]
    pub fn temperature(self, temperature: f64) -> Self {
        self.insert("temperature", temperature)
    }

    /// Maximum number of tokens to generate.
    #[must_use]
    pub fn num_predict(self, tokens: i64) -> Self {
        self.insert("num_predict", tokens)
    }

    /// Context window size.
    #[must_use]
    pub fn num_ctx(self, tokens: u64) -> Self {
        self.insert("num_ctx", tokens)
    }

    /// Top-k sampling.
    #[must_use]
    pub fn top_k(self, k: u64) -> Self {
        self.insert("top_k", k)
    }

    /// Nucleus sampling.
    #[must_use]
    pub fn top_p(self, p: f64) -> Self {
        self.insert("top_p", p)
    }

    /// Random seed for reproducible output.
    #[must_use]
    pub fn seed(self, seed: i64) -> Self {
        self.insert("seed", seed)
    }

    /// Set an arbitrary option.
    #[must_use]
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Constraint on the shape of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// Any valid JSON (`"format": "json"`).
    Json,
    /// JSON matching the given JSON schema.
    Schema(Value),
}

impl Format {
    /// Derive the schema from a Rust type.
    #[must_use]
    pub fn for_type<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        Self::Schema(schema.to_value())
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Json => serializer.serialize_str("json"),
            Self::Schema(schema) => schema.serialize(serializer),
        }
    }
}
