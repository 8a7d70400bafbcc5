//! Effect definitions, launch snapshots and request models.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier of one effect run.
pub type EffectId = u64;

/// Priority channel. Lower values win when outputs are muxed downstream.
pub type Priority = i32;

/// Identifier of a temporal-blending profile, opaque to the engine.
pub type SmoothingConfigId = u32;

/// Smoothing profile used when the requester does not pick one.
pub const SYSTEM_SMOOTHING_CFG: SmoothingConfigId = 0;

/// Origin tag used when the requester does not supply one.
pub const DEFAULT_ORIGIN: &str = "System";

/// How long an effect may run before it expires.
///
/// Serialized as milliseconds, with any negative value meaning endless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Timeout {
    /// Never expires on its own.
    #[default]
    Endless,
    /// Expires this long after start.
    After(Duration),
}

impl Timeout {
    /// Timeout from a duration.
    #[must_use]
    pub const fn after(duration: Duration) -> Self {
        Self::After(duration)
    }

    /// Timeout from milliseconds; negative means endless.
    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        u64::try_from(ms).map_or(Self::Endless, |ms| Self::After(Duration::from_millis(ms)))
    }

    /// The finite duration, if any.
    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Endless => None,
            Self::After(d) => Some(d),
        }
    }

    /// Whether this timeout never expires.
    #[must_use]
    pub const fn is_endless(self) -> bool {
        matches!(self, Self::Endless)
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Timeout> for i64 {
    fn from(timeout: Timeout) -> Self {
        match timeout {
            Timeout::Endless => -1,
            Timeout::After(d) => Self::try_from(d.as_millis()).unwrap_or(Self::MAX),
        }
    }
}

/// Opaque handle to the executable logic of an effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptRef(pub String);

impl ScriptRef {
    /// Build a script reference.
    pub fn new(script: impl Into<String>) -> Self {
        Self(script.into())
    }

    /// Borrow the raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// JSON kind expected for one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// Any JSON value.
    Any,
    /// `true` or `false`.
    Bool,
    /// Any JSON number.
    Number,
    /// A number without a fractional part.
    Integer,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ArgKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Advisory argument shape of an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSchema {
    /// Keys that must be present.
    #[serde(default)]
    pub required: Vec<String>,
    /// Expected kind per key.
    #[serde(default)]
    pub properties: BTreeMap<String, ArgKind>,
    /// Whether keys missing from `properties` are accepted.
    #[serde(default = "default_true")]
    pub additional_properties: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for EffectSchema {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            properties: BTreeMap::new(),
            additional_properties: true,
        }
    }
}

impl EffectSchema {
    /// Check `args` against this schema, returning the first violation.
    ///
    /// `null` is treated as an empty object.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = serde_json::Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(format!("arguments must be an object, got {}", kind_name(other))),
        };

        if let Some(missing) = self.required.iter().find(|key| !object.contains_key(*key)) {
            return Err(format!("missing required argument `{missing}`"));
        }

        for (key, value) in object {
            match self.properties.get(key) {
                Some(kind) if !kind.matches(value) => {
                    return Err(format!(
                        "argument `{key}` expected {kind:?}, got {}",
                        kind_name(value)
                    ));
                }
                None if !self.additional_properties => {
                    return Err(format!("unexpected argument `{key}`"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Immutable catalog entry describing a runnable effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    /// Unique effect name.
    pub name: String,
    /// Script executed by the runtime.
    pub script: ScriptRef,
    /// Default arguments used when a request carries none.
    #[serde(default)]
    pub args: Value,
    /// Expected argument shape.
    #[serde(default)]
    pub schema: EffectSchema,
    /// File the definition was loaded from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl EffectDefinition {
    /// Definition with empty defaults and an unconstrained schema.
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: ScriptRef::new(script),
            args: Value::Object(serde_json::Map::new()),
            schema: EffectSchema::default(),
            file: None,
        }
    }

    /// Replace the default arguments.
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Replace the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: EffectSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// Launch parameters of a running effect, detached from the live instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffectDefinition {
    /// Effect name.
    pub name: String,
    /// Script run instead of the catalog one, if the request named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptRef>,
    /// Arguments the effect was launched with.
    pub args: Value,
    /// Owned priority channel.
    pub priority: Priority,
    /// Timeout of the run.
    pub timeout: Timeout,
    /// Requester tag.
    pub origin: String,
    /// Smoothing profile.
    pub smoothing_cfg: SmoothingConfigId,
    /// Optional image payload handed to the script.
    pub image_data: Option<String>,
}

impl ActiveEffectDefinition {
    /// Request that relaunches an identical effect.
    #[must_use]
    pub fn to_request(&self) -> EffectRequest {
        EffectRequest {
            name: self.name.clone(),
            script: self.script.clone(),
            args: Some(self.args.clone()),
            priority: self.priority,
            timeout: self.timeout,
            origin: self.origin.clone(),
            smoothing_cfg: self.smoothing_cfg,
            image_data: self.image_data.clone(),
        }
    }
}

/// Request to run a catalog effect on a priority channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRequest {
    /// Catalog name of the effect.
    pub name: String,
    /// Script to run under `name` instead of the catalog one.
    ///
    /// With an override the name need not be in the catalog; arguments are
    /// then taken as given and no schema applies.
    pub script: Option<ScriptRef>,
    /// Arguments; `None` uses the definition's defaults.
    pub args: Option<Value>,
    /// Target priority channel.
    pub priority: Priority,
    /// Expiry of the run.
    pub timeout: Timeout,
    /// Requester tag.
    pub origin: String,
    /// Smoothing profile.
    pub smoothing_cfg: SmoothingConfigId,
    /// Optional image payload.
    pub image_data: Option<String>,
}

impl EffectRequest {
    /// Endless run with default arguments, origin and smoothing.
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            script: None,
            args: None,
            priority,
            timeout: Timeout::Endless,
            origin: DEFAULT_ORIGIN.to_string(),
            smoothing_cfg: SYSTEM_SMOOTHING_CFG,
            image_data: None,
        }
    }

    /// Run `script` instead of the catalog script.
    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(ScriptRef::new(script));
        self
    }

    /// Set explicit arguments.
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the origin tag.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the smoothing profile.
    #[must_use]
    pub const fn with_smoothing_cfg(mut self, smoothing_cfg: SmoothingConfigId) -> Self {
        self.smoothing_cfg = smoothing_cfg;
        self
    }

    /// Attach an image payload.
    #[must_use]
    pub fn with_image_data(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(image_data.into());
        self
    }
}
