//! Schema Registry and structural JSON validation.
//!
//! A [`SchemaDef`] is a named [`Shape`]: a recursive description of what a
//! JSON value must look like. Shapes are registered once at startup in a
//! [`SchemaRegistry`] and are immutable afterwards, so routes hold them
//! behind an `Arc` and validate without locking.
//!
//! Field rules:
//!
//! | field is…                | absent | `null` | present, wrong type |
//! |--------------------------|--------|--------|---------------------|
//! | in `required`            | error  | error  | error               |
//! | `nullable`               | ok     | ok     | error               |
//! | neither                  | ok     | error  | error               |
//!
//! Validation never coerces. A value that passes comes back untouched.
//! Properties that the shape does not mention are left alone.
//!
//! Definitions can be built in code or read from the JSON-Schema subset
//! the service configuration uses:
//!
//! ```rust
//! use lintel::{Shape, SchemaDef};
//!
//! let by_hand = SchemaDef::new(
//!     "user",
//!     Shape::object()
//!         .property("name", Shape::string())
//!         .property("test", Shape::boolean().nullable())
//!         .required(["name"]),
//! );
//!
//! let from_json = SchemaDef::from_json(&serde_json::json!({
//!     "$id": "user",
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": { "type": "string" },
//!         "test": { "type": "boolean", "nullable": true }
//!     }
//! })).unwrap();
//!
//! assert_eq!(by_hand, from_json);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Error;

// ── Shapes ────────────────────────────────────────────────────────────────────

/// Structural descriptor for one JSON value.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    kind: Kind,
    nullable: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum Kind {
    Any,
    Boolean,
    Integer,
    Number,
    String,
    Array(Box<Shape>),
    Object {
        properties: Vec<(String, Shape)>,
        required: Vec<String>,
    },
}

impl Shape {
    fn of(kind: Kind) -> Self {
        Self { kind, nullable: false }
    }

    pub fn any() -> Self { Self::of(Kind::Any) }
    pub fn boolean() -> Self { Self::of(Kind::Boolean) }
    pub fn integer() -> Self { Self::of(Kind::Integer) }
    pub fn number() -> Self { Self::of(Kind::Number) }
    pub fn string() -> Self { Self::of(Kind::String) }

    pub fn array(items: Shape) -> Self {
        Self::of(Kind::Array(Box::new(items)))
    }

    /// An object with no declared properties. Add them with
    /// [`property`](Shape::property).
    pub fn object() -> Self {
        Self::of(Kind::Object { properties: Vec::new(), required: Vec::new() })
    }

    /// Declares a property. No-op on non-object shapes.
    pub fn property(mut self, name: impl Into<String>, shape: Shape) -> Self {
        if let Kind::Object { properties, .. } = &mut self.kind {
            properties.push((name.into(), shape));
        }
        self
    }

    /// Marks properties as required. No-op on non-object shapes.
    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Kind::Object { required, .. } = &mut self.kind {
            required.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Allows the value to be absent or `null` when used as a property.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            Kind::Any          => "any",
            Kind::Boolean      => "boolean",
            Kind::Integer      => "integer",
            Kind::Number       => "number",
            Kind::String       => "string",
            Kind::Array(_)     => "array",
            Kind::Object { .. } => "object",
        }
    }

    /// Rejects shapes that can never validate anything sensibly.
    fn check(&self, at: &str) -> Result<(), String> {
        match &self.kind {
            Kind::Array(items) => items.check(&format!("{at}/items")),
            Kind::Object { properties, required } => {
                let mut seen = HashSet::new();
                for (name, shape) in properties {
                    if !seen.insert(name.as_str()) {
                        return Err(format!("property `{name}` declared twice at `{}`", display(at)));
                    }
                    shape.check(&format!("{at}/{name}"))?;
                }
                if let Some(missing) = required.iter().find(|r| !seen.contains(r.as_str())) {
                    return Err(format!(
                        "required property `{missing}` is not declared at `{}`",
                        display(at),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn validate_into(&self, value: &Value, path: &str, errors: &mut ValidationErrors) {
        let matches = match (&self.kind, value) {
            (Kind::Any, _) => true,
            (Kind::Boolean, Value::Bool(_)) => true,
            (Kind::Number, Value::Number(_)) => true,
            (Kind::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (Kind::String, Value::String(_)) => true,
            (Kind::Array(items), Value::Array(values)) => {
                for (i, v) in values.iter().enumerate() {
                    items.validate_into(v, &format!("{path}/{i}"), errors);
                }
                true
            }
            (Kind::Object { properties, required }, Value::Object(map)) => {
                validate_object(properties, required, map, path, errors);
                true
            }
            _ => false,
        };

        if !matches {
            errors.add(FieldError::new(
                path,
                Rule::Type,
                format!("must be {}", self.type_name()),
            ));
        }
    }

    // ── JSON form ──

    fn from_json(value: &Value, at: &str) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("definition at `{}` must be an object", display(at)))?;

        let mut shape = match obj.get("type") {
            None => Self::any(),
            Some(Value::String(t)) => match t.as_str() {
                "boolean" => Self::boolean(),
                "integer" => Self::integer(),
                "number"  => Self::number(),
                "string"  => Self::string(),
                "array" => {
                    let items = match obj.get("items") {
                        Some(items) => Self::from_json(items, &format!("{at}/items"))?,
                        None => Self::any(),
                    };
                    Self::array(items)
                }
                "object" => {
                    let mut shape = Self::object();
                    if let Some(props) = obj.get("properties") {
                        let props = props.as_object().ok_or_else(|| {
                            format!("`properties` at `{}` must be an object", display(at))
                        })?;
                        for (name, def) in props {
                            shape = shape.property(name, Self::from_json(def, &format!("{at}/{name}"))?);
                        }
                    }
                    if let Some(req) = obj.get("required") {
                        let names = req
                            .as_array()
                            .and_then(|a| a.iter().map(Value::as_str).collect::<Option<Vec<_>>>())
                            .ok_or_else(|| {
                                format!("`required` at `{}` must be an array of strings", display(at))
                            })?;
                        shape = shape.required(names);
                    }
                    shape
                }
                other => return Err(format!("unsupported type `{other}` at `{}`", display(at))),
            },
            Some(_) => return Err(format!("`type` at `{}` must be a string", display(at))),
        };

        match obj.get("nullable") {
            None | Some(Value::Bool(false)) => {}
            Some(Value::Bool(true)) => shape = shape.nullable(),
            Some(_) => return Err(format!("`nullable` at `{}` must be a boolean", display(at))),
        }
        Ok(shape)
    }
}

fn validate_object(
    properties: &[(String, Shape)],
    required: &[String],
    map: &Map<String, Value>,
    path: &str,
    errors: &mut ValidationErrors,
) {
    for (name, shape) in properties {
        let field = format!("{path}/{name}");
        let is_required = required.iter().any(|r| r == name);
        match map.get(name) {
            None if is_required => {
                errors.add(FieldError::new(&field, Rule::Required, "is required"));
            }
            None => {}
            Some(Value::Null) if is_required => {
                errors.add(FieldError::new(&field, Rule::Required, "must not be null"));
            }
            Some(Value::Null) if shape.nullable => {}
            Some(v) => shape.validate_into(v, &field, errors),
        }
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

// ── Definitions ───────────────────────────────────────────────────────────────

/// A named, immutable shape.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDef {
    id: String,
    shape: Shape,
}

impl SchemaDef {
    pub fn new(id: impl Into<String>, shape: Shape) -> Self {
        Self { id: id.into(), shape }
    }

    /// Reads a definition written in the JSON-Schema subset: `$id`, `type`,
    /// `properties`, `required`, `items` and `nullable`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSchema`] when `$id` is missing or any keyword is
    /// malformed.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let id = value
            .get("$id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidSchema {
                id: "<anonymous>".to_owned(),
                reason: "missing string `$id`".to_owned(),
            })?;
        let shape = Shape::from_json(value, "")
            .map_err(|reason| Error::InvalidSchema { id: id.to_owned(), reason })?;
        Ok(Self::new(id, shape))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Checks `value` against this definition and collects every violation.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.shape.validate_into(value, "", &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Every schema the application knows about, keyed by id.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaDef>>,
}

/// Returned by [`SchemaRegistry::validate`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema `{0}` is not registered")]
    Unknown(String),
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSchema`] if the id is taken (the existing
    /// definition is kept), [`Error::InvalidSchema`] if the shape is
    /// malformed.
    pub fn register(&mut self, def: SchemaDef) -> Result<Arc<SchemaDef>, Error> {
        if def.id.is_empty() {
            return Err(Error::InvalidSchema { id: def.id, reason: "empty id".to_owned() });
        }
        if self.schemas.contains_key(&def.id) {
            return Err(Error::DuplicateSchema { id: def.id });
        }
        def.shape
            .check("")
            .map_err(|reason| Error::InvalidSchema { id: def.id.clone(), reason })?;

        let def = Arc::new(def);
        self.schemas.insert(def.id.clone(), Arc::clone(&def));
        Ok(def)
    }

    /// Looks a definition up by id.
    pub fn get(&self, id: &str) -> Result<Arc<SchemaDef>, Error> {
        self.schemas
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownSchema { id: id.to_owned() })
    }

    /// Validates `value` against schema `id`, handing it back unchanged on
    /// success.
    pub fn validate(&self, id: &str, value: Value) -> Result<Value, SchemaError> {
        let def = self.schemas.get(id).ok_or_else(|| SchemaError::Unknown(id.to_owned()))?;
        def.validate(&value)?;
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

// ── Validation errors ─────────────────────────────────────────────────────────

/// The rule a field broke.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Type,
}

/// One violation: where, which rule, and a readable message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    /// JSON-pointer style location, `/` for the document root.
    pub path: String,
    pub rule: Rule,
    pub message: String,
}

impl FieldError {
    pub fn new(path: &str, rule: Rule, message: impl Into<String>) -> Self {
        Self { path: display(path).to_owned(), rule, message: message.into() }
    }
}

/// Every violation found in one value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", e.path, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
