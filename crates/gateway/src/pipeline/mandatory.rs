//! Mandatory parameter validation.
//!
//! A [`Mandatory`] rule names the fields a route cannot do without and the
//! part of the request ([`Target`]) they must appear in. Rules are built when
//! the router is assembled and attached with `route_layer`:
//!
//! ```ignore
//! let rule = Arc::new(Mandatory::new(ValidationSpec::groups([("user", ["email", "pass"])])).target(Target::Body));
//! Router::new().route("/login", post(login).route_layer(from_fn_with_state(rule, mandatory::enforce)));
//! ```
//!
//! Grouped rules accept nested objects that arrive string-encoded (the usual
//! case for form posts). The decoded object replaces the string in the
//! validated [`RequestParams`] handed to later stages; the original is left
//! untouched.

use std::sync::Arc;

use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use common::ErrorKind;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::{
    context::{RequestParams, Target},
    resolver::ApiError,
};

/// Which fields a request must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationSpec {
    /// Each field must be present on the target.
    Flat(Vec<String>),
    /// Each group must be present on the target and contain every listed
    /// subfield. Checked in insertion order.
    Grouped(Vec<(String, Vec<String>)>),
}

impl ValidationSpec {
    /// A single required field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Flat(vec![name.into()])
    }

    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Flat(names.into_iter().map(Into::into).collect())
    }

    pub fn groups<I, K, F, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Grouped(
            groups
                .into_iter()
                .map(|(k, f)| (k.into(), f.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

impl From<&str> for ValidationSpec {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl<const N: usize> From<[&str; N]> for ValidationSpec {
    fn from(names: [&str; N]) -> Self {
        Self::fields(names)
    }
}

/// A spec declaration that is neither a name, a list of names, nor a
/// mapping of group names to lists of names.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid validation spec: {0}")]
pub struct SpecError(String);

impl TryFrom<Value> for ValidationSpec {
    type Error = SpecError;

    /// Accepts `"a"`, `["a", "b"]` or `{"group": ["a", "b"]}` (a group may
    /// also list a single name as a string).
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Self::Flat(vec![name])),
            Value::Array(items) => Ok(Self::Flat(names(items)?)),
            Value::Object(map) => map
                .into_iter()
                .map(|(group, fields)| {
                    let fields = match fields {
                        Value::String(name) => vec![name],
                        Value::Array(items) => names(items)?,
                        other => {
                            return Err(SpecError(format!(
                                "group {group} must list field names, got {other}"
                            )))
                        }
                    };
                    Ok((group, fields))
                })
                .collect::<Result<_, _>>()
                .map(Self::Grouped),
            other => Err(SpecError(format!("expected a name, list or mapping, got {other}"))),
        }
    }
}

fn names(items: Vec<Value>) -> Result<Vec<String>, SpecError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(SpecError(format!("field names must be strings, got {other}"))),
        })
        .collect()
}

/// A mandatory-field rule bound to one part of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mandatory {
    spec: ValidationSpec,
    target: Target,
}

impl Mandatory {
    /// Rule over the query string. Use [`Mandatory::target`] to inspect another part.
    pub fn new(spec: impl Into<ValidationSpec>) -> Self {
        Self {
            spec: spec.into(),
            target: Target::default(),
        }
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Validate `params`, returning the validated copy.
    ///
    /// Stops at the first missing field or group. A group that arrives as a
    /// string which is not valid JSON fails with `common.invalid_json_string`.
    pub fn check(&self, params: &RequestParams) -> Result<RequestParams, ApiError> {
        let source = params.target(self.target);

        match &self.spec {
            ValidationSpec::Flat(fields) => {
                if let Some(missing) = fields.iter().find(|f| !source.contains_key(f.as_str())) {
                    debug!(field = %missing, target = ?self.target, "missing required parameter");
                    return Err(ErrorKind::MissingRequiredParameter.into());
                }
                Ok(params.clone())
            }
            ValidationSpec::Grouped(groups) => {
                let mut validated = source.clone();
                for (group, subfields) in groups {
                    decode_in(&mut validated, group)?;
                    if !has_subfields(validated.get(group), subfields) {
                        debug!(group = %group, target = ?self.target, "missing required parameter");
                        return Err(ErrorKind::MissingRequiredParameter.into());
                    }
                }
                Ok(params.clone().with_target(self.target, validated))
            }
        }
    }
}

/// Replace a string-encoded group with its decoded value.
fn decode_in(map: &mut Map<String, Value>, group: &str) -> Result<(), ApiError> {
    let decoded = match map.get(group) {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|e| {
            debug!(group = %group, error = %e, "string-encoded group is not valid JSON");
            ApiError::from(ErrorKind::InvalidJsonString)
        })?,
        _ => return Ok(()),
    };
    map.insert(group.to_owned(), decoded);
    Ok(())
}

/// Objects are checked by key, arrays by index (`"0"`, `"1"`, ...). Scalars
/// only satisfy a group with no subfields.
fn has_subfields(value: Option<&Value>, subfields: &[String]) -> bool {
    match value {
        None => false,
        Some(Value::Object(map)) => subfields.iter().all(|f| map.contains_key(f.as_str())),
        Some(Value::Array(items)) => subfields
            .iter()
            .all(|f| f.parse::<usize>().is_ok_and(|i| i < items.len())),
        Some(_) => subfields.is_empty(),
    }
}

/// Route layer applying a shared [`Mandatory`] rule.
///
/// Path parameters are merged into the request's [`RequestParams`] first so
/// that [`Target::Params`] rules can see them.
pub async fn enforce(
    State(rule): State<Arc<Mandatory>>,
    path: Option<RawPathParams>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut params = req
        .extensions()
        .get::<RequestParams>()
        .cloned()
        .unwrap_or_default();
    if let Some(path) = &path {
        for (key, value) in path {
            params
                .params
                .insert(key.to_owned(), Value::String(value.to_owned()));
        }
    }

    let validated = rule.check(&params)?;
    req.extensions_mut().insert(validated);
    Ok(next.run(req).await)
}
