//! Validator capabilities and the orchestration of a validation run.
//!
//! Every validator source (per-field function, whole-form function, schema
//! object, schema factory) is turned into one of two closures when the form
//! is configured:
//!
//! - [`FieldValidator`]: field value in, optional message out.
//! - [`FormValidator`]: whole values tree in, errors tree out.
//!
//! A [`ValidationPlan`] is a snapshot of the validators that apply when a run
//! starts. Starting a run invokes every validator right away and hands back
//! a future for the merged errors tree. Registering or unregistering fields
//! after that point does not affect a run already in flight.

use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::error::{Issue, ValidatorError};
use crate::path::{self, Path};
use crate::value::Value;

pub type ValidationFuture<T> = LocalBoxFuture<'static, Result<T, ValidatorError>>;

pub type FieldValidator = Rc<dyn Fn(&Value) -> ValidationFuture<Option<String>>>;

pub type FormValidator = Rc<dyn Fn(&Value) -> ValidationFuture<Value>>;

/// External schema capability.
///
/// Resolve `Ok(())` when the values pass, `Err(ValidatorError::Invalid)` with
/// path-keyed issues when they do not, and `Err(ValidatorError::Crashed)`
/// when the schema itself fails.
pub trait Schema {
    fn validate(&self, values: &Value) -> ValidationFuture<()>;
}

pub fn field_validator<F>(f: F) -> FieldValidator
where
    F: Fn(&Value) -> Option<String> + 'static,
{
    Rc::new(move |value| future::ready(Ok(f(value))).boxed_local())
}

pub fn async_field_validator<F, Fut>(f: F) -> FieldValidator
where
    F: Fn(&Value) -> Fut + 'static,
    Fut: Future<Output = Result<Option<String>, ValidatorError>> + 'static,
{
    Rc::new(move |value| f(value).boxed_local())
}

/// Synchronous whole-form validator returning an errors tree.
pub fn form_validator<F>(f: F) -> FormValidator
where
    F: Fn(&Value) -> Value + 'static,
{
    Rc::new(move |values| future::ready(Ok(f(values))).boxed_local())
}

/// Synchronous whole-form validator that may fail.
pub fn try_form_validator<F>(f: F) -> FormValidator
where
    F: Fn(&Value) -> Result<Value, ValidatorError> + 'static,
{
    Rc::new(move |values| future::ready(f(values)).boxed_local())
}

pub fn async_form_validator<F, Fut>(f: F) -> FormValidator
where
    F: Fn(&Value) -> Fut + 'static,
    Fut: Future<Output = Result<Value, ValidatorError>> + 'static,
{
    Rc::new(move |values| f(values).boxed_local())
}

pub fn schema_validator<S>(schema: S) -> FormValidator
where
    S: Schema + 'static,
{
    let schema = Rc::new(schema);
    Rc::new(move |values| run_schema(schema.as_ref(), values))
}

/// Builds a fresh schema for every run.
pub fn schema_factory_validator<S, F>(factory: F) -> FormValidator
where
    S: Schema,
    F: Fn() -> S + 'static,
{
    Rc::new(move |values| run_schema(&factory(), values))
}

fn run_schema(schema: &dyn Schema, values: &Value) -> ValidationFuture<Value> {
    let pending = schema.validate(&prepare_for_validation(values));
    async move {
        match pending.await {
            Ok(()) => Ok(Value::map()),
            Err(err) => recover_tree(Err(err)),
        }
    }
    .boxed_local()
}

/// Empty strings become `Null` so "required" rules treat an emptied input
/// as missing.
pub fn prepare_for_validation(values: &Value) -> Value {
    match values {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::List(items) => {
            Value::from(items.iter().map(prepare_for_validation).collect::<Vec<_>>())
        }
        Value::Map(map) => Value::Map(Rc::new(
            map.iter()
                .map(|(k, v)| (k.clone(), prepare_for_validation(v)))
                .collect(),
        )),
        other => other.clone(),
    }
}

/// Folds issues into an errors tree. The first message reported for a path
/// wins.
pub fn issues_to_tree(issues: &[Issue]) -> Value {
    issues.iter().fold(Value::map(), |errors, issue| {
        let Ok(at) = Path::parse(&issue.path) else {
            log::warn!(
                "dropping validation issue with unusable path '{}': {}",
                issue.path,
                issue.message
            );
            return errors;
        };
        if path::get(&errors, &at).is_some() {
            errors
        } else {
            path::set(&errors, &at, Value::String(issue.message.clone()))
        }
    })
}

fn recover_tree(result: Result<Value, ValidatorError>) -> Result<Value, ValidatorError> {
    match result {
        Err(ValidatorError::Invalid(issues)) => Ok(issues_to_tree(&issues)),
        other => other,
    }
}

fn recover_message(
    result: Result<Option<String>, ValidatorError>,
) -> Result<Option<String>, ValidatorError> {
    match result {
        Ok(msg) => Ok(msg.filter(|m| !m.is_empty())),
        Err(ValidatorError::Invalid(issues)) => Ok(issues
            .into_iter()
            .next()
            .map(|i| i.message)
            .filter(|m| !m.is_empty())),
        Err(crash) => Err(crash),
    }
}

async fn optional_tree(run: Option<ValidationFuture<Value>>) -> Result<Value, ValidatorError> {
    match run {
        Some(run) => recover_tree(run.await),
        None => Ok(Value::map()),
    }
}

/// Errors trees are maps without blank entries.
fn normalize(errors: Value) -> Value {
    match errors.compact() {
        tree @ Value::Map(_) => tree,
        Value::Null => Value::map(),
        other => {
            log::warn!("ignoring errors tree that is not a map: {other}");
            Value::map()
        }
    }
}

/// Snapshot of the validators that apply to one run.
#[derive(Clone, Default)]
pub struct ValidationPlan {
    pub fields: Vec<(Path, FieldValidator)>,
    pub form: Option<FormValidator>,
    pub schema: Option<FormValidator>,
}

impl ValidationPlan {
    /// Whether [`Self::start_field`] has anything to run for `at`.
    pub fn covers(&self, at: &Path) -> bool {
        self.schema.is_some() || self.fields.iter().any(|(p, _)| p == at)
    }

    /// Starts every validator and resolves to the merged errors tree.
    ///
    /// Per-field results come first, then the whole-form validator, then the
    /// schema; on a collision the later source wins. Any crash rejects the
    /// run.
    pub fn start_all(&self, values: &Value) -> ValidationFuture<Value> {
        let field_runs: Vec<_> = self
            .fields
            .iter()
            .map(|(at, validate)| {
                let value = path::get(values, at).cloned().unwrap_or_default();
                let run = validate(&value);
                let at = at.clone();
                async move { recover_message(run.await).map(|msg| (at, msg)) }
            })
            .collect();
        let form_run = self.form.as_ref().map(|validate| validate(values));
        let schema_run = self.schema.as_ref().map(|validate| validate(values));

        async move {
            let (fields, form, schema) = futures::join!(
                future::join_all(field_runs),
                optional_tree(form_run),
                optional_tree(schema_run),
            );
            let mut errors = Value::map();
            for outcome in fields {
                if let (at, Some(message)) = outcome? {
                    errors = path::set(&errors, &at, Value::String(message));
                }
            }
            errors = errors.deep_merge(&form?);
            errors = errors.deep_merge(&schema?);
            Ok(normalize(errors))
        }
        .boxed_local()
    }

    /// Starts validation of a single field.
    ///
    /// Uses the field's own validator when one is registered, otherwise the
    /// schema's message at that path. Returns `None` when neither applies.
    pub fn start_field(
        &self,
        at: &Path,
        values: &Value,
    ) -> Option<ValidationFuture<Option<String>>> {
        if let Some((_, validate)) = self.fields.iter().find(|(p, _)| p == at) {
            let value = path::get(values, at).cloned().unwrap_or_default();
            let run = validate(&value);
            return Some(async move { recover_message(run.await) }.boxed_local());
        }

        let schema = self.schema.as_ref()?;
        let run = schema(values);
        let at = at.clone();
        Some(
            async move {
                let tree = recover_tree(run.await)?;
                Ok(path::get(&tree, &at)
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_owned))
            }
            .boxed_local(),
        )
    }
}
