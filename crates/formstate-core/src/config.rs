use std::future::Future;
use std::rc::Rc;

use bitflags::bitflags;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawn;

use crate::computed::InitialValidity;
use crate::form::{Form, ResetOverrides};
use crate::validation::{FormValidator, Schema, schema_factory_validator, schema_validator};
use crate::value::Value;

bitflags! {
    /// Events that trigger a whole-form validation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ValidateOn: u8 {
        const CHANGE = 1 << 0;
        const BLUR = 1 << 1;
        const MOUNT = 1 << 2;
    }
}

impl Default for ValidateOn {
    fn default() -> Self {
        ValidateOn::CHANGE | ValidateOn::BLUR
    }
}

pub type SubmitHandler = Rc<dyn Fn(Value, Form) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

/// Resolves to the overrides the following reset uses; `None` resets to the
/// snapshot.
pub type ResetHandler =
    Rc<dyn Fn(Value, Form) -> LocalBoxFuture<'static, anyhow::Result<Option<ResetOverrides>>>>;

#[derive(Clone)]
pub struct FormConfig {
    pub initial_values: Value,
    pub initial_errors: Value,
    pub initial_touched: Value,
    pub initial_status: Value,
    pub on_submit: SubmitHandler,
    pub on_reset: Option<ResetHandler>,
    pub validate: Option<FormValidator>,
    pub validation_schema: Option<FormValidator>,
    pub validate_on: ValidateOn,
    pub enable_reinitialize: bool,
    pub initial_valid: InitialValidity,
    /// Host executor for background validation. Without one the form runs
    /// its own pool, driven by [`Form::run_pending`].
    pub spawner: Option<Rc<dyn LocalSpawn>>,
}

impl FormConfig {
    /// `on_submit` receives the submitted values and a handle to the form.
    pub fn new<F, Fut>(initial_values: impl Into<Value>, on_submit: F) -> Self
    where
        F: Fn(Value, Form) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self {
            initial_values: initial_values.into(),
            initial_errors: Value::map(),
            initial_touched: Value::map(),
            initial_status: Value::Null,
            on_submit: Rc::new(move |values, form| on_submit(values, form).boxed_local()),
            on_reset: None,
            validate: None,
            validation_schema: None,
            validate_on: ValidateOn::default(),
            enable_reinitialize: false,
            initial_valid: InitialValidity::Unspecified,
            spawner: None,
        }
    }

    pub fn initial_errors(mut self, errors: impl Into<Value>) -> Self {
        self.initial_errors = errors.into();
        self
    }

    pub fn initial_touched(mut self, touched: impl Into<Value>) -> Self {
        self.initial_touched = touched.into();
        self
    }

    pub fn initial_status(mut self, status: impl Into<Value>) -> Self {
        self.initial_status = status.into();
        self
    }

    pub fn on_reset(mut self, f: impl Fn(Value, Form) -> anyhow::Result<()> + 'static) -> Self {
        self.on_reset = Some(Rc::new(move |values, form| {
            futures::future::ready(f(values, form).map(|()| None)).boxed_local()
        }));
        self
    }

    /// Reset handler that finishes later. What it resolves to feeds
    /// [`Form::reset_form`].
    pub fn on_reset_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, Form) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Option<ResetOverrides>>> + 'static,
    {
        self.on_reset = Some(Rc::new(move |values, form| f(values, form).boxed_local()));
        self
    }

    pub fn validate(mut self, validator: FormValidator) -> Self {
        self.validate = Some(validator);
        self
    }

    pub fn validation_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.validation_schema = Some(schema_validator(schema));
        self
    }

    /// Schema built anew for every run.
    pub fn validation_schema_with<S, F>(mut self, factory: F) -> Self
    where
        S: Schema,
        F: Fn() -> S + 'static,
    {
        self.validation_schema = Some(schema_factory_validator(factory));
        self
    }

    pub fn validate_on_change(mut self, on: bool) -> Self {
        self.validate_on.set(ValidateOn::CHANGE, on);
        self
    }

    pub fn validate_on_blur(mut self, on: bool) -> Self {
        self.validate_on.set(ValidateOn::BLUR, on);
        self
    }

    pub fn validate_on_mount(mut self, on: bool) -> Self {
        self.validate_on.set(ValidateOn::MOUNT, on);
        self
    }

    pub fn enable_reinitialize(mut self, on: bool) -> Self {
        self.enable_reinitialize = on;
        self
    }

    pub fn initial_valid(mut self, validity: impl Into<InitialValidity>) -> Self {
        self.initial_valid = validity.into();
        self
    }

    pub fn spawner(mut self, spawner: Rc<dyn LocalSpawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }
}
