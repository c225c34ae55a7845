//! The form handle hosts talk to.
//!
//! A [`Form`] owns the committed state, the field registry, the latest run
//! token and the executor for background validation. It is a cheap-clone
//! `Rc` handle and is `!Send`: every transition happens on the
//! thread that owns the form.
//!
//! Validation runs are stamped with a [`RunToken`] when they start. When a
//! run resolves it commits only if no newer run was issued in the meantime;
//! otherwise its result is dropped. Resetting issues a token too, so every
//! run started before the reset goes stale.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::task::Context;

use futures::FutureExt;
use futures::executor::LocalPool;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt, noop_waker_ref};

use crate::computed::ComputedState;
use crate::config::{FormConfig, ValidateOn};
use crate::error::{FormError, FormResult};
use crate::event::{FieldEvent, change_value};
use crate::field::{FieldBinding, FieldConfig, FieldMeta};
use crate::path::{self, Path, PathCache};
use crate::registry::FieldRegistry;
use crate::state::{
    FormAction, FormState, InitialSlice, InitialSnapshot, ResetState, RunToken,
};
use crate::store::{Selected, Store, Subscription};
use crate::validation::{FieldValidator, ValidationFuture, ValidationPlan};
use crate::value::Value;

/// A pending form operation.
pub type Task<T> = LocalBoxFuture<'static, FormResult<T>>;

/// How a submit attempt ended when it did not fail outright.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// Validation passed and the submit handler returned `Ok`.
    Submitted,
    /// Validation produced these errors; the handler was not called.
    Invalid(Value),
}

/// Replacement pieces for [`Form::reset_form`]; anything left `None` comes
/// from the current initial snapshot.
#[derive(Clone, Debug, Default)]
pub struct ResetOverrides {
    pub values: Option<Value>,
    pub errors: Option<Value>,
    pub touched: Option<Value>,
    pub status: Option<Value>,
    pub submit_count: Option<u32>,
}

struct FormInner {
    store: Store,
    registry: RefCell<FieldRegistry>,
    latest: Cell<RunToken>,
    paths: PathCache,
    config: FormConfig,
    pool: Option<RefCell<LocalPool>>,
    spawner: Rc<dyn LocalSpawn>,
}

#[derive(Clone)]
pub struct Form(Rc<FormInner>);

impl Form {
    pub fn new(config: FormConfig) -> Form {
        let initial = Rc::new(InitialSnapshot {
            values: config.initial_values.clone(),
            errors: config.initial_errors.clone(),
            touched: config.initial_touched.clone(),
            status: config.initial_status.clone(),
            initially_valid: config.initial_valid.resolve(&config.initial_values),
        });

        let (pool, spawner) = match config.spawner.clone() {
            Some(spawner) => (None, spawner),
            None => {
                let pool = LocalPool::new();
                let spawner: Rc<dyn LocalSpawn> = Rc::new(pool.spawner());
                (Some(RefCell::new(pool)), spawner)
            }
        };

        Form(Rc::new(FormInner {
            store: Store::new(FormState::from_snapshot(initial)),
            registry: RefCell::new(FieldRegistry::new()),
            latest: Cell::new(RunToken::default()),
            paths: PathCache::default(),
            config,
            pool,
            spawner,
        }))
    }

    // ---- reads ----

    pub fn state(&self) -> FormState {
        self.0.store.state()
    }

    pub fn values(&self) -> Value {
        self.0.store.with_state(|s| s.values.clone())
    }

    pub fn computed(&self) -> ComputedState {
        self.0.store.with_state(ComputedState::of)
    }

    pub fn config(&self) -> &FormConfig {
        &self.0.config
    }

    pub fn resolve(&self, path: &str) -> FormResult<Path> {
        Ok(self.0.paths.resolve(path)?)
    }

    pub fn field_meta(&self, path: &str) -> FormResult<FieldMeta> {
        let path = self.resolve(path)?;
        Ok(self.meta_at(&path))
    }

    pub(crate) fn meta_at(&self, path: &Path) -> FieldMeta {
        self.0.store.with_state(|s| FieldMeta {
            value: s.value_at(path).cloned(),
            error: s.error_at(path).map(str::to_owned),
            touched: s.touched_at(path),
            initial_value: path::get(&s.initial.values, path).cloned(),
            initial_error: path::get(&s.initial.errors, path)
                .and_then(Value::as_str)
                .map(str::to_owned),
            initial_touched: path::get(&s.initial.touched, path).is_some_and(Value::is_truthy),
        })
    }

    // ---- subscriptions ----

    /// Live projection compared with `PartialEq`.
    pub fn use_state<T, S>(&self, selector: S) -> Selected<T>
    where
        T: Clone + PartialEq + 'static,
        S: Fn(&FormState) -> T + 'static,
    {
        self.0.store.select(selector, |a: &T, b: &T| a == b, true)
    }

    pub fn use_state_with<T, S, C>(
        &self,
        selector: S,
        same: C,
        should_subscribe: bool,
    ) -> Selected<T>
    where
        T: Clone + 'static,
        S: Fn(&FormState) -> T + 'static,
        C: Fn(&T, &T) -> bool + 'static,
    {
        self.0.store.select(selector, same, should_subscribe)
    }

    pub fn subscribe<T, S, C, L>(
        &self,
        selector: S,
        same: C,
        initial_notify: bool,
        listener: L,
    ) -> Subscription
    where
        T: Clone + 'static,
        S: Fn(&FormState) -> T + 'static,
        C: Fn(&T, &T) -> bool + 'static,
        L: FnMut(&T) + 'static,
    {
        self.0.store.subscribe(selector, same, initial_notify, listener)
    }

    // ---- field registry ----

    pub fn register_field(&self, path: &str, validate: Option<FieldValidator>) -> FormResult<()> {
        let path = self.resolve(path)?;
        self.register_at(&path, validate)
    }

    pub fn unregister_field(&self, path: &str) -> FormResult<bool> {
        let path = self.resolve(path)?;
        Ok(self.unregister_at(&path))
    }

    pub(crate) fn register_at(
        &self,
        path: &Path,
        validate: Option<FieldValidator>,
    ) -> FormResult<()> {
        self.0.registry.borrow_mut().register(path, validate)
    }

    pub(crate) fn unregister_at(&self, path: &Path) -> bool {
        self.0.registry.borrow_mut().unregister(path)
    }

    /// Binds a field: registers it now and unregisters it when the binding
    /// drops.
    pub fn use_field(&self, config: FieldConfig) -> FormResult<FieldBinding> {
        FieldBinding::new(self.clone(), config)
    }

    // ---- setters ----

    pub fn set_values(&self, values: impl Into<Value>, should_validate: Option<bool>) {
        self.dispatch(FormAction::SetValues(values.into()));
        self.after_change(should_validate, ValidateOn::CHANGE);
    }

    pub fn update_values(&self, f: impl FnOnce(&Value) -> Value, should_validate: Option<bool>) {
        let next = f(&self.values());
        self.set_values(next, should_validate);
    }

    pub fn set_field_value(
        &self,
        path: &str,
        value: impl Into<Value>,
        should_validate: Option<bool>,
    ) -> FormResult<()> {
        let path = self.resolve(path)?;
        self.set_value_at(path, value.into(), should_validate);
        Ok(())
    }

    pub(crate) fn set_value_at(&self, path: Path, value: Value, should_validate: Option<bool>) {
        self.dispatch(FormAction::SetFieldValue {
            path,
            value: Some(value),
        });
        self.after_change(should_validate, ValidateOn::CHANGE);
    }

    pub fn set_touched(&self, touched: impl Into<Value>, should_validate: Option<bool>) {
        self.dispatch(FormAction::SetTouched(touched.into()));
        self.after_change(should_validate, ValidateOn::BLUR);
    }

    pub fn set_field_touched(
        &self,
        path: &str,
        touched: bool,
        should_validate: Option<bool>,
    ) -> FormResult<()> {
        let path = self.resolve(path)?;
        self.set_touched_at(path, touched, should_validate);
        Ok(())
    }

    pub(crate) fn set_touched_at(&self, path: Path, touched: bool, should_validate: Option<bool>) {
        self.dispatch(FormAction::SetFieldTouched { path, touched });
        self.after_change(should_validate, ValidateOn::BLUR);
    }

    pub fn set_errors(&self, errors: impl Into<Value>) {
        self.dispatch(FormAction::SetErrors(errors.into()));
    }

    /// `None` or an empty message clears the error.
    pub fn set_field_error(&self, path: &str, message: Option<&str>) -> FormResult<()> {
        let path = self.resolve(path)?;
        self.set_error_at(path, message.map(str::to_owned));
        Ok(())
    }

    pub(crate) fn set_error_at(&self, path: Path, message: Option<String>) {
        self.dispatch(FormAction::SetFieldError { path, message });
    }

    pub fn set_status(&self, status: impl Into<Value>) {
        self.dispatch(FormAction::SetStatus(status.into()));
    }

    pub fn set_submitting(&self, on: bool) {
        self.dispatch(FormAction::SetSubmitting(on));
    }

    // ---- events ----

    pub fn handle_change(&self, event: &FieldEvent) -> FormResult<()> {
        let path = self.resolve(event.target.field_path()?)?;
        self.change_at(path, event);
        Ok(())
    }

    /// Change handler bound to `path`; the event's own name is ignored.
    pub fn handle_change_for(&self, path: &str) -> FormResult<impl Fn(&FieldEvent) + 'static> {
        let path = self.resolve(path)?;
        let form = self.clone();
        Ok(move |event: &FieldEvent| form.change_at(path.clone(), event))
    }

    fn change_at(&self, path: Path, event: &FieldEvent) {
        let current = self.0.store.with_state(|s| s.value_at(&path).cloned());
        let value = change_value(&event.target, current.as_ref());
        self.set_value_at(path, value, None);
    }

    pub fn handle_blur(&self, event: &FieldEvent) -> FormResult<()> {
        let path = self.resolve(event.target.field_path()?)?;
        self.set_touched_at(path, true, None);
        Ok(())
    }

    pub fn handle_blur_for(&self, path: &str) -> FormResult<impl Fn() + 'static> {
        let path = self.resolve(path)?;
        let form = self.clone();
        Ok(move || form.set_touched_at(path.clone(), true, None))
    }

    // ---- validation ----

    fn validates_on(&self, trigger: ValidateOn) -> bool {
        self.0.config.validate_on.contains(trigger)
    }

    fn after_change(&self, should_validate: Option<bool>, trigger: ValidateOn) {
        if should_validate.unwrap_or_else(|| self.validates_on(trigger)) {
            self.validate_in_background();
        }
    }

    fn issue_token(&self) -> RunToken {
        let token = self.0.latest.get().next();
        self.0.latest.set(token);
        token
    }

    fn is_latest(&self, token: RunToken) -> bool {
        self.0.latest.get() == token
    }

    fn plan(&self) -> ValidationPlan {
        ValidationPlan {
            fields: self.0.registry.borrow().validators(),
            form: self.0.config.validate.clone(),
            schema: self.0.config.validation_schema.clone(),
        }
    }

    fn start_all(&self) -> ValidationFuture<Value> {
        let values = self.values();
        self.plan().start_all(&values)
    }

    fn commit_errors(&self, token: RunToken, errors: Value) {
        if self.is_latest(token) {
            log::debug!("validation run {} committed", token.0);
            self.dispatch(FormAction::CommitErrors { token, errors });
        } else {
            log::debug!("validation run {} is stale, dropping its result", token.0);
        }
    }

    /// Validates the whole form and commits the errors unless a newer run
    /// started meanwhile. Resolves to this run's own errors either way; a
    /// stale run that crashed resolves to an empty tree.
    pub fn validate_form(&self) -> Task<Value> {
        let token = self.issue_token();
        self.dispatch(FormAction::StartValidation { token });
        log::debug!("validation run {} started", token.0);
        let run = self.start_all();

        let form = self.clone();
        async move {
            let errors = match run.await {
                Ok(errors) => errors,
                Err(err) if !form.is_latest(token) => {
                    log::debug!("stale validation run {} crashed: {err}", token.0);
                    return Ok(Value::map());
                }
                Err(err) => {
                    form.dispatch(FormAction::StopValidation { token });
                    return Err(FormError::from(err));
                }
            };
            form.commit_errors(token, errors.clone());
            Ok(errors)
        }
        .boxed_local()
    }

    /// Validates one field with its own validator, or with the schema's
    /// message for it. Resolves to `None` when nothing applies, and when a
    /// stale run crashed.
    pub fn validate_field(&self, path: &str) -> FormResult<Task<Option<String>>> {
        let path = self.resolve(path)?;
        let plan = self.plan();
        if !plan.covers(&path) {
            log::debug!("no validator covers '{path}'");
            return Ok(futures::future::ready(Ok(None)).boxed_local());
        }

        let token = self.issue_token();
        self.dispatch(FormAction::StartValidation { token });
        log::debug!("validation run {} started for '{path}'", token.0);
        let values = self.values();
        let Some(run) = plan.start_field(&path, &values) else {
            self.dispatch(FormAction::StopValidation { token });
            return Ok(futures::future::ready(Ok(None)).boxed_local());
        };

        let form = self.clone();
        Ok(async move {
            let message = match run.await {
                Ok(message) => message,
                Err(err) if !form.is_latest(token) => {
                    log::debug!("stale validation run {} crashed: {err}", token.0);
                    return Ok(None);
                }
                Err(err) => {
                    form.dispatch(FormAction::StopValidation { token });
                    return Err(FormError::from(err));
                }
            };
            if form.is_latest(token) {
                log::debug!("validation run {} committed for '{path}'", token.0);
                form.dispatch(FormAction::CommitFieldError {
                    token,
                    path,
                    message: message.clone(),
                });
            } else {
                log::debug!("validation run {} is stale, dropping its result", token.0);
            }
            Ok(message)
        }
        .boxed_local())
    }

    fn validate_in_background(&self) {
        let run = self.validate_form();
        self.schedule(async move {
            if let Err(err) = run.await {
                log::error!("background validation failed: {err}");
            }
        });
    }

    /// Validates on mount when the form is configured to.
    pub fn mount(&self) {
        if self.validates_on(ValidateOn::MOUNT) {
            self.validate_in_background();
        }
    }

    /// Polls `task` once here; only a task that is still pending goes to the
    /// executor.
    fn schedule(&self, task: impl Future<Output = ()> + 'static) {
        let mut task = task.boxed_local();
        let mut cx = Context::from_waker(noop_waker_ref());
        if task.poll_unpin(&mut cx).is_ready() {
            return;
        }
        if let Err(err) = self.0.spawner.spawn_local(task) {
            log::error!("could not spawn background form task: {err}");
        }
    }

    /// Drives background tasks on the form's own executor until none can
    /// make progress. Does nothing when the host supplied a spawner.
    pub fn run_pending(&self) {
        let Some(pool) = &self.0.pool else {
            return;
        };
        match pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => log::warn!("run_pending called from inside a background form task"),
        }
    }

    // ---- submission ----

    fn all_fields_touched(&self) -> Value {
        let mut touched = self.values().mirror_leaves(&Value::Bool(true));
        for path in self.0.registry.borrow().paths() {
            touched = path::set(&touched, path, Value::Bool(true));
        }
        touched
    }

    /// Touches every known field, validates, and hands the values to the
    /// submit handler when no errors came back.
    pub fn submit_form(&self) -> Task<Submission> {
        let token = self.issue_token();
        let touched = self.all_fields_touched();
        self.dispatch(FormAction::SubmitAttempt { token, touched });
        log::debug!("submit attempt with run {}", token.0);
        let run = self.start_all();

        let form = self.clone();
        async move {
            let errors = match run.await {
                Ok(errors) => errors,
                Err(err) => {
                    form.dispatch(FormAction::SubmitFailure { token });
                    return Err(FormError::from(err));
                }
            };
            form.commit_errors(token, errors.clone());

            if !errors.is_blank() {
                log::debug!("submit blocked by validation errors: {errors}");
                form.dispatch(FormAction::SubmitFailure { token });
                return Ok(Submission::Invalid(errors));
            }

            let on_submit = form.0.config.on_submit.clone();
            match on_submit(form.values(), form.clone()).await {
                Ok(()) => {
                    log::debug!("submit handler finished");
                    form.dispatch(FormAction::SubmitSuccess { token });
                    Ok(Submission::Submitted)
                }
                Err(err) => {
                    form.dispatch(FormAction::SubmitFailure { token });
                    Err(FormError::Submit(err))
                }
            }
        }
        .boxed_local()
    }

    /// Fire-and-forget [`Self::submit_form`].
    pub fn handle_submit(&self) {
        let submit = self.submit_form();
        self.schedule(async move {
            match submit.await {
                Ok(Submission::Submitted) => {}
                Ok(Submission::Invalid(_)) => log::debug!("submit rejected by validation"),
                Err(err) => log::error!("submit failed: {err}"),
            }
        });
    }

    // ---- reset & reinitialization ----

    fn snapshot(&self) -> Rc<InitialSnapshot> {
        self.0.store.with_state(|s| s.initial.clone())
    }

    /// Replaces values, errors, touched flags, status and submit count, and
    /// takes the result as the new initial snapshot. Runs still in flight
    /// go stale.
    pub fn reset_form(&self, overrides: ResetOverrides) {
        let initial = self.snapshot();
        let values = overrides.values.unwrap_or_else(|| initial.values.clone());
        let snapshot = Rc::new(InitialSnapshot {
            initially_valid: self.0.config.initial_valid.resolve(&values),
            errors: overrides.errors.unwrap_or_else(|| initial.errors.clone()),
            touched: overrides.touched.unwrap_or_else(|| initial.touched.clone()),
            status: overrides.status.unwrap_or_else(|| initial.status.clone()),
            values,
        });

        let token = self.issue_token();
        log::debug!("form reset, runs before {} are stale", token.0);
        self.dispatch(FormAction::Reset(ResetState {
            values: snapshot.values.clone(),
            errors: snapshot.errors.clone(),
            touched: snapshot.touched.clone(),
            status: snapshot.status.clone(),
            submit_count: overrides.submit_count.unwrap_or(0),
            initial: snapshot,
        }));
    }

    /// Calls the reset handler with the current values, then resets with the
    /// overrides it resolved to. A failing handler leaves the form untouched.
    pub fn handle_reset(&self) -> Task<()> {
        let pending = self
            .0
            .config
            .on_reset
            .as_ref()
            .map(|on_reset| on_reset(self.values(), self.clone()));

        let form = self.clone();
        async move {
            let overrides = match pending {
                Some(pending) => match pending.await {
                    Ok(overrides) => overrides,
                    Err(err) => return Err(FormError::Reset(err)),
                },
                None => None,
            };
            form.reset_form(overrides.unwrap_or_default());
            Ok(())
        }
        .boxed_local()
    }

    /// New initial values from the host. With reinitialization enabled and
    /// values that differ from the snapshot, the form resets to them.
    /// Returns whether it did.
    pub fn set_initial_values(&self, values: impl Into<Value>) -> bool {
        let values = values.into();
        if !self.0.config.enable_reinitialize || self.snapshot().values == values {
            return false;
        }
        self.reset_form(ResetOverrides {
            values: Some(values),
            ..Default::default()
        });
        if self.validates_on(ValidateOn::MOUNT) {
            self.validate_in_background();
        }
        true
    }

    pub fn set_initial_errors(&self, errors: impl Into<Value>) -> bool {
        self.reinitialize(InitialSlice::Errors, errors.into())
    }

    pub fn set_initial_touched(&self, touched: impl Into<Value>) -> bool {
        self.reinitialize(InitialSlice::Touched, touched.into())
    }

    pub fn set_initial_status(&self, status: impl Into<Value>) -> bool {
        self.reinitialize(InitialSlice::Status, status.into())
    }

    fn reinitialize(&self, slice: InitialSlice, incoming: Value) -> bool {
        if !self.0.config.enable_reinitialize {
            return false;
        }
        let current = self.snapshot();
        let mut next = (*current).clone();
        let target = match slice {
            InitialSlice::Errors => &mut next.errors,
            InitialSlice::Touched => &mut next.touched,
            InitialSlice::Status => &mut next.status,
        };
        if *target == incoming {
            return false;
        }
        *target = incoming;
        self.dispatch(FormAction::Reinitialize {
            initial: Rc::new(next),
            slice,
        });
        true
    }

    pub(crate) fn dispatch(&self, action: FormAction) {
        self.0.store.dispatch(action);
    }
}
