//! Form state and its pure transition function.

use std::rc::Rc;

use crate::path::{self, Path};
use crate::value::Value;

/// Generation of a validation run. Only the newest issued token may commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunToken(pub u64);

impl RunToken {
    pub fn next(self) -> RunToken {
        RunToken(self.0 + 1)
    }
}

/// What the form was (re)initialized with.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialSnapshot {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
    pub status: Value,
    /// Resolved initial-validity hint; `None` when the host gave none.
    pub initially_valid: Option<bool>,
}

impl Default for InitialSnapshot {
    fn default() -> Self {
        Self {
            values: Value::map(),
            errors: Value::map(),
            touched: Value::map(),
            status: Value::Null,
            initially_valid: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: u32,
    pub status: Value,
    pub initial: Rc<InitialSnapshot>,
    validating: Option<RunToken>,
}

impl FormState {
    pub fn from_snapshot(initial: Rc<InitialSnapshot>) -> Self {
        Self {
            values: initial.values.clone(),
            errors: initial.errors.clone(),
            touched: initial.touched.clone(),
            is_submitting: false,
            is_validating: false,
            submit_count: 0,
            status: initial.status.clone(),
            initial,
            validating: None,
        }
    }

    /// The run currently owning `is_validating`.
    pub fn validating_run(&self) -> Option<RunToken> {
        self.validating
    }

    pub fn value_at(&self, path: &Path) -> Option<&Value> {
        path::get(&self.values, path)
    }

    pub fn error_at(&self, path: &Path) -> Option<&str> {
        path::get(&self.errors, path).and_then(Value::as_str)
    }

    pub fn touched_at(&self, path: &Path) -> bool {
        path::get(&self.touched, path).is_some_and(Value::is_truthy)
    }

    fn start(&mut self, token: RunToken) {
        self.is_validating = true;
        self.validating = Some(token);
    }

    fn stop(&mut self, token: RunToken) {
        if self.validating == Some(token) {
            self.is_validating = false;
            self.validating = None;
        }
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::from_snapshot(Rc::default())
    }
}

/// Everything a reset replaces.
#[derive(Clone, Debug)]
pub struct ResetState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
    pub status: Value,
    pub submit_count: u32,
    pub initial: Rc<InitialSnapshot>,
}

/// The part of a new snapshot that a partial reinitialization copies into
/// the live state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitialSlice {
    Errors,
    Touched,
    Status,
}

#[derive(Clone, Debug)]
pub enum FormAction {
    SetValues(Value),
    /// `None` removes the value at `path`.
    SetFieldValue { path: Path, value: Option<Value> },
    SetTouched(Value),
    SetFieldTouched { path: Path, touched: bool },
    SetErrors(Value),
    /// `None` or an empty message clears the error.
    SetFieldError { path: Path, message: Option<String> },
    SetStatus(Value),
    SetSubmitting(bool),
    SubmitAttempt { token: RunToken, touched: Value },
    SubmitSuccess { token: RunToken },
    SubmitFailure { token: RunToken },
    StartValidation { token: RunToken },
    StopValidation { token: RunToken },
    CommitErrors { token: RunToken, errors: Value },
    CommitFieldError {
        token: RunToken,
        path: Path,
        message: Option<String>,
    },
    Reset(ResetState),
    /// Swaps the snapshot and copies one slice of it into the live state.
    Reinitialize {
        initial: Rc<InitialSnapshot>,
        slice: InitialSlice,
    },
}

impl FormAction {
    pub fn name(&self) -> &'static str {
        match self {
            FormAction::SetValues(_) => "SET_VALUES",
            FormAction::SetFieldValue { .. } => "SET_FIELD_VALUE",
            FormAction::SetTouched(_) => "SET_TOUCHED",
            FormAction::SetFieldTouched { .. } => "SET_FIELD_TOUCHED",
            FormAction::SetErrors(_) => "SET_ERRORS",
            FormAction::SetFieldError { .. } => "SET_FIELD_ERROR",
            FormAction::SetStatus(_) => "SET_STATUS",
            FormAction::SetSubmitting(_) => "SET_ISSUBMITTING",
            FormAction::SubmitAttempt { .. } => "SUBMIT_ATTEMPT",
            FormAction::SubmitSuccess { .. } => "SUBMIT_SUCCESS",
            FormAction::SubmitFailure { .. } => "SUBMIT_FAILURE",
            FormAction::StartValidation { .. } => "START_VALIDATION",
            FormAction::StopValidation { .. } => "STOP_VALIDATION",
            FormAction::CommitErrors { .. } => "COMMIT_ERRORS",
            FormAction::CommitFieldError { .. } => "COMMIT_FIELD_ERROR",
            FormAction::Reset(_) => "RESET_FORM",
            FormAction::Reinitialize { .. } => "REINITIALIZE",
        }
    }
}

fn set_error(errors: &Value, path: &Path, message: Option<String>) -> Value {
    match message.filter(|m| !m.is_empty()) {
        Some(message) => path::set(errors, path, Value::String(message)),
        None => path::unset(errors, path),
    }
}

pub fn reduce(state: &FormState, action: FormAction) -> FormState {
    log::trace!("form action {}", action.name());
    let mut next = state.clone();
    match action {
        FormAction::SetValues(values) => next.values = values,
        FormAction::SetFieldValue { path, value } => {
            next.values = match value {
                Some(value) => path::set(&state.values, &path, value),
                None => path::unset(&state.values, &path),
            };
        }
        FormAction::SetTouched(touched) => next.touched = touched,
        FormAction::SetFieldTouched { path, touched } => {
            next.touched = path::set(&state.touched, &path, Value::Bool(touched));
        }
        FormAction::SetErrors(errors) => next.errors = errors,
        FormAction::SetFieldError { path, message } => {
            next.errors = set_error(&state.errors, &path, message);
        }
        FormAction::SetStatus(status) => next.status = status,
        FormAction::SetSubmitting(on) => next.is_submitting = on,
        FormAction::SubmitAttempt { token, touched } => {
            next.touched = state.touched.deep_merge(&touched);
            next.is_submitting = true;
            next.submit_count += 1;
            next.start(token);
        }
        FormAction::SubmitSuccess { token } | FormAction::SubmitFailure { token } => {
            next.is_submitting = false;
            next.stop(token);
        }
        FormAction::StartValidation { token } => next.start(token),
        FormAction::StopValidation { token } => next.stop(token),
        FormAction::CommitErrors { token, errors } => {
            next.errors = errors;
            next.stop(token);
        }
        FormAction::CommitFieldError { token, path, message } => {
            next.errors = set_error(&state.errors, &path, message);
            next.stop(token);
        }
        FormAction::Reset(reset) => {
            next.values = reset.values;
            next.errors = reset.errors;
            next.touched = reset.touched;
            next.status = reset.status;
            next.submit_count = reset.submit_count;
            next.initial = reset.initial;
            next.is_submitting = false;
            next.is_validating = false;
            next.validating = None;
        }
        FormAction::Reinitialize { initial, slice } => {
            match slice {
                InitialSlice::Errors => next.errors = initial.errors.clone(),
                InitialSlice::Touched => next.touched = initial.touched.clone(),
                InitialSlice::Status => next.status = initial.status.clone(),
            }
            next.initial = initial;
        }
    }
    next
}
