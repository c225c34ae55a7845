//! Per-field bindings.
//!
//! A [`FieldBinding`] is what an input component holds: it registers its
//! path (and validator) with the form when created and unregisters when
//! dropped, so the registry always matches the live bindings.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::FormResult;
use crate::event::{FieldEvent, InputKind, change_value};
use crate::form::Form;
use crate::path::Path;
use crate::validation::FieldValidator;
use crate::value::Value;

/// Raw input to stored value. Receives the field name.
pub type ParseFn = Rc<dyn Fn(&Value, &str) -> Value>;

/// Stored value to displayed value. Receives the field name.
pub type FormatFn = Rc<dyn Fn(&Value, &str) -> Value>;

#[derive(Clone, Default)]
pub struct FieldConfig {
    pub name: String,
    pub validate: Option<FieldValidator>,
    pub parse: Option<ParseFn>,
    pub format: Option<FormatFn>,
    /// Hold formatting back while the field is being edited.
    pub format_on_blur: bool,
    pub kind: InputKind,
    /// Checkbox/radio value matched against the stored value.
    pub value: Option<String>,
    pub multiple: bool,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(mut self, validate: FieldValidator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn parse(mut self, f: impl Fn(&Value, &str) -> Value + 'static) -> Self {
        self.parse = Some(Rc::new(f));
        self
    }

    pub fn format(mut self, f: impl Fn(&Value, &str) -> Value + 'static) -> Self {
        self.format = Some(Rc::new(f));
        self
    }

    pub fn format_on_blur(mut self, on: bool) -> Self {
        self.format_on_blur = on;
        self
    }

    pub fn kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn multiple(mut self, on: bool) -> Self {
        self.multiple = on;
        self
    }
}

/// What an input renders from.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldProps {
    pub name: String,
    pub value: Value,
    pub checked: Option<bool>,
    pub multiple: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMeta {
    pub value: Option<Value>,
    pub error: Option<String>,
    pub touched: bool,
    pub initial_value: Option<Value>,
    pub initial_error: Option<String>,
    pub initial_touched: bool,
}

pub struct FieldBinding {
    form: Form,
    path: Path,
    config: FieldConfig,
    editing: Cell<bool>,
}

impl FieldBinding {
    pub fn new(form: Form, config: FieldConfig) -> FormResult<Self> {
        let path = form.resolve(&config.name)?;
        form.register_at(&path, config.validate.clone())?;
        Ok(Self {
            form,
            path,
            config,
            editing: Cell::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn props(&self) -> FieldProps {
        let stored = self
            .form
            .meta_at(&self.path)
            .value
            .unwrap_or_default();
        let mut props = FieldProps {
            name: self.config.name.clone(),
            value: self.display(&stored),
            checked: None,
            multiple: false,
        };

        match (self.config.kind, self.config.value.as_deref()) {
            (InputKind::Checkbox, None) => props.checked = Some(stored.is_truthy()),
            (InputKind::Checkbox, Some(own)) => {
                props.checked = Some(
                    stored
                        .as_list()
                        .is_some_and(|items| items.iter().any(|i| i.as_str() == Some(own))),
                );
                props.value = Value::from(own);
            }
            (InputKind::Radio, own) => {
                props.checked = Some(stored.as_str() == own);
                props.value = own.map(Value::from).unwrap_or_default();
            }
            (InputKind::Select, _) if self.config.multiple => {
                if stored.is_null() {
                    props.value = Value::list();
                }
                props.multiple = true;
            }
            _ => {}
        }
        props
    }

    fn display(&self, stored: &Value) -> Value {
        match &self.config.format {
            Some(format) if !(self.config.format_on_blur && self.editing.get()) => {
                format(stored, &self.config.name)
            }
            _ => stored.clone(),
        }
    }

    pub fn meta(&self) -> FieldMeta {
        self.form.meta_at(&self.path)
    }

    pub fn set_value(&self, value: impl Into<Value>, should_validate: Option<bool>) {
        self.form
            .set_value_at(self.path.clone(), value.into(), should_validate);
    }

    pub fn set_touched(&self, touched: bool, should_validate: Option<bool>) {
        self.form
            .set_touched_at(self.path.clone(), touched, should_validate);
    }

    pub fn set_error(&self, message: Option<&str>) {
        self.form
            .set_error_at(self.path.clone(), message.map(str::to_owned));
    }

    pub fn handle_change(&self, event: &FieldEvent) {
        let mut target = event.target.clone();
        if target.kind == InputKind::Text {
            target.kind = self.config.kind;
        }
        let current = self.form.meta_at(&self.path).value;
        let mut value = change_value(&target, current.as_ref());
        if let Some(parse) = &self.config.parse {
            value = parse(&value, &self.config.name);
        }
        self.editing.set(true);
        self.set_value(value, None);
    }

    pub fn handle_blur(&self) {
        self.editing.set(false);
        self.set_touched(true, None);
    }
}

impl Drop for FieldBinding {
    fn drop(&mut self) {
        self.form.unregister_at(&self.path);
    }
}
