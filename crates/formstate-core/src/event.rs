//! The minimal input-event shape the form understands, and how a change
//! event turns into a field value.

use crate::error::{FormError, FormResult};
use crate::value::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Range,
    Checkbox,
    Radio,
    Select,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventTarget {
    pub name: Option<String>,
    pub id: Option<String>,
    pub kind: InputKind,
    pub value: String,
    pub checked: bool,
    pub multiple: bool,
    pub options: Vec<SelectOption>,
}

impl EventTarget {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.multiple = true;
        self.options = options;
        self
    }

    /// `name`, falling back to `id`.
    pub fn field_path(&self) -> FormResult<&str> {
        [self.name.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .ok_or_else(|| {
                FormError::Usage(format!(
                    "input event has neither a name nor an id (kind {:?}, value {:?})",
                    self.kind, self.value
                ))
            })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldEvent {
    pub target: EventTarget,
}

impl From<EventTarget> for FieldEvent {
    fn from(target: EventTarget) -> Self {
        Self { target }
    }
}

/// The value a change event stores, given what the field holds now.
pub fn change_value(target: &EventTarget, current: Option<&Value>) -> Value {
    match target.kind {
        InputKind::Number | InputKind::Range => match parse_leading_float(&target.value) {
            Some(n) => Value::Number(n),
            None => Value::from(""),
        },
        InputKind::Checkbox => checkbox_value(current, target.checked, &target.value),
        _ if target.multiple && !target.options.is_empty() => Value::from(
            target
                .options
                .iter()
                .filter(|o| o.selected)
                .map(|o| Value::from(o.value.as_str()))
                .collect::<Vec<_>>(),
        ),
        _ => Value::from(target.value.as_str()),
    }
}

/// Longest numeric prefix, so `"12px"` reads as 12. Spellings such as
/// `inf` or `NaN` and values out of `f64` range give `None`.
fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut seen_digit = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        seen_digit |= frac_end > end + 1;
        end = frac_end;
    }
    if !seen_digit {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A boolean field (or a checkbox without a meaningful value) toggles; a
/// list field gains or loses the checkbox's value.
fn checkbox_value(current: Option<&Value>, checked: bool, value: &str) -> Value {
    let items = match current {
        Some(Value::Bool(_)) => return Value::Bool(checked),
        Some(Value::List(items)) => items.as_slice(),
        _ if value.is_empty() || value == "true" || value == "false" => {
            return Value::Bool(checked);
        }
        _ => &[],
    };

    let position = items.iter().position(|item| item.as_str() == Some(value));
    match position {
        None if checked && !value.is_empty() => {
            let mut next = items.to_vec();
            next.push(Value::from(value));
            Value::from(next)
        }
        None => Value::from(items.to_vec()),
        Some(_) if checked => Value::from(items.to_vec()),
        Some(i) => {
            let mut next = items.to_vec();
            next.remove(i);
            Value::from(next)
        }
    }
}
