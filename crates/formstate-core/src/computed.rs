//! Values derived from [`FormState`] on every read.

use std::fmt;
use std::rc::Rc;

use crate::state::FormState;
use crate::value::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputedState {
    pub dirty: bool,
    pub is_valid: bool,
}

impl ComputedState {
    pub fn of(state: &FormState) -> Self {
        Self {
            dirty: is_dirty(state),
            is_valid: is_valid(state),
        }
    }
}

pub fn is_dirty(state: &FormState) -> bool {
    state.values != state.initial.values
}

/// Before the first interaction an initial-validity hint, when given,
/// decides; afterwards only the errors tree does.
pub fn is_valid(state: &FormState) -> bool {
    match state.initial.initially_valid {
        Some(hint) if state.touched.is_blank() => hint,
        _ => state.errors.is_blank(),
    }
}

/// How validity is judged before the form is touched.
#[derive(Clone, Default)]
pub enum InitialValidity {
    /// Judge by the errors tree.
    #[default]
    Unspecified,
    Flag(bool),
    /// Called with the initial values whenever a snapshot is taken.
    Predicate(Rc<dyn Fn(&Value) -> bool>),
}

impl InitialValidity {
    pub fn predicate(f: impl Fn(&Value) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }

    pub fn resolve(&self, initial_values: &Value) -> Option<bool> {
        match self {
            InitialValidity::Unspecified => None,
            InitialValidity::Flag(flag) => Some(*flag),
            InitialValidity::Predicate(f) => Some(f(initial_values)),
        }
    }
}

impl From<bool> for InitialValidity {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl fmt::Debug for InitialValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialValidity::Unspecified => f.write_str("Unspecified"),
            InitialValidity::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            InitialValidity::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
