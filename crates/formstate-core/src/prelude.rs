pub use crate::computed::{ComputedState, InitialValidity};
pub use crate::config::{FormConfig, ValidateOn};
pub use crate::error::{FormError, FormResult, Issue, PathError, ValidatorError};
pub use crate::event::{EventTarget, FieldEvent, InputKind, SelectOption};
pub use crate::field::{FieldBinding, FieldConfig, FieldMeta, FieldProps};
pub use crate::form::{Form, ResetOverrides, Submission, Task};
pub use crate::path::Path;
pub use crate::state::FormState;
pub use crate::store::{Selected, Subscription};
pub use crate::validation::{
    FieldValidator, FormValidator, Schema, ValidationFuture, async_field_validator,
    async_form_validator, field_validator, form_validator, try_form_validator,
};
pub use crate::value::Value;
