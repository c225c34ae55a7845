//! # Form state, validation and subscriptions
//!
//! `formstate-core` keeps everything an interactive form needs in one place:
//!
//! - `Form`: cheap-clone handle owning values, errors, touched flags,
//!   submission flags and status.
//! - `FormConfig`: initial trees, the submit handler, validators and
//!   validation triggers.
//! - `FieldBinding`: what a single input holds on to.
//!
//! ## Values and paths
//!
//! Values, errors and touched flags are `Value` trees. Fields are addressed
//! by path strings such as `users[0].name`; `users.0.name` and
//! `users['0']['name']` address the same field. Every update produces a new
//! tree that shares all untouched branches with the previous one.
//!
//! ## A form in a few lines
//!
//! ```rust
//! use formstate_core::prelude::*;
//! use serde_json::json;
//!
//! let form = Form::new(FormConfig::new(json!({ "name": "jared" }), |values, _form| async move {
//!     println!("submitting {values}");
//!     Ok(())
//! }));
//!
//! form.set_field_value("name", "ian", None)?;
//! assert!(form.computed().dirty);
//!
//! let outcome = pollster::block_on(form.submit_form())?;
//! assert_eq!(outcome, Submission::Submitted);
//! assert_eq!(form.state().submit_count, 1);
//! # Ok::<(), formstate_core::FormError>(())
//! ```
//!
//! ## Validation
//!
//! Validators come in three flavours and may be mixed:
//!
//! - per field, registered with a binding (`FieldConfig::validate`);
//! - whole form (`FormConfig::validate`);
//! - a `Schema` object or factory (`FormConfig::validation_schema`).
//!
//! A run merges their results in that order, later sources winning on the
//! same path. Each run carries a token; only the newest run may commit, so a
//! slow validator can never overwrite the result of a faster, newer one.
//!
//! Runs that are still pending after their first poll go to an executor:
//! the host's `LocalSpawn` if it gave one, otherwise the form's own pool,
//! which `Form::run_pending` drives.
//!
//! ## Subscriptions
//!
//! `Form::use_state` projects the state through a selector and only reports
//! a change when the projection changes:
//!
//! ```rust
//! use formstate_core::prelude::*;
//! use serde_json::json;
//!
//! let form = Form::new(FormConfig::new(json!({ "a": 1, "b": 2 }), |_, _| async { Ok(()) }));
//! let a = form.use_state(|s| s.values.lookup("a").cloned());
//!
//! form.set_field_value("b", 3, None).unwrap();
//! assert!(!a.take_changed());
//!
//! form.set_field_value("a", 5, None).unwrap();
//! assert!(a.take_changed());
//! assert_eq!(a.get(), Some(Value::from(5)));
//! ```

pub mod computed;
pub mod config;
pub mod error;
pub mod event;
pub mod field;
pub mod form;
pub mod path;
pub mod prelude;
pub mod registry;
pub mod state;
pub mod store;
pub mod validation;
pub mod value;


pub use computed::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use field::*;
pub use form::*;
pub use path::{Path, PathCache, Seg};
pub use registry::*;
pub use state::*;
pub use store::*;
pub use validation::*;
pub use value::*;
