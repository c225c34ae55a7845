use formstate_core::prelude::*;
use futures::FutureExt;
use serde_json::json;

/// Email must contain `@`, password needs 8 characters and has to be
/// repeated exactly.
struct SignupSchema;

impl Schema for SignupSchema {
    fn validate(&self, values: &Value) -> ValidationFuture<()> {
        let text = |path: &str| values.lookup(path).and_then(Value::as_str).unwrap_or("");
        let mut issues = Vec::new();

        match text("email") {
            "" => issues.push(Issue::new("email", "Required")),
            email if !email.contains('@') => issues.push(Issue::new("email", "Invalid email")),
            _ => {}
        }
        if text("password").chars().count() < 8 {
            issues.push(Issue::new("password", "At least 8 characters"));
        }
        if text("confirm") != text("password") {
            issues.push(Issue::new("confirm", "Passwords do not match"));
        }

        let result = if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidatorError::Invalid(issues))
        };
        futures::future::ready(result).boxed_local()
    }
}

fn username_available() -> FieldValidator {
    async_field_validator(|value| {
        let name = value.as_str().unwrap_or("").to_owned();
        async move {
            let taken = ["admin", "root"].contains(&name.as_str());
            Ok(taken.then(|| format!("'{name}' is taken")))
        }
    })
}

fn type_into(form: &Form, name: &str, value: &str) -> FormResult<()> {
    form.handle_change(&FieldEvent::from(EventTarget::named(name).value(value)))?;
    form.handle_blur(&FieldEvent::from(EventTarget::named(name)))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = FormConfig::new(
        json!({ "username": "", "email": "", "password": "", "confirm": "" }),
        |values, _form| async move {
            log::info!("submitting {values}");
            println!("signed up: {values}");
            Ok(())
        },
    )
    .validation_schema(SignupSchema);
    let form = Form::new(config);
    form.mount();

    let _errors = form.subscribe(
        |s: &FormState| s.errors.clone(),
        |a: &Value, b: &Value| a == b,
        false,
        |errors: &Value| println!("errors: {errors}"),
    );

    let username = form.use_field(FieldConfig::new("username").validate(username_available()))?;
    let trim = |value: &Value, _: &str| Value::from(value.as_str().unwrap_or("").trim());
    let email = form.use_field(FieldConfig::new("email").parse(trim))?;

    username.handle_change(&FieldEvent::from(EventTarget::default().value("admin")));
    username.handle_blur();
    email.handle_change(&FieldEvent::from(EventTarget::default().value("  ada@example.org ")));
    email.handle_blur();
    type_into(&form, "password", "hunter2")?;
    type_into(&form, "confirm", "hunter2")?;
    form.run_pending();

    match pollster::block_on(form.submit_form())? {
        Submission::Submitted => println!("unexpected: invalid form was submitted"),
        Submission::Invalid(errors) => println!("first attempt rejected: {errors}"),
    }

    username.set_value("ada", None);
    type_into(&form, "password", "correct horse")?;
    type_into(&form, "confirm", "correct horse")?;
    form.run_pending();

    let outcome = pollster::block_on(form.submit_form())?;
    let computed = form.computed();
    println!(
        "outcome: {outcome:?}, submits: {}, dirty: {}, valid: {}",
        form.state().submit_count,
        computed.dirty,
        computed.is_valid
    );

    pollster::block_on(form.handle_reset())?;
    println!("after reset: {}", form.values());
    Ok(())
}
