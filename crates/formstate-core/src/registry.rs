//! Mounted fields and their per-field validators.

use std::collections::BTreeMap;

use crate::error::{FormError, FormResult};
use crate::path::Path;
use crate::validation::FieldValidator;

#[derive(Clone)]
pub struct FieldDescriptor {
    pub path: Path,
    pub validate: Option<FieldValidator>,
    /// Number of live bindings for this path.
    pub mount_count: usize,
}

/// Keyed by the canonical path spelling, so `a.b[0]` and `a['b'].0` share
/// one entry.
#[derive(Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field or refreshes an existing one. A later registration
    /// replaces the validator of an earlier one.
    pub fn register(&mut self, path: &Path, validate: Option<FieldValidator>) -> FormResult<()> {
        if path.is_empty() {
            return Err(FormError::Usage("cannot register a field at the root path".into()));
        }
        let entry = self
            .fields
            .entry(path.to_string())
            .or_insert_with(|| FieldDescriptor {
                path: path.clone(),
                validate: None,
                mount_count: 0,
            });
        entry.validate = validate;
        entry.mount_count += 1;
        log::debug!("registered field '{}' (mounted {}x)", path, entry.mount_count);
        Ok(())
    }

    /// Drops one mount of the field; the entry goes away with its last one.
    /// Returns false when the path was never registered.
    pub fn unregister(&mut self, path: &Path) -> bool {
        let key = path.to_string();
        let Some(entry) = self.fields.get_mut(&key) else {
            log::warn!("unregister of unknown field '{key}'");
            return false;
        };
        entry.mount_count = entry.mount_count.saturating_sub(1);
        if entry.mount_count == 0 {
            self.fields.remove(&key);
            log::debug!("unregistered field '{key}'");
        }
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.fields.contains_key(&path.to_string())
    }

    pub fn validator(&self, path: &Path) -> Option<FieldValidator> {
        self.fields
            .get(&path.to_string())
            .and_then(|field| field.validate.clone())
    }

    pub fn mount_count(&self, path: &Path) -> usize {
        self.fields
            .get(&path.to_string())
            .map_or(0, |field| field.mount_count)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.fields.values().map(|field| &field.path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields that carry a validator, in canonical path order.
    pub fn validators(&self) -> Vec<(Path, FieldValidator)> {
        self.fields
            .values()
            .filter_map(|field| Some((field.path.clone(), field.validate.clone()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::field_validator;
    use crate::value::Value;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_equivalent_spellings_share_one_entry() {
        let mut reg = FieldRegistry::new();
        reg.register(&p("users[0].name"), None).unwrap();
        reg.register(&p("users.0['name']"), None).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.mount_count(&p("users[0].name")), 2);
    }

    #[test]
    fn test_last_validator_wins() {
        let mut reg = FieldRegistry::new();
        reg.register(&p("name"), Some(field_validator(|_| Some("first".into()))))
            .unwrap();
        reg.register(&p("name"), Some(field_validator(|_| Some("second".into()))))
            .unwrap();

        let validate = reg.validator(&p("name")).unwrap();
        let msg = pollster::block_on(validate(&Value::Null)).unwrap();
        assert_eq!(msg.as_deref(), Some("second"));
    }

    #[test]
    fn test_unregister_counts_down_mounts() {
        let mut reg = FieldRegistry::new();
        reg.register(&p("email"), None).unwrap();
        reg.register(&p("email"), None).unwrap();

        assert!(reg.unregister(&p("email")));
        assert!(reg.contains(&p("email")));
        assert!(reg.unregister(&p("email")));
        assert!(!reg.contains(&p("email")));
        assert!(!reg.unregister(&p("email")));
    }

    #[test]
    fn test_root_path_is_rejected() {
        let mut reg = FieldRegistry::new();
        assert!(matches!(
            reg.register(&Path::root(), None),
            Err(FormError::Usage(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_validators_skip_plain_fields() {
        let mut reg = FieldRegistry::new();
        reg.register(&p("b"), Some(field_validator(|_| None))).unwrap();
        reg.register(&p("a"), None).unwrap();
        reg.register(&p("c"), Some(field_validator(|_| None))).unwrap();

        let paths: Vec<String> = reg.validators().iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, ["b", "c"]);
        assert_eq!(reg.paths().count(), 3);
    }
}
