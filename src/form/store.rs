use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::errors::ErrorTree;
use super::path::{FieldPath, resolve_get, resolve_set};
use super::subscription::SubscriberRegistry;
use super::validation::{ValidationFailure, ValidatorMap, Validators};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid field path `{0}`: segments must be non-empty")]
    InvalidPath(String),
    #[error("the root path cannot be assigned, use `set_all` instead")]
    EmptyPath,
    #[error("cannot set `{path}`: `{segment}` holds a value, not a mapping")]
    NotAMapping { path: String, segment: String },
    #[error("default values must be an object, got {0}")]
    InvalidDefaults(&'static str),
    #[error(transparent)]
    Validation(ValidationFailure),
}

impl FormError {
    /// The validator failure carried by this error, if it is one.
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            FormError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type FormResult<T> = Result<T, FormError>;

pub type BoxedFormFuture = Pin<Box<dyn Future<Output = FormResult<()>> + Send + 'static>>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FormOptions {
    /// Notify subscribers once per top-level key touched by `reset`.
    pub notify_on_reset: bool,
}

pub(super) struct FormState {
    pub(super) values: Map<String, Value>,
    pub(super) errors: ErrorTree,
}

/// Form values, field errors, validators and change subscribers.
///
/// Clones share the same state. Reads hand out deep copies, so the only way
/// to change a value is through `set`, which is what keeps subscribers
/// informed.
#[derive(Clone)]
pub struct FormStore {
    pub(super) options: FormOptions,
    pub(super) defaults: Arc<Map<String, Value>>,
    pub(super) validators: Arc<ValidatorMap>,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) subscribers: Arc<RwLock<SubscriberRegistry>>,
}

impl Default for FormStore {
    fn default() -> Self {
        Self::from_parts(Map::new(), ValidatorMap::default(), FormOptions::default())
    }
}

impl FormStore {
    /// Builds a store from default values and validators.
    ///
    /// `defaults` must be an object or `Value::Null` (no defaults).
    pub fn new(defaults: Value, validators: Validators) -> FormResult<Self> {
        Self::with_options(defaults, validators, FormOptions::default())
    }

    pub fn with_options(
        defaults: Value,
        validators: Validators,
        options: FormOptions,
    ) -> FormResult<Self> {
        let defaults = match defaults {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            Value::Array(_) => return Err(FormError::InvalidDefaults("an array")),
            _ => return Err(FormError::InvalidDefaults("a scalar")),
        };
        Ok(Self::from_parts(defaults, validators.resolve()?, options))
    }

    fn from_parts(
        defaults: Map<String, Value>,
        validators: ValidatorMap,
        options: FormOptions,
    ) -> Self {
        Self {
            options,
            state: Arc::new(RwLock::new(FormState {
                values: defaults.clone(),
                errors: ErrorTree::default(),
            })),
            defaults: Arc::new(defaults),
            validators: Arc::new(validators),
            subscribers: Arc::new(RwLock::new(SubscriberRegistry::default())),
        }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn defaults(&self) -> Map<String, Value> {
        self.defaults.as_ref().clone()
    }

    /// Paths that have a validator, in the order `validate` runs them.
    pub fn validated_fields(&self) -> Vec<String> {
        self.validators.paths().map(FieldPath::to_string).collect()
    }

    pub fn get(&self) -> FormResult<Map<String, Value>> {
        Ok(read_lock(&self.state, "reading form values")?.values.clone())
    }

    /// Value at `path`, or `None` when any segment is missing. The empty
    /// path returns the whole tree.
    pub fn get_path(&self, path: &str) -> FormResult<Option<Value>> {
        let path = FieldPath::parse(path)?;
        let state = read_lock(&self.state, "reading field value")?;
        if path.is_root() {
            return Ok(Some(Value::Object(state.values.clone())));
        }
        Ok(resolve_get(&state.values, &path).cloned())
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        self.write_value(&path, value.into())?;
        self.notify(&path)
    }

    /// Like [`FormStore::set`], optionally followed by validating the field.
    ///
    /// The write and the subscriber notifications happen before this
    /// returns. Only the validation waits for the returned future to be
    /// polled; a write failure is reported when it is.
    pub fn set_async<V>(&self, path: &str, value: V, validate: bool) -> BoxedFormFuture
    where
        V: Into<Value>,
    {
        let committed = FieldPath::parse(path).and_then(|path| {
            self.write_value(&path, value.into())?;
            self.notify(&path)?;
            Ok(path)
        });
        let store = self.clone();
        Box::pin(async move {
            let path = committed?;
            if validate {
                store.validate_path(&path).await?;
            }
            Ok(())
        })
    }

    /// Sets every key of `values` in order, notifying once per key.
    ///
    /// Every key is parsed before anything is written, so a malformed key
    /// leaves the tree untouched. A key that would write through a scalar
    /// stops the loop there; earlier keys stay committed.
    pub fn set_all(&self, values: Map<String, Value>) -> FormResult<()> {
        let entries = values
            .into_iter()
            .map(|(key, value)| {
                let path = FieldPath::parse(&key)?;
                if path.is_root() {
                    return Err(FormError::EmptyPath);
                }
                Ok((path, value))
            })
            .collect::<FormResult<Vec<_>>>()?;
        for (path, value) in entries {
            self.write_value(&path, value)?;
            self.notify(&path)?;
        }
        Ok(())
    }

    /// Restores the default values and drops every recorded error.
    pub fn reset(&self) -> FormResult<()> {
        let touched = {
            let mut state = write_lock(&self.state, "resetting form")?;
            let mut touched = state.values.keys().cloned().collect::<BTreeSet<_>>();
            touched.extend(self.defaults.keys().cloned());
            state.values = self.defaults.as_ref().clone();
            state.errors.clear();
            touched
        };
        debug!(fields = touched.len(), "form reset to defaults");

        if self.options.notify_on_reset {
            for key in touched {
                self.notify(&FieldPath::key(key))?;
            }
        }
        Ok(())
    }

    /// Error recorded for `path`. A malformed path can never hold an error,
    /// so it reads as `None` like any other absent entry.
    pub fn error(&self, path: &str) -> FormResult<Option<ValidationFailure>> {
        let Ok(path) = FieldPath::parse(path) else {
            return Ok(None);
        };
        let key = path.to_string();
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(&key)
            .cloned())
    }

    /// Error at `index` in first-recorded order. Slots whose error was
    /// cleared by a later successful validation read as `None`.
    pub fn error_at(&self, index: usize) -> FormResult<Option<ValidationFailure>> {
        Ok(read_lock(&self.state, "reading field error by index")?
            .errors
            .get_index(index)
            .cloned())
    }

    pub fn errors(&self) -> FormResult<IndexMap<String, ValidationFailure>> {
        Ok(read_lock(&self.state, "reading field errors")?.errors.present())
    }

    pub fn set_error(&self, path: &str, failure: impl Into<ValidationFailure>) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        if path.is_root() {
            return Err(FormError::EmptyPath);
        }
        write_lock(&self.state, "recording field error")?
            .errors
            .record(path.to_string(), failure.into());
        Ok(())
    }

    /// Clears the error for `path`. Returns whether there was one.
    pub fn clear_error(&self, path: &str) -> FormResult<bool> {
        let Ok(path) = FieldPath::parse(path) else {
            return Ok(false);
        };
        let key = path.to_string();
        Ok(write_lock(&self.state, "clearing field error")?
            .errors
            .clear_entry(&key))
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(!read_lock(&self.state, "checking form validity")?
            .errors
            .has_errors())
    }

    fn write_value(&self, path: &FieldPath, value: Value) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing field value")?;
        let previous = resolve_set(&mut state.values, path, value)?;
        trace!(path = %path, replaced = previous.is_some(), "field value set");
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
