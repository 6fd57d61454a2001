use std::any::Any;
use std::future::{self, Future};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use super::path::{FieldPath, resolve_get};
use super::store::{FormError, FormResult, FormStore, read_lock, write_lock};

/// The error a validator reports for a field value.
///
/// Carries a display message and, optionally, whatever structured data the
/// validator wants the UI layer to see (limits, offending characters, ...).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationFailure {
    message: String,
    data: Option<Value>,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Fails with `message` unless `condition` holds.
    pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), Self> {
        if condition {
            Ok(())
        } else {
            Err(Self::new(message))
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "validator panicked".to_owned()
        };
        Self::new(message)
    }
}

impl From<&str> for ValidationFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ValidationFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub type BoxedValidationFuture =
    Pin<Box<dyn Future<Output = Result<(), ValidationFailure>> + Send + 'static>>;

type ValidatorFn = Arc<dyn Fn(Value) -> BoxedValidationFuture + Send + Sync>;

/// A field validator with its sync or async flavour erased.
///
/// The validator receives a copy of the field's current value, or
/// `Value::Null` when the field is absent.
#[derive(Clone)]
pub struct Validator(ValidatorFn);

impl Validator {
    pub fn sync<F>(validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ValidationFailure> + Send + Sync + 'static,
    {
        Self(Arc::new(move |value: Value| -> BoxedValidationFuture {
            Box::pin(future::ready(validator(&value)))
        }))
    }

    pub fn future<F, Fut>(validator: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ValidationFailure>> + Send + 'static,
    {
        Self(Arc::new(move |value: Value| -> BoxedValidationFuture {
            Box::pin(validator(value))
        }))
    }

    /// Runs the validator, turning a panic at any point into a failure.
    pub(super) async fn run(&self, value: Value) -> Result<(), ValidationFailure> {
        let pending = match panic::catch_unwind(AssertUnwindSafe(|| (self.0)(value))) {
            Ok(pending) => pending,
            Err(payload) => return Err(ValidationFailure::from_panic(payload)),
        };
        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(ValidationFailure::from_panic(payload)),
        }
    }
}

/// Validators to install on a store, keyed by field path.
///
/// Order of registration is the order `FormStore::validate` runs them in.
/// Registering a path twice replaces the earlier validator in place.
#[derive(Clone, Default)]
pub struct Validators {
    entries: Vec<(String, Validator)>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<F>(self, path: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ValidationFailure> + Send + Sync + 'static,
    {
        self.with(path, Validator::sync(validator))
    }

    pub fn field_async<F, Fut>(self, path: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ValidationFailure>> + Send + 'static,
    {
        self.with(path, Validator::future(validator))
    }

    pub fn with(mut self, path: impl Into<String>, validator: Validator) -> Self {
        self.entries.push((path.into(), validator));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(super) fn resolve(self) -> FormResult<ValidatorMap> {
        let mut resolved: Vec<(FieldPath, Validator)> = Vec::with_capacity(self.entries.len());
        for (raw, validator) in self.entries {
            let path = FieldPath::parse(&raw)?;
            if path.is_root() {
                return Err(FormError::EmptyPath);
            }
            match resolved.iter_mut().find(|(existing, _)| *existing == path) {
                Some(slot) => slot.1 = validator,
                None => resolved.push((path, validator)),
            }
        }
        Ok(ValidatorMap(resolved))
    }
}

#[derive(Default)]
pub(super) struct ValidatorMap(Vec<(FieldPath, Validator)>);

impl ValidatorMap {
    fn get(&self, path: &FieldPath) -> Option<&Validator> {
        self.0
            .iter()
            .find_map(|(key, validator)| (key == path).then_some(validator))
    }

    pub(super) fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.iter().map(|(path, _)| path)
    }
}

impl FormStore {
    /// Runs every validator in registration order, stopping at the first
    /// failure.
    pub async fn validate(&self) -> FormResult<()> {
        let targets = self.validators.0.clone();
        self.run_validators(targets).await
    }

    /// Runs the validator registered for `path`. A path without a validator
    /// passes.
    pub async fn validate_field(&self, path: &str) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        self.validate_path(&path).await
    }

    pub(super) async fn validate_path(&self, path: &FieldPath) -> FormResult<()> {
        let targets = self
            .validators
            .get(path)
            .map(|validator| vec![(path.clone(), validator.clone())])
            .unwrap_or_default();
        self.run_validators(targets).await
    }

    /// Runs the validators for `paths` in the given order, stopping at the
    /// first failure. Paths without a validator are skipped.
    pub async fn validate_fields<I, S>(&self, paths: I) -> FormResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut targets = Vec::new();
        for raw in paths {
            let path = FieldPath::parse(raw.as_ref())?;
            if let Some(validator) = self.validators.get(&path) {
                targets.push((path, validator.clone()));
            }
        }
        self.run_validators(targets).await
    }

    async fn run_validators(&self, targets: Vec<(FieldPath, Validator)>) -> FormResult<()> {
        for (path, validator) in targets {
            let value = {
                let state = read_lock(&self.state, "reading value for validation")?;
                resolve_get(&state.values, &path)
                    .cloned()
                    .unwrap_or(Value::Null)
            };

            let key = path.to_string();
            match validator.run(value).await {
                Ok(()) => {
                    let cleared = write_lock(&self.state, "clearing field error")?
                        .errors
                        .clear_entry(&key);
                    debug!(path = %key, cleared, "field validation passed");
                }
                Err(failure) => {
                    write_lock(&self.state, "recording field error")?
                        .errors
                        .record(key.clone(), failure.clone());
                    debug!(path = %key, error = %failure, "field validation failed");
                    return Err(FormError::Validation(failure));
                }
            }
        }
        Ok(())
    }
}
