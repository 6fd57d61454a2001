pub mod form;

pub use form::{
    BoxedFormFuture, FieldPath, FormError, FormOptions, FormResult, FormStore, SubscriptionId,
    ValidationFailure, Validator, Validators,
};
