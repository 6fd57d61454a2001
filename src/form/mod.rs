mod errors;
mod path;
mod store;
mod subscription;
mod validation;


pub use path::{FieldPath, resolve_get, resolve_set};
pub use store::{BoxedFormFuture, FormError, FormOptions, FormResult, FormStore};
pub use subscription::SubscriptionId;
pub use validation::{BoxedValidationFuture, ValidationFailure, Validator, Validators};
