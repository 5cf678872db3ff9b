//! Handler parameter binding.
//!
//! # Data Flow
//! ```text
//! ParameterDescriptor list (declared per route)
//!     → binder.rs (startup: one handler per parameter → BindingPlan)
//!
//! Per request:
//!     → upload.rs (form body parsed once, when the plan needs it)
//!     → binder.rs (resolve each parameter)
//!         → convert.rs (string → int64 / float64 / bool)
//!         → validate.rs (NotBlank, NotNull, Min, Email)
//!     → args.rs (Arguments handed to the handler)
//! ```

pub mod args;
pub mod binder;
pub mod convert;
pub mod descriptor;
pub mod upload;
pub mod validate;

pub use args::{ArgValue, Arguments};
pub use binder::{BindInput, BindingPlan, ParameterBinder, ParameterHandler};
pub use descriptor::{BodyDecoder, ParamSource, ParamType, ParameterDescriptor};
pub use upload::{FilePart, FileUploadSpec, FormData, UploadOutcome, UploadRegistry, UploadedFile};
pub use validate::{Constraint, Validate, ValidationReport};
