mod entrypoint;
mod kernel;
mod weighted_validator;

pub use entrypoint::EntryPoint;
pub use kernel::{ExecuteCall, InitializeCall, KernelFactory, CreateAccountCall};
pub use weighted_validator::{RenewCall, WeightedEcdsaValidatorContract};
