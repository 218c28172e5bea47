//! Object model, capability predicates, access levels and error definitions.
//!
//! Foundation crate -- no I/O, no logging.

pub mod error;
pub mod object;
pub mod predicates;
pub mod types;

pub use error::{WardError, WardResult};
pub use object::{Method, Obj, Value};
pub use types::{key_set, Access, ClassId, KeySet, PropertyKey};
