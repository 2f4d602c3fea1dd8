//! Drive an embedded Octave-language interpreter with native values.
//!
//! An [`Octave`] owns a complete interpreter: a frame stack, a global
//! table, user and host functions, and a load path of `.m` files.  The
//! bridge layer sits on top of it:
//!
//! - [`marshal`] converts between interpreter [`Value`]s and host
//!   [`HostValue`]s;
//! - [`Octave::locals`] and [`Octave::globals`] expose the variable tables
//!   as mappings ([`workspace`]);
//! - [`Octave::local_scope`] and [`scope::local_scope`] give host code a
//!   private frame ([`scope`]);
//! - [`Octave::eval`], [`Octave::feval`] and [`Octave::register_function`]
//!   call across the boundary in both directions ([`invoke`]);
//! - [`runtime`] keeps one shared instance for hosts that need it.
//!
//! ```
//! use octbridge::{HostValue, Octave};
//!
//! let mut oct = Octave::new();
//! oct.locals().set("x", HostValue::list([1.0, 2.0, 3.0]))?;
//! let total = oct.eval(1, "sum(x .^ 2)")?;
//! assert_eq!(total[0].as_f64(), Some(14.0));
//! # Ok::<(), octbridge::BridgeError>(())
//! ```

pub mod array;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod interp;
pub mod invoke;
pub mod marshal;
pub mod runtime;
pub mod scope;
pub mod typetag;
pub mod value;
pub mod workspace;

#[cfg(feature = "python")]
pub mod python;

pub use array::{Buffer, Complex, Complex32, Complex64, NdArray, Number};
pub use error::{BridgeError, ErrorKind};
pub use host::{HostDict, HostValue};
pub use interp::{Octave, ParseError, RuntimeError};
pub use scope::LocalScope;
pub use typetag::{ElemType, TypeTag};
pub use value::{CellArray, StructValue, Value};
pub use workspace::{Scope, Workspace};
