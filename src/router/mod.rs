//! # Router
//!
//! Maps `(path, method)` to a handler. Paths are matched exactly; the panel
//! has no path parameters, everything variable travels in the arguments.
//! See [`RouteTable`] for the precedence between method-specific and
//! method-agnostic registrations of the same path.

mod core;
#[cfg(test)]
mod tests;

pub use self::core::{MethodFilter, Route, RouteTable};
