//! Type-erased functional options (C3): closures that mutate a
//! callee-owned configuration target, applied by the callee.
//!
//! The Executable Contract (C4) can't statically know every
//! component's configuration schema, so an [`Option`] closes over the
//! concrete target type and is applied through `dyn Any`. A target an
//! option doesn't recognise is left untouched rather than rejected.

use std::any::Any;
use std::sync::Arc;

type ApplyFn = dyn Fn(&mut dyn Any) + Send + Sync;

/// A single functional option: a closure applied to a configuration
/// target of the callee's choosing.
///
/// Cloneable so the same option list can be reused across multiple
/// calls (e.g. composed Executables forwarding options unchanged to
/// every child).
#[derive(Clone)]
pub struct Option_(Arc<ApplyFn>);

impl Option_ {
    /// Build an option that mutates targets of a specific concrete
    /// type `T`, silently doing nothing for any other target type.
    pub fn new<T: 'static>(apply: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        Self(Arc::new(move |target: &mut dyn Any| {
            if let Some(typed) = target.downcast_mut::<T>() {
                apply(typed);
            }
        }))
    }

    /// Apply this option to a target. A no-op if the target's
    /// concrete type doesn't match what the option was built for.
    pub fn apply_to(&self, target: &mut dyn Any) {
        (self.0)(target);
    }
}

impl std::fmt::Debug for Option_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Option_(..)")
    }
}

/// Apply a list of options to a target in order; later options
/// override earlier ones when they target the same field.
pub fn apply_all<T: 'static>(options: &[Option_], target: &mut T) {
    for option in options {
        option.apply_to(target);
    }
}
