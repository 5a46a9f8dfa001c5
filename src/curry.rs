//! Curried dispatch of unbound operations.
//!
//! [`extract`] turns an operation on a subject type (typically a `&mut self`
//! method) into an [`Unbound`] value. Binding it to a subject yields a
//! callable that takes only the remaining arguments. Several arguments are
//! passed as one tuple.
//!
//! ```
//! use switchboard::curry;
//!
//! struct Counter { hits: u32 }
//!
//! impl Counter {
//!     fn bump(&mut self, by: u32) -> u32 {
//!         self.hits += by;
//!         self.hits
//!     }
//! }
//!
//! let bump = curry::extract(Counter::bump);
//! let mut a = Counter { hits: 0 };
//! let mut b = Counter { hits: 10 };
//!
//! assert_eq!(bump.bind(&mut a).call(5), 5);
//! assert_eq!(bump.bind(&mut b).call(5), 15);
//! assert_eq!(a.hits, 5);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{ExecutionError, SwitchResult};

type MethodFn<S, A, R> = dyn Fn(&mut S, A) -> R + Send + Sync;

/// An operation on `S` that has not been bound to a subject yet.
pub struct Unbound<S, A, R> {
    method: Arc<MethodFn<S, A, R>>,
}

impl<S, A, R> Clone for Unbound<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            method: Arc::clone(&self.method),
        }
    }
}

impl<S, A, R> fmt::Debug for Unbound<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unbound").finish_non_exhaustive()
    }
}

/// Extracts `method` as an unbound operation. Nothing is invoked.
pub fn extract<S, A, R, F>(method: F) -> Unbound<S, A, R>
where
    F: Fn(&mut S, A) -> R + Send + Sync + 'static,
{
    Unbound {
        method: Arc::new(method),
    }
}

/// Binds `extracted` to `subject`. Equivalent to [`Unbound::bind`].
pub fn bind<'s, S, A, R>(extracted: &Unbound<S, A, R>, subject: &'s mut S) -> Bound<'s, S, A, R> {
    extracted.bind(subject)
}

impl<S, A, R> Unbound<S, A, R> {
    /// Calls the operation directly on `subject`.
    pub fn apply(&self, subject: &mut S, args: A) -> R {
        (self.method)(subject, args)
    }

    /// Binds the operation to a borrowed subject.
    #[must_use]
    pub fn bind<'s>(&self, subject: &'s mut S) -> Bound<'s, S, A, R> {
        Bound {
            method: Arc::clone(&self.method),
            subject,
        }
    }

    /// Binds the operation to a shared subject.
    ///
    /// The result owns its subject handle, so it can be stored, sent across
    /// threads or captured by an engine action.
    #[must_use]
    pub fn bind_shared(&self, subject: Arc<Mutex<S>>) -> SharedBound<S, A, R> {
        SharedBound {
            method: Arc::clone(&self.method),
            subject,
        }
    }
}

/// An operation bound to a borrowed subject.
pub struct Bound<'s, S, A, R> {
    method: Arc<MethodFn<S, A, R>>,
    subject: &'s mut S,
}

impl<'s, S, A, R> Bound<'s, S, A, R> {
    /// Invokes the operation on the bound subject.
    pub fn call(&mut self, args: A) -> R {
        (self.method)(&mut *self.subject, args)
    }

    /// The bound subject.
    #[must_use]
    pub fn subject(&self) -> &S {
        &*self.subject
    }

    /// Converts the binding into a plain closure.
    pub fn into_fn(mut self) -> impl FnMut(A) -> R + 's
    where
        S: 's,
        A: 's,
        R: 's,
    {
        move |args| self.call(args)
    }
}

impl<S, A, R> fmt::Debug for Bound<'_, S, A, R>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// An operation bound to a shared, lock-protected subject.
pub struct SharedBound<S, A, R> {
    method: Arc<MethodFn<S, A, R>>,
    subject: Arc<Mutex<S>>,
}

impl<S, A, R> Clone for SharedBound<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            method: Arc::clone(&self.method),
            subject: Arc::clone(&self.subject),
        }
    }
}

impl<S, A, R> fmt::Debug for SharedBound<S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBound").finish_non_exhaustive()
    }
}

impl<S, A, R> SharedBound<S, A, R> {
    /// Locks the subject and invokes the operation on it.
    ///
    /// Returns `ExecutionError::PoisonedLock` if a previous holder of the
    /// subject lock panicked.
    pub fn call(&self, args: A) -> SwitchResult<R> {
        let mut subject = self
            .subject
            .lock()
            .map_err(|_| ExecutionError::PoisonedLock {
                context: "curry.shared_subject",
            })?;
        Ok((self.method)(&mut *subject, args))
    }

    /// The shared subject handle.
    #[must_use]
    pub const fn subject(&self) -> &Arc<Mutex<S>> {
        &self.subject
    }
}
