//! # Switchboard - ordered pattern matching and change observation
//!
//! Switchboard is a small in-process runtime built around one behavioral
//! contract: *cases are tried in declaration order and the first match wins*.
//! A few supporting utilities are exercised by the same runtime.
//!
//! ## Core Concepts
//!
//! - **Predicate**: a typed pattern (literal, range, tag, guard, regex, composite)
//! - **MatchEngine**: ordered predicate + guard + action cases with an optional default
//! - **Curried dispatch**: unbound operations bound to a subject, called later
//! - **ObservableCell**: a value with before/after change callbacks and watch streams
//! - **DefaultingAccessor**: fallback reads and atomic increment-or-insert
//!
//! ## Usage
//!
//! ```rust
//! use switchboard::{MatchEngine, Predicate};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Gender { Male, Female }
//!
//! struct Person { age: u32, gender: Gender }
//!
//! let mut greet = MatchEngine::new();
//! greet.add_case(Predicate::tag(Gender::Male, |p: &Person| p.gender), |_| "Hi, man!")?;
//! greet.add_case(Predicate::tag(Gender::Female, |p: &Person| p.gender), |_| "Hi, gorgeous!")?;
//! greet.seal();
//!
//! let me = Person { age: 28, gender: Gender::Male };
//! assert_eq!(greet.evaluate(&me)?, "Hi, man!");
//! # Ok::<(), switchboard::SwitchError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accessor;
pub mod cell;
pub mod config;
pub mod curry;
pub mod engine;
pub mod error;
pub mod predicate;

// Re-export primary types at crate root for convenience
pub use accessor::{DefaultingAccessor, DefaultingMapExt, InMemoryAccessor};
pub use cell::{ChangeEvent, ChangePhase, ChangeStream, ObservableCell, ObserverId};
pub use config::{CellConfig, EngineConfig};
pub use curry::{Bound, SharedBound, Unbound};
pub use engine::{Case, MatchEngine, MatchOutcome};
pub use error::{ExecutionError, ObserverError, SwitchError, SwitchResult, ValidationError};
pub use predicate::{Predicate, PredicateKind};
