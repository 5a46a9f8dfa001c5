//! First-match-wins case dispatch.
//!
//! A [`MatchEngine`] holds an ordered list of cases. Evaluation scans them in
//! insertion order, tests the predicate and then the optional guard, and runs
//! the action of the first case that satisfies both. No later case is
//! considered. Cases after an always-matching case are unreachable; this is
//! not detected.
//!
//! Engines have two phases. While building, cases and a default may be
//! added. After [`MatchEngine::seal`] the case list is read-only and the
//! engine can be shared freely across threads.

use std::fmt;

use tracing::{debug, trace};

use crate::cell::ObservableCell;
use crate::config::EngineConfig;
use crate::error::{ExecutionError, SwitchResult};
use crate::predicate::Predicate;

type ActionFn<S, R> = dyn Fn(&S) -> R + Send + Sync;
type GuardFn<S> = dyn Fn(&S) -> bool + Send + Sync;

/// One predicate + guard + action triple.
pub struct Case<S, R> {
    label: Option<String>,
    predicate: Predicate<S>,
    guard: Option<Box<GuardFn<S>>>,
    action: Box<ActionFn<S, R>>,
}

impl<S, R> Case<S, R> {
    /// Creates an unguarded case.
    #[must_use]
    pub fn new<A>(predicate: Predicate<S>, action: A) -> Self
    where
        A: Fn(&S) -> R + Send + Sync + 'static,
    {
        Self {
            label: None,
            predicate,
            guard: None,
            action: Box::new(action),
        }
    }

    /// Adds a guard evaluated after the predicate matches.
    #[must_use]
    pub fn with_guard<G>(mut self, guard: G) -> Self
    where
        G: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Adds a label reported in outcomes and logs.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The case label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The case predicate.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate<S> {
        &self.predicate
    }

    /// True iff the predicate matches and the guard (if any) holds.
    #[must_use]
    pub fn matches(&self, subject: &S) -> bool {
        self.predicate.test(subject) && self.guard.as_ref().map_or(true, |g| g(subject))
    }
}

impl<S, R> fmt::Debug for Case<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("label", &self.label)
            .field("predicate", &self.predicate)
            .field("guarded", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

/// Which arm of an engine produced a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome<R> {
    /// A case matched.
    Case {
        /// Position of the case in declaration order.
        index: usize,
        /// The case label, if any.
        label: Option<String>,
        /// The action result.
        value: R,
    },
    /// No case matched and the default ran.
    Default(R),
}

impl<R> MatchOutcome<R> {
    /// The produced value.
    pub fn into_value(self) -> R {
        match self {
            Self::Case { value, .. } | Self::Default(value) => value,
        }
    }

    /// Index of the matching case, or `None` for the default.
    #[must_use]
    pub const fn case_index(&self) -> Option<usize> {
        match self {
            Self::Case { index, .. } => Some(*index),
            Self::Default(_) => None,
        }
    }
}

/// Ordered, first-match-wins dispatcher over subjects of type `S`.
///
/// # Example
/// ```
/// use switchboard::{MatchEngine, Predicate};
///
/// let mut engine = MatchEngine::new();
/// engine.add_case(Predicate::range(0, 17).unwrap(), |_: &u32| "minor").unwrap();
/// engine.add_case(Predicate::range(18, u32::MAX).unwrap(), |_: &u32| "adult").unwrap();
/// engine.seal();
///
/// assert_eq!(engine.evaluate(&28).unwrap(), "adult");
/// ```
pub struct MatchEngine<S, R> {
    config: EngineConfig,
    cases: Vec<Case<S, R>>,
    default: Option<Box<ActionFn<S, R>>>,
    sealed: bool,
}

impl<S, R> Default for MatchEngine<S, R> {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl<S, R> fmt::Debug for MatchEngine<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchEngine")
            .field("config", &self.config)
            .field("cases", &self.cases)
            .field("has_default", &self.default.is_some())
            .field("sealed", &self.sealed)
            .finish()
    }
}

impl<S, R> MatchEngine<S, R> {
    /// Creates an empty engine in the build phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty engine with explicit configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            cases: Vec::new(),
            default: None,
            sealed: false,
        }
    }

    /// The engine name from its configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether [`seal`](Self::seal) has been called.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True if there are no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// The cases in declaration order.
    #[must_use]
    pub fn cases(&self) -> &[Case<S, R>] {
        &self.cases
    }

    fn ensure_building(&self) -> SwitchResult<()> {
        if self.sealed {
            return Err(ExecutionError::EngineSealed {
                engine: self.config.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Appends a prepared case.
    ///
    /// Returns `ExecutionError::EngineSealed` after [`seal`](Self::seal).
    pub fn push_case(&mut self, case: Case<S, R>) -> SwitchResult<()> {
        self.ensure_building()?;
        self.cases.push(case);
        Ok(())
    }

    /// Appends an unguarded case.
    pub fn add_case<A>(&mut self, predicate: Predicate<S>, action: A) -> SwitchResult<()>
    where
        A: Fn(&S) -> R + Send + Sync + 'static,
    {
        self.push_case(Case::new(predicate, action))
    }

    /// Appends a case that also requires `guard` to hold.
    pub fn add_guarded_case<G, A>(
        &mut self,
        predicate: Predicate<S>,
        guard: G,
        action: A,
    ) -> SwitchResult<()>
    where
        G: Fn(&S) -> bool + Send + Sync + 'static,
        A: Fn(&S) -> R + Send + Sync + 'static,
    {
        self.push_case(Case::new(predicate, action).with_guard(guard))
    }

    /// Appends a guarded case carrying a label reported by
    /// [`evaluate_outcome`](Self::evaluate_outcome).
    pub fn add_labeled_case<G, A>(
        &mut self,
        label: impl Into<String>,
        predicate: Predicate<S>,
        guard: G,
        action: A,
    ) -> SwitchResult<()>
    where
        G: Fn(&S) -> bool + Send + Sync + 'static,
        A: Fn(&S) -> R + Send + Sync + 'static,
    {
        self.push_case(
            Case::new(predicate, action)
                .with_guard(guard)
                .with_label(label),
        )
    }

    /// Registers the fallback run when no case matches. Replaces any earlier default.
    pub fn set_default<A>(&mut self, action: A) -> SwitchResult<()>
    where
        A: Fn(&S) -> R + Send + Sync + 'static,
    {
        self.ensure_building()?;
        self.default = Some(Box::new(action));
        Ok(())
    }

    /// Ends the build phase. Idempotent.
    pub fn seal(&mut self) {
        if !self.sealed {
            self.sealed = true;
            debug!(
                engine = %self.config.name,
                cases = self.cases.len(),
                has_default = self.default.is_some(),
                "match engine sealed"
            );
        }
    }

    /// Evaluates `subject` and returns the first matching action's result.
    ///
    /// Returns `ExecutionError::NoMatchingCase` when nothing matches and no
    /// default is set, and `ExecutionError::EngineNotSealed` when called
    /// during the build phase without `allow_unsealed_evaluation`.
    pub fn evaluate(&self, subject: &S) -> SwitchResult<R> {
        self.evaluate_outcome(subject).map(MatchOutcome::into_value)
    }

    /// Like [`evaluate`](Self::evaluate) but reports which arm ran.
    pub fn evaluate_outcome(&self, subject: &S) -> SwitchResult<MatchOutcome<R>> {
        if !self.sealed && !self.config.allow_unsealed_evaluation {
            return Err(ExecutionError::EngineNotSealed {
                engine: self.config.name.clone(),
            }
            .into());
        }

        for (index, case) in self.cases.iter().enumerate() {
            if !case.matches(subject) {
                continue;
            }
            trace!(engine = %self.config.name, index, label = ?case.label, "case matched");
            return Ok(MatchOutcome::Case {
                index,
                label: case.label.clone(),
                value: (case.action)(subject),
            });
        }

        if let Some(default) = &self.default {
            trace!(engine = %self.config.name, "default arm taken");
            return Ok(MatchOutcome::Default(default(subject)));
        }

        debug!(engine = %self.config.name, cases = self.cases.len(), "no case matched");
        Err(ExecutionError::NoMatchingCase {
            engine: self.config.name.clone(),
        }
        .into())
    }

    /// Evaluates the current value of `cell`.
    pub fn evaluate_cell(&self, cell: &ObservableCell<S>) -> SwitchResult<R> {
        let snapshot = cell.snapshot();
        self.evaluate(&snapshot)
    }
}
