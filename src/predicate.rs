//! Predicates: typed "does this pattern match this subject" tests.
//!
//! A [`Predicate`] is built once per case clause and is immutable after
//! construction. Payload problems that the type system cannot rule out
//! (inverted or incomparable range bounds, malformed regular expressions)
//! are reported by the constructor, so [`Predicate::test`] itself never fails.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The kind of comparison a predicate performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    /// Subject equals a fixed value.
    Literal,
    /// An extracted field lies within inclusive bounds.
    Range,
    /// An extracted tag equals a fixed tag.
    EnumTag,
    /// Arbitrary boolean logic.
    Guard,
    /// Logical combination of child predicates.
    Composite,
    /// An extracted string matches a regular expression.
    Regex,
    /// Matches every subject.
    Wildcard,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Range => write!(f, "range"),
            Self::EnumTag => write!(f, "enum_tag"),
            Self::Guard => write!(f, "guard"),
            Self::Composite => write!(f, "composite"),
            Self::Regex => write!(f, "regex"),
            Self::Wildcard => write!(f, "wildcard"),
        }
    }
}

type TestFn<S> = dyn Fn(&S) -> bool + Send + Sync;

/// A typed pattern over subjects of type `S`.
///
/// # Examples
///
/// ```
/// use switchboard::Predicate;
///
/// let small = Predicate::range(0, 5).unwrap();
/// assert!(small.test(&0));
/// assert!(small.test(&5));
/// assert!(!small.test(&6));
///
/// let odd_or_zero = Predicate::guard(|n: &i32| n % 2 != 0).or(Predicate::literal(0));
/// assert!(odd_or_zero.test(&0));
/// assert!(!odd_or_zero.test(&4));
/// ```
pub struct Predicate<S> {
    kind: PredicateKind,
    description: Option<String>,
    test: Arc<TestFn<S>>,
}

impl<S> Clone for Predicate<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            description: self.description.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<S> fmt::Debug for Predicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn check_bounds<K: PartialOrd>(lower: &K, upper: &K) -> Result<(), ValidationError> {
    match lower.partial_cmp(upper) {
        Some(Ordering::Less | Ordering::Equal) => Ok(()),
        Some(Ordering::Greater) => Err(ValidationError::invalid_payload(
            PredicateKind::Range,
            "lower bound exceeds upper bound",
        )),
        None => Err(ValidationError::invalid_payload(
            PredicateKind::Range,
            "bounds are not comparable",
        )),
    }
}

impl<S: 'static> Predicate<S> {
    fn from_fn(kind: PredicateKind, test: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        Self {
            kind,
            description: None,
            test: Arc::new(test),
        }
    }

    /// Matches subjects equal to `value`.
    #[must_use]
    pub fn literal(value: S) -> Self
    where
        S: PartialEq + Send + Sync,
    {
        Self::from_fn(PredicateKind::Literal, move |s| *s == value)
    }

    /// Matches subjects within `lower..=upper`.
    ///
    /// Returns `ValidationError::InvalidPayload` if `lower > upper` or the
    /// bounds are incomparable (for example a NaN bound).
    pub fn range(lower: S, upper: S) -> Result<Self, ValidationError>
    where
        S: PartialOrd + Send + Sync,
    {
        check_bounds(&lower, &upper)?;
        Ok(Self::from_fn(PredicateKind::Range, move |s| {
            lower <= *s && *s <= upper
        }))
    }

    /// Matches subjects whose extracted field lies within `lower..=upper`.
    pub fn range_by<K, F>(lower: K, upper: K, extract: F) -> Result<Self, ValidationError>
    where
        K: PartialOrd + Send + Sync + 'static,
        F: Fn(&S) -> K + Send + Sync + 'static,
    {
        check_bounds(&lower, &upper)?;
        Ok(Self::from_fn(PredicateKind::Range, move |s| {
            let field = extract(s);
            lower <= field && field <= upper
        }))
    }

    /// Matches subjects whose extracted tag equals `tag`.
    #[must_use]
    pub fn tag<T, F>(tag: T, extract: F) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self::from_fn(PredicateKind::EnumTag, move |s| extract(s) == tag)
    }

    /// Matches subjects for which `f` returns true.
    #[must_use]
    pub fn guard<F>(f: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self::from_fn(PredicateKind::Guard, f)
    }

    /// Matches every subject.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::from_fn(PredicateKind::Wildcard, |_| true)
    }

    /// Matches subjects whose extracted text matches `pattern`.
    ///
    /// Returns `ValidationError::InvalidPayload` if `pattern` does not compile.
    pub fn regex_by<F>(pattern: &str, extract: F) -> Result<Self, ValidationError>
    where
        F: Fn(&S) -> &str + Send + Sync + 'static,
    {
        let re = Regex::new(pattern)
            .map_err(|e| ValidationError::invalid_payload(PredicateKind::Regex, e.to_string()))?;
        Ok(Self::from_fn(PredicateKind::Regex, move |s| re.is_match(extract(s))))
    }

    /// Matches textual subjects against `pattern`.
    pub fn regex(pattern: &str) -> Result<Self, ValidationError>
    where
        S: AsRef<str>,
    {
        Self::regex_by(pattern, <S as AsRef<str>>::as_ref)
    }

    /// Both predicates must match. `other` is only tested when `self` matches.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let description = compose_description(&self, "and", &other);
        let (a, b) = (self.test, other.test);
        Self {
            kind: PredicateKind::Composite,
            description,
            test: Arc::new(move |s: &S| a(s) && b(s)),
        }
    }

    /// Either predicate must match. `other` is only tested when `self` does not.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let description = compose_description(&self, "or", &other);
        let (a, b) = (self.test, other.test);
        Self {
            kind: PredicateKind::Composite,
            description,
            test: Arc::new(move |s: &S| a(s) || b(s)),
        }
    }

    /// Inverts the predicate.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let description = self.description.as_ref().map(|d| format!("not {d}"));
        let inner = self.test;
        Self {
            kind: PredicateKind::Composite,
            description,
            test: Arc::new(move |s: &S| !inner(s)),
        }
    }
}

fn compose_description<S>(a: &Predicate<S>, op: &str, b: &Predicate<S>) -> Option<String> {
    match (&a.description, &b.description) {
        (Some(a), Some(b)) => Some(format!("({a} {op} {b})")),
        _ => None,
    }
}

impl<S> Predicate<S> {
    /// Attaches a human-readable description used in diagnostics.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The kind of this predicate.
    #[must_use]
    pub const fn kind(&self) -> PredicateKind {
        self.kind
    }

    /// The description, if one was attached.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tests the subject. Never fails.
    #[must_use]
    pub fn test(&self, subject: &S) -> bool {
        (self.test)(subject)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Shape {
        Circle,
        Square,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Part {
        name: String,
        size: u32,
        shape: Shape,
    }

    fn part(name: &str, size: u32, shape: Shape) -> Part {
        Part {
            name: name.to_string(),
            size,
            shape,
        }
    }

    #[test]
    fn test_literal_uses_subject_equality() {
        let p = Predicate::literal(part("bolt", 3, Shape::Circle));
        assert_eq!(p.kind(), PredicateKind::Literal);
        assert!(p.test(&part("bolt", 3, Shape::Circle)));
        assert!(!p.test(&part("bolt", 4, Shape::Circle)));
    }

    #[test]
    fn test_range_is_inclusive() {
        let p = Predicate::range(0, 5).unwrap();
        assert!(p.test(&0));
        assert!(p.test(&5));
        assert!(p.test(&3));
        assert!(!p.test(&6));
        assert!(!p.test(&-1));
    }

    #[test]
    fn test_range_single_point() {
        let p = Predicate::range(7, 7).unwrap();
        assert!(p.test(&7));
        assert!(!p.test(&8));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let err = Predicate::range(6, 5).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidPayload {
                kind: PredicateKind::Range,
                ..
            }
        ));
    }

    #[test]
    fn test_range_rejects_nan_bound() {
        assert!(Predicate::range(f64::NAN, 1.0).is_err());
        assert!(Predicate::<Part>::range_by(0.0, f64::NAN, |p| f64::from(p.size)).is_err());
    }

    #[test]
    fn test_range_by_extracts_field() {
        let p = Predicate::range_by(0u32, 18, |p: &Part| p.size).unwrap();
        assert!(p.test(&part("washer", 18, Shape::Circle)));
        assert!(!p.test(&part("plate", 19, Shape::Square)));
    }

    #[test]
    fn test_tag_compares_extracted_tag() {
        let p = Predicate::tag(Shape::Square, |p: &Part| p.shape);
        assert_eq!(p.kind(), PredicateKind::EnumTag);
        assert!(p.test(&part("plate", 2, Shape::Square)));
        assert!(!p.test(&part("nut", 2, Shape::Circle)));
    }

    #[test]
    fn test_regex_by_matches_text_field() {
        let p = Predicate::regex_by(r"^b\w+t$", |p: &Part| p.name.as_str()).unwrap();
        assert!(p.test(&part("bolt", 1, Shape::Circle)));
        assert!(!p.test(&part("nut", 1, Shape::Circle)));
    }

    #[test]
    fn test_regex_rejects_bad_pattern() {
        let err = Predicate::<String>::regex("(unclosed").unwrap_err();
        assert!(err.to_string().contains("regex"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let p = Predicate::<Part>::wildcard();
        assert!(p.test(&part("anything", 0, Shape::Square)));
    }

    #[test]
    fn test_composite_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counted = Predicate::guard(move |_: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let p = Predicate::literal(1).and(counted);
        assert_eq!(p.kind(), PredicateKind::Composite);

        assert!(!p.test(&2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(p.test(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_composite_or_and_not() {
        let edge = Predicate::literal(0).or(Predicate::literal(10));
        assert!(edge.test(&0));
        assert!(edge.test(&10));
        assert!(!edge.test(&5));

        let inner = edge.not();
        assert!(inner.test(&5));
        assert!(!inner.test(&10));
    }

    #[test]
    fn test_descriptions_compose() {
        let p = Predicate::literal(1)
            .describe("one")
            .or(Predicate::literal(2).describe("two"));
        assert_eq!(p.description(), Some("(one or two)"));
        assert_eq!(p.not().description(), Some("not (one or two)"));

        let undescribed = Predicate::literal(1).and(Predicate::literal(2).describe("two"));
        assert_eq!(undescribed.description(), None);
    }

    #[test]
    fn test_clone_shares_test() {
        let p = Predicate::range(1, 3).unwrap().describe("small");
        let q = p.clone();
        assert_eq!(q.kind(), PredicateKind::Range);
        assert_eq!(q.description(), Some("small"));
        assert!(q.test(&2));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&PredicateKind::EnumTag).unwrap();
        assert_eq!(json, "\"enum_tag\"");
        let kind: PredicateKind = serde_json::from_str("\"wildcard\"").unwrap();
        assert_eq!(kind, PredicateKind::Wildcard);
    }
}
