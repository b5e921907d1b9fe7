//! Guard compilation.
//!
//! A rule is gated by one of four shorthand forms: nothing at all, an actor
//! attribute compared against a literal, an actor attribute tested against a
//! set of literals, or a predicate (a callable or the name of a filter).
//! All of them are compiled once, at registration, into a closed [`Guard`]
//! so that a registered rule is always evaluable.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::error::{ArgsError, RuleResult};
use crate::evaluation::Evaluation;

/// Callable guard over `(actor, subject)`.
pub type Predicate<A, S> = Arc<dyn Fn(Option<&A>, &S) -> RuleResult<bool> + Send + Sync>;

/// Wrap a closure as a [`Predicate`].
pub fn predicate<A, S, F>(f: F) -> Predicate<A, S>
where
    F: Fn(Option<&A>, &S) -> RuleResult<bool> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The value of a `pass` option.
pub enum Pass<A, S> {
    /// Called with the actor and subject.
    Callable(Predicate<A, S>),

    /// Name of a filter declared on the policy class or one of its ancestors.
    Filter(String),
}

impl<A, S> Clone for Pass<A, S> {
    fn clone(&self) -> Self {
        match self {
            Pass::Callable(predicate) => Pass::Callable(Arc::clone(predicate)),
            Pass::Filter(name) => Pass::Filter(name.clone()),
        }
    }
}

impl<A, S> fmt::Debug for Pass<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Callable(_) => f.write_str("Callable(..)"),
            Pass::Filter(name) => f.debug_tuple("Filter").field(name).finish(),
        }
    }
}

/// Guard configuration as written at a registration site.
///
/// ```
/// use seven_core::GuardOptions;
/// use serde_json::Value;
///
/// let admins: GuardOptions<Value, Value> = GuardOptions::new().check("role").equal("admin");
/// let staff: GuardOptions<Value, Value> =
///     GuardOptions::new().check("role").one_of(["reviewer", "editor"]);
/// let owners: GuardOptions<Value, Value> = GuardOptions::new().filter("owner");
/// # let _ = (admins, staff, owners);
/// ```
pub struct GuardOptions<A, S> {
    /// Actor attribute to read.
    pub check: Option<String>,

    /// Literal the attribute must equal.
    pub equal: Option<Value>,

    /// Literals the attribute must be one of.
    pub one_of: Option<Vec<Value>>,

    /// Predicate deciding the guard.
    pub pass: Option<Pass<A, S>>,
}

impl<A, S> GuardOptions<A, S> {
    /// No options: the rule always applies.
    pub fn new() -> Self {
        Self {
            check: None,
            equal: None,
            one_of: None,
            pass: None,
        }
    }

    pub fn check(mut self, attribute: impl Into<String>) -> Self {
        self.check = Some(attribute.into());
        self
    }

    pub fn equal(mut self, value: impl Into<Value>) -> Self {
        self.equal = Some(value.into());
        self
    }

    pub fn one_of<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Gate the rule on a callable over `(actor, subject)`.
    pub fn pass<F>(self, f: F) -> Self
    where
        F: Fn(Option<&A>, &S) -> RuleResult<bool> + Send + Sync + 'static,
    {
        self.pass_predicate(Arc::new(f))
    }

    pub fn pass_predicate(mut self, predicate: Predicate<A, S>) -> Self {
        self.pass = Some(Pass::Callable(predicate));
        self
    }

    /// Gate the rule on a named filter of the evaluating instance.
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.pass = Some(Pass::Filter(name.into()));
        self
    }
}

impl<A, S> Default for GuardOptions<A, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, S> Clone for GuardOptions<A, S> {
    fn clone(&self) -> Self {
        Self {
            check: self.check.clone(),
            equal: self.equal.clone(),
            one_of: self.one_of.clone(),
            pass: self.pass.clone(),
        }
    }
}

impl<A, S> fmt::Debug for GuardOptions<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardOptions")
            .field("check", &self.check)
            .field("equal", &self.equal)
            .field("one_of", &self.one_of)
            .field("pass", &self.pass)
            .finish()
    }
}

/// A compiled guard.
pub enum Guard<A, S> {
    /// Always passes.
    Always,

    /// Actor attribute equals a literal.
    Equals { attribute: String, value: Value },

    /// Actor attribute is one of a set of literals.
    OneOf { attribute: String, values: Vec<Value> },

    /// Callable over `(actor, subject)`.
    Predicate(Predicate<A, S>),

    /// Named filter, resolved on the evaluation instance.
    Filter(String),
}

impl<A, S> Guard<A, S> {
    /// Compile guard options, rejecting every ambiguous or incomplete form.
    pub fn compile(options: GuardOptions<A, S>) -> Result<Self, ArgsError> {
        let GuardOptions {
            check,
            equal,
            one_of,
            pass,
        } = options;

        match (check, pass) {
            (Some(_), Some(_)) => Err(ArgsError::ConflictingGuards),
            (Some(attribute), None) => match (equal, one_of) {
                (Some(value), None) => Ok(Guard::Equals { attribute, value }),
                (None, Some(values)) => Ok(Guard::OneOf { attribute, values }),
                (None, None) => Err(ArgsError::MissingComparison(attribute)),
                (Some(_), Some(_)) => Err(ArgsError::AmbiguousComparison(attribute)),
            },
            (None, pass) => {
                if equal.is_some() {
                    return Err(ArgsError::ComparisonWithoutCheck("equal"));
                }
                if one_of.is_some() {
                    return Err(ArgsError::ComparisonWithoutCheck("in"));
                }

                match pass {
                    None => Ok(Guard::Always),
                    Some(Pass::Callable(predicate)) => Ok(Guard::Predicate(predicate)),
                    Some(Pass::Filter(name)) if name.trim().is_empty() => {
                        Err(ArgsError::InvalidPass)
                    }
                    Some(Pass::Filter(name)) => Ok(Guard::Filter(name)),
                }
            }
        }
    }

    pub fn is_unconditional(&self) -> bool {
        matches!(self, Guard::Always)
    }

    /// The filter this guard defers to, if any.
    pub fn filter_name(&self) -> Option<&str> {
        match self {
            Guard::Filter(name) => Some(name),
            _ => None,
        }
    }
}

impl<A: Attributes, S> Guard<A, S> {
    /// Decide the guard for one evaluation.
    ///
    /// Attribute forms never fail: an absent actor, or an actor without the
    /// attribute, simply does not pass.
    pub fn passes(&self, evaluation: &Evaluation<'_, A, S>) -> RuleResult<bool> {
        match self {
            Guard::Always => Ok(true),
            Guard::Equals { attribute, value } => Ok(evaluation
                .actor_attribute(attribute)
                .is_some_and(|actual| actual == *value)),
            Guard::OneOf { attribute, values } => Ok(evaluation
                .actor_attribute(attribute)
                .is_some_and(|actual| values.contains(&actual))),
            Guard::Predicate(predicate) => predicate(evaluation.actor(), evaluation.subject()),
            Guard::Filter(name) => evaluation.filter(name),
        }
    }
}

impl<A, S> fmt::Display for Guard<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => f.write_str("always"),
            Guard::Equals { attribute, value } => write!(f, "{} == {}", attribute, value),
            Guard::OneOf { attribute, values } => {
                write!(f, "{} in {}", attribute, Value::Array(values.clone()))
            }
            Guard::Predicate(_) => f.write_str("pass <callable>"),
            Guard::Filter(name) => write!(f, "pass {}", name),
        }
    }
}

impl<A, S> fmt::Debug for Guard<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => f.write_str("Always"),
            Guard::Equals { attribute, value } => f
                .debug_struct("Equals")
                .field("attribute", attribute)
                .field("value", value)
                .finish(),
            Guard::OneOf { attribute, values } => f
                .debug_struct("OneOf")
                .field("attribute", attribute)
                .field("values", values)
                .finish(),
            Guard::Predicate(_) => f.write_str("Predicate(..)"),
            Guard::Filter(name) => f.debug_tuple("Filter").field(name).finish(),
        }
    }
}
