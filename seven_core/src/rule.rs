use std::fmt;
use std::sync::Arc;

use crate::ability::Ability;
use crate::error::RuleResult;
use crate::evaluation::Evaluation;
use crate::guard::Guard;

/// Block of logic yielding the abilities a matching rule grants.
pub type Action<A, S> = Arc<dyn Fn(&Evaluation<'_, A, S>) -> RuleResult<Vec<Ability>> + Send + Sync>;

/// Wrap a closure as an [`Action`].
pub fn action<A, S, F>(f: F) -> Action<A, S>
where
    F: Fn(&Evaluation<'_, A, S>) -> RuleResult<Vec<Ability>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A guarded rule block. Immutable once registered.
pub struct Rule<A, S> {
    guard: Guard<A, S>,
    action: Action<A, S>,
}

impl<A, S> Rule<A, S> {
    pub(crate) fn new(guard: Guard<A, S>, action: Action<A, S>) -> Self {
        Self { guard, action }
    }

    pub fn guard(&self) -> &Guard<A, S> {
        &self.guard
    }

    pub fn action(&self) -> &Action<A, S> {
        &self.action
    }

    /// Run the action against an evaluation.
    pub(crate) fn grant(&self, evaluation: &Evaluation<'_, A, S>) -> RuleResult<Vec<Ability>> {
        (self.action)(evaluation)
    }
}

impl<A, S> fmt::Debug for Rule<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
