//! # Seven
//!
//! Declarative ability rules. A [`PolicyClass`] registers guarded rule
//! blocks; given an actor and a subject it returns the ordered list of
//! [`Ability`] tokens granted by every rule whose guard passes, walking
//! its ancestors first.
//!
//! Key pieces:
//!
//! 1. **Guard**: one of four shorthand forms (none, `check`/`equal`,
//!    `check`/`in`, `pass`) compiled at registration into a [`Guard`].
//!
//! 2. **Rule registry**: each class owns its own ordered rules and filters.
//!
//! 3. **Evaluation**: an [`Evaluation`] binds actor and subject for a
//!    single `abilities()` call.
//!
//! 4. **Catalog**: policy classes described in a TOML or JSON manifest.

pub mod ability;
pub mod attributes;
pub mod catalog;
pub mod class;
pub mod error;
pub mod evaluation;
pub mod guard;
pub mod rule;

pub use ability::Ability;
pub use attributes::Attributes;
pub use catalog::{ManifestError, PolicyCatalog, PolicyManifest};
pub use class::PolicyClass;
pub use error::{ArgsError, RuleError, RuleResult};
pub use evaluation::{Evaluation, Filter};
pub use guard::{predicate, Guard, GuardOptions, Pass, Predicate};
pub use rule::{action, Action, Rule};
