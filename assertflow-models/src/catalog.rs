//! The registry of known fatal-assertion calls.
//!
//! A fatal-assertion call terminates the program when its condition is false, so any code after a
//! call which returned may assume the condition.  The catalog only records how to recognise the
//! calls and where their condition lives; it never changes once built.

use std::fmt;

use assertflow_ir::{Context, Function};

/// The closed set of fatal-assertion calls modeled by the default catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Check,
    DCheck,
    PCheck,
    /// The overload of `PCheck` with no condition argument; it always signals failure.
    PCheckNoCond,
    DPCheck,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Check,
        CheckKind::DCheck,
        CheckKind::PCheck,
        CheckKind::PCheckNoCond,
        CheckKind::DPCheck,
    ];

    const SCOPE: [&'static str; 2] = ["logging", "CheckError"];

    fn method_name(&self) -> &'static str {
        match self {
            CheckKind::Check => "Check",
            CheckKind::DCheck => "DCheck",
            CheckKind::PCheck | CheckKind::PCheckNoCond => "PCheck",
            CheckKind::DPCheck => "DPCheck",
        }
    }

    /// The call variant for this kind.  Arguments are `(file, line[, errno][, condition])`.
    pub fn variant(&self) -> CallVariant {
        let (arity, condition_arg_index) = match self {
            CheckKind::Check | CheckKind::DCheck | CheckKind::PCheck => (3, Some(2)),
            CheckKind::PCheckNoCond => (2, None),
            CheckKind::DPCheck => (4, Some(3)),
        };
        CallVariant {
            kind: *self,
            qualified_name: CheckKind::SCOPE
                .into_iter()
                .chain(std::iter::once(self.method_name()))
                .map(str::to_owned)
                .collect(),
            arity,
            condition_arg_index,
        }
    }
}

/// One way of calling a fatal assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallVariant {
    pub kind: CheckKind,
    /// The scope qualifiers followed by the callee name, e.g. `["logging", "CheckError", "Check"]`.
    pub qualified_name: Vec<String>,
    pub arity: usize,
    /// The index of the condition in the argument list.  `None` for variants which always fail.
    pub condition_arg_index: Option<usize>,
}

impl fmt::Display for CallVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.qualified_name.join("::"), self.arity)
    }
}

/// An immutable set of [`CallVariant`]s, unique by qualified name and arity.
#[derive(Debug)]
pub struct CallPatternCatalog {
    variants: Vec<CallVariant>,
}

impl CallPatternCatalog {
    /// Build a catalog from `variants`.
    ///
    /// Panics if two variants share a qualified name and arity.
    pub fn new(variants: Vec<CallVariant>) -> Self {
        for (idx, variant) in variants.iter().enumerate() {
            assert!(
                !variants[..idx].iter().any(|earlier| earlier.arity == variant.arity
                    && earlier.qualified_name == variant.qualified_name),
                "duplicate call variant {variant} in catalog"
            );
        }
        CallPatternCatalog { variants }
    }

    /// The catalog of the `logging::CheckError` family.
    pub fn logging_checks() -> Self {
        Self::new(CheckKind::ALL.iter().map(CheckKind::variant).collect())
    }

    /// Find the variant with exactly this qualified name and arity.
    ///
    /// The whole qualifier chain must match, a callee with the right leaf name in another scope
    /// is not a match.
    pub fn lookup(&self, qualified_name: &[String], arity: usize) -> Option<&CallVariant> {
        self.variants.iter().find(|variant| {
            variant.arity == arity && variant.qualified_name.as_slice() == qualified_name
        })
    }

    /// Find the variant for a call to `callee`.
    pub fn lookup_callee(&self, context: &Context, callee: Function) -> Option<&CallVariant> {
        self.lookup(callee.get_path(context), callee.num_args(context))
    }

    pub fn variants(&self) -> impl Iterator<Item = &CallVariant> {
        self.variants.iter()
    }
}

impl Default for CallPatternCatalog {
    fn default() -> Self {
        Self::logging_checks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(name: &str) -> Vec<String> {
        name.split("::").map(str::to_owned).collect()
    }

    #[test]
    fn lookup_matches_full_qualifier_chain() {
        let catalog = CallPatternCatalog::logging_checks();
        assert_eq!(catalog.variants().count(), 5);

        let check = catalog.lookup(&path("logging::CheckError::Check"), 3).unwrap();
        assert_eq!(check.kind, CheckKind::Check);
        assert_eq!(check.condition_arg_index, Some(2));

        assert!(catalog
            .lookup(&path("other::logging::CheckError::Check"), 3)
            .is_none());
        assert!(catalog.lookup(&path("CheckError::Check"), 3).is_none());
        assert!(catalog.lookup(&path("Check"), 3).is_none());
    }

    #[test]
    fn overloads_are_told_apart_by_arity() {
        let catalog = CallPatternCatalog::logging_checks();
        let pcheck = path("logging::CheckError::PCheck");

        assert_eq!(catalog.lookup(&pcheck, 3).unwrap().kind, CheckKind::PCheck);
        let no_cond = catalog.lookup(&pcheck, 2).unwrap();
        assert_eq!(no_cond.kind, CheckKind::PCheckNoCond);
        assert_eq!(no_cond.condition_arg_index, None);
        assert!(catalog.lookup(&pcheck, 4).is_none());

        let dpcheck = catalog
            .lookup(&path("logging::CheckError::DPCheck"), 4)
            .unwrap();
        assert_eq!(dpcheck.condition_arg_index, Some(3));
        assert_eq!(dpcheck.to_string(), "logging::CheckError::DPCheck/4");
    }

    #[test]
    #[should_panic(expected = "duplicate call variant logging::CheckError::Check/3")]
    fn duplicates_are_rejected() {
        CallPatternCatalog::new(vec![
            CheckKind::Check.variant(),
            CheckKind::DCheck.variant(),
            CheckKind::Check.variant(),
        ]);
    }
}
