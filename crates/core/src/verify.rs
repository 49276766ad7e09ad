//! Verification of externally defined mutable lookups.
//!
//! A mutable lookup defined outside this crate may return itself from
//! `immutable_copy`, hand back another mutable value, or compare
//! asymmetrically. [`verify`] checks the copy and equality contracts and
//! records the outcome as [`VerificationFlags`]; [`admit`] is the only way an
//! external value becomes a trusted [`Query`].

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::lookup::{Lookup, LookupValue, MutableLookup, Query, QueryBuilder};

bitflags! {
    /// Checks run and their outcomes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct VerificationFlags: u16 {
        const INTERNAL_INSTANCE = 1;
        const TESTED_RTT = 1 << 1;
        const TESTED_EQUALITY = 1 << 2;
        /// An internal type showed up where an external one was expected.
        const RTT_TROUBLE = 1 << 3;
        const ERR_EQUALITY_NONCOMMUTATIVE = 1 << 4;
        const ERR_ORIGINAL_NOT_EQUALTO_COPY = 1 << 5;
        const ERR_IMMUTABLE_COPY_IS_MUTABLE = 1 << 6;
        const RTT_TEST_PASSED = 1 << 7;
        const EQUALITY_TEST_PASSED = 1 << 8;
        const ERR_ORIGINAL_EQUALITY_NONIDENTICAL = 1 << 9;
        const ERR_COPY_EQUALITY_NONIDENTICAL = 1 << 10;
        const ERR_COPY_REFERENCEEQUALS_ORIGINAL = 1 << 11;
    }
}

impl VerificationFlags {
    const COPY_ERRORS: Self = Self::ERR_COPY_REFERENCEEQUALS_ORIGINAL.union(Self::ERR_IMMUTABLE_COPY_IS_MUTABLE);

    /// Whether these flags describe a passing verification.
    pub fn passed(self) -> bool {
        self.contains(Self::INTERNAL_INSTANCE)
            || self.contains(Self::RTT_TEST_PASSED.union(Self::EQUALITY_TEST_PASSED))
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone)]
pub struct Verification {
    pub flags: VerificationFlags,
    /// The immutable copy the checks ran against.
    pub copy: Arc<dyn LookupValue>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.flags.passed()
    }
}

thread_local! {
    static IN_FLIGHT: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn address(value: &dyn LookupValue) -> usize {
    value as *const dyn LookupValue as *const () as usize
}

/// Marks a value as under verification on this thread.
///
/// An equality check inside verification can compare against an internal
/// query, which in turn admits the value being verified. While the mark is
/// held that inner admission skips verification.
struct InFlight(usize);

impl InFlight {
    fn enter(value: &dyn LookupValue) -> Self {
        let addr = address(value);
        IN_FLIGHT.with(|stack| stack.borrow_mut().push(addr));
        Self(addr)
    }

    fn contains(value: &dyn LookupValue) -> bool {
        let addr = address(value);
        IN_FLIGHT.with(|stack| stack.borrow().contains(&addr))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|addr| *addr == self.0) {
                stack.remove(pos);
            }
        });
    }
}

/// Run the copy and equality checks against a mutable lookup.
pub fn verify(value: &dyn MutableLookup) -> Verification {
    let original: &dyn LookupValue = value;
    let any: &dyn Any = original;

    if let Some(builder) = any.downcast_ref::<QueryBuilder>() {
        // Builders normally arrive as `Lookup::Builder`; one behind a trait
        // object is still trusted.
        let copy: Arc<dyn LookupValue> = Arc::new(builder.as_immutable());
        return Verification {
            flags: VerificationFlags::INTERNAL_INSTANCE | VerificationFlags::RTT_TROUBLE,
            copy,
        };
    }

    let mut flags = VerificationFlags::TESTED_RTT;
    let copy = value.immutable_copy();
    let copied: &dyn LookupValue = copy.as_ref();

    if std::ptr::addr_eq(original as *const dyn LookupValue, copied as *const dyn LookupValue) {
        flags |= VerificationFlags::ERR_COPY_REFERENCEEQUALS_ORIGINAL;
    }
    if copied.as_mutable().is_some() {
        flags |= VerificationFlags::ERR_IMMUTABLE_COPY_IS_MUTABLE;
    }
    if flags.intersects(VerificationFlags::COPY_ERRORS) {
        tracing::debug!(?flags, "immutable copy check failed");
        return Verification { flags, copy };
    }
    flags |= VerificationFlags::RTT_TEST_PASSED | VerificationFlags::TESTED_EQUALITY;

    let _original_mark = InFlight::enter(original);
    let _copy_mark = InFlight::enter(copied);

    let mut equality_failed = false;
    if !original.lookup_eq(original) {
        flags |= VerificationFlags::ERR_ORIGINAL_EQUALITY_NONIDENTICAL;
        equality_failed = true;
    }
    if !copied.lookup_eq(copied) {
        flags |= VerificationFlags::ERR_COPY_EQUALITY_NONIDENTICAL;
        equality_failed = true;
    }
    let forward = original.lookup_eq(copied);
    let backward = copied.lookup_eq(original);
    if forward != backward {
        flags |= VerificationFlags::ERR_EQUALITY_NONCOMMUTATIVE;
        equality_failed = true;
    } else if !forward {
        flags |= VerificationFlags::ERR_ORIGINAL_NOT_EQUALTO_COPY;
        equality_failed = true;
    }
    if !equality_failed {
        flags |= VerificationFlags::EQUALITY_TEST_PASSED;
    }

    tracing::debug!(?flags, passed = flags.passed(), "verified external mutable lookup");
    Verification { flags, copy }
}

/// Turn any lookup into a trusted query.
///
/// # Errors
///
/// Returns [`Error::CustomTypeFailedVerification`] when an external mutable
/// lookup fails [`verify`].
pub fn admit(lookup: &Lookup) -> Result<Query, Error> {
    match lookup {
        Lookup::Query(query) => Ok(query.clone()),
        Lookup::Builder(builder) => Ok(builder.as_immutable()),
        Lookup::External(value) => admit_value(value.as_ref()),
        Lookup::ExternalMutable(value) => admit_mutable(value.as_ref()),
    }
}

pub(crate) fn admit_value(value: &dyn LookupValue) -> Result<Query, Error> {
    let any: &dyn Any = value;
    if let Some(query) = any.downcast_ref::<Query>() {
        return Ok(query.clone());
    }
    if let Some(builder) = any.downcast_ref::<QueryBuilder>() {
        return Ok(builder.as_immutable());
    }
    match value.as_mutable() {
        Some(mutable) => admit_mutable(mutable),
        None => Ok(snapshot(value)),
    }
}

fn admit_mutable(value: &dyn MutableLookup) -> Result<Query, Error> {
    let original: &dyn LookupValue = value;
    if InFlight::contains(original) {
        return Ok(snapshot(original));
    }

    let verification = verify(value);
    if !verification.passed() {
        tracing::warn!(flags = ?verification.flags, "external mutable lookup failed verification");
        return Err(Error::CustomTypeFailedVerification(verification.flags));
    }
    admit_value(verification.copy.as_ref())
}

fn snapshot(value: &dyn LookupValue) -> Query {
    Query::from_parts(value.key_copy(), value.connection(), value.cache_options())
}
