//! Outcomes of validation and processing, and the conversions that let
//! callbacks return whatever is most natural.
//!
//! | Callback returns | Meaning |
//! |------------------|---------|
//! | `bool` | verdict with a default result |
//! | `(bool, E)` | verdict with result `E` converted into `R` |
//! | [`Verdict<R>`] | verdict as is |
//! | `Result<_, E>` | any of the above, or an error |
//!
//! Handlers return `()` or `Result<(), E>`.
//!
//! # Typed Results
//!
//! A processor carries one result type `R` for all payloads. When different
//! validators produce unrelated result values, use [`DynResult`] as `R` and
//! let handlers pick out the type they care about with [`cast_result`].

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Error raised by a validator or handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Verdict / Processed
// ============================================================================

/// Outcome of validating a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Verdict<R> {
    /// Whether every validator accepted the payload.
    pub success: bool,
    /// Result reported by the last validator that ran.
    pub result: R,
}

impl<R> Verdict<R> {
    /// An accepting verdict.
    pub fn pass(result: R) -> Self {
        Self {
            success: true,
            result,
        }
    }

    /// A rejecting verdict.
    pub fn fail(result: R) -> Self {
        Self {
            success: false,
            result,
        }
    }
}

/// Outcome of processing a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Processed<R> {
    /// `true` if at least one non-empty handler table matched the payload.
    pub handled: bool,
    /// Validation outcome handed to the handlers.
    pub success: bool,
    /// Validation result handed to the handlers.
    pub result: R,
}

impl<R> Processed<R> {
    pub(crate) fn new(handled: bool, verdict: Verdict<R>) -> Self {
        Self {
            handled,
            success: verdict.success,
            result: verdict.result,
        }
    }
}

// ============================================================================
// Return Conversions
// ============================================================================

/// Conversion from a validator's return value into a [`Verdict`].
pub trait IntoVerdict<R> {
    fn into_verdict(self) -> Result<Verdict<R>, BoxError>;
}

impl<R: Default> IntoVerdict<R> for bool {
    fn into_verdict(self) -> Result<Verdict<R>, BoxError> {
        Ok(Verdict {
            success: self,
            result: R::default(),
        })
    }
}

impl<R, E: Into<R>> IntoVerdict<R> for (bool, E) {
    fn into_verdict(self) -> Result<Verdict<R>, BoxError> {
        Ok(Verdict {
            success: self.0,
            result: self.1.into(),
        })
    }
}

impl<R> IntoVerdict<R> for Verdict<R> {
    fn into_verdict(self) -> Result<Verdict<R>, BoxError> {
        Ok(self)
    }
}

impl<R, V, E> IntoVerdict<R> for Result<V, E>
where
    V: IntoVerdict<R>,
    E: Into<BoxError>,
{
    fn into_verdict(self) -> Result<Verdict<R>, BoxError> {
        self.map_err(Into::into)?.into_verdict()
    }
}

/// Conversion from a handler's return value.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<(), BoxError>;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Type-erased Results
// ============================================================================

/// A validation result of any type, or none.
///
/// Cloning is cheap; the value is shared.
#[derive(Clone, Default)]
pub struct DynResult(Option<Rc<dyn Any>>);

impl DynResult {
    /// Wraps a value.
    pub fn new<E: Any>(value: E) -> Self {
        Self(Some(Rc::new(value)))
    }

    /// Returns `true` if no value is held.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Returns `true` if the held value is an `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns the held value if it is an `E`.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.0.as_deref()?.downcast_ref::<E>()
    }
}

impl fmt::Debug for DynResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("DynResult(..)"),
            None => f.write_str("DynResult(empty)"),
        }
    }
}

/// Views a processor result as `E`.
///
/// Matches when `R` is `E` itself, or when `R` is a [`DynResult`] holding an `E`.
pub fn cast_result<R: Any, E: Any>(result: &R) -> Option<&E> {
    let any: &dyn Any = result;
    any.downcast_ref::<E>()
        .or_else(|| any.downcast_ref::<DynResult>()?.downcast_ref::<E>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Reason(&'static str);

    #[test]
    fn test_bool_uses_default_result() {
        let verdict: Verdict<u8> = false.into_verdict().unwrap();
        assert_eq!(verdict, Verdict::fail(0));
    }

    #[test]
    fn test_tuple_converts_result() {
        let verdict: Verdict<String> = (true, "ok").into_verdict().unwrap();
        assert_eq!(verdict, Verdict::pass("ok".to_string()));
    }

    #[test]
    fn test_result_propagates_error() {
        let returned: Result<bool, &str> = Err("boom");
        let err = IntoVerdict::<()>::into_verdict(returned).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_handler_results() {
        assert!(().into_handler_result().is_ok());
        let failed: Result<(), String> = Err("nope".into());
        assert_eq!(failed.into_handler_result().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_cast_result_direct_and_erased() {
        let direct = Reason("direct");
        assert_eq!(cast_result::<_, Reason>(&direct), Some(&Reason("direct")));
        assert_eq!(cast_result::<_, u32>(&direct), None);

        let erased = DynResult::new(Reason("erased"));
        assert_eq!(cast_result::<_, Reason>(&erased), Some(&Reason("erased")));
        assert_eq!(cast_result::<_, u32>(&erased), None);
        assert_eq!(cast_result::<_, Reason>(&DynResult::default()), None);
    }
}
