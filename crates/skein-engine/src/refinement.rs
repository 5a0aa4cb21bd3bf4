//! Worker-supplied narrowing of the eligibility filter.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use skein_store::FilterFragment;

use crate::error::RefinementError;

/// Narrows which actions a worker is willing to take.
///
/// Refinements run inside the assignment critical section, so they must be
/// quick and must not block. They are synchronous by construction.
pub trait ActionRefinement: Send + Sync {
  fn refine(&self) -> Result<FilterFragment, RefinementError>;
}

/// A fixed fragment, as configured for a blueprint.
impl ActionRefinement for FilterFragment {
  fn refine(&self) -> Result<FilterFragment, RefinementError> {
    Ok(self.clone())
  }
}

/// A refinement computed by a closure.
pub struct FnRefinement<F>(pub F);

impl<F> ActionRefinement for FnRefinement<F>
where
  F: Fn() -> Result<FilterFragment, RefinementError> + Send + Sync,
{
  fn refine(&self) -> Result<FilterFragment, RefinementError> {
    (self.0)()
  }
}

/// Run a refinement, turning a panic into an error.
pub(crate) fn run_refinement(
  refinement: &dyn ActionRefinement,
) -> Result<FilterFragment, RefinementError> {
  match catch_unwind(AssertUnwindSafe(|| refinement.refine())) {
    Ok(result) => result,
    Err(payload) => Err(RefinementError::Panicked {
      message: panic_message(payload.as_ref()),
    }),
  }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
