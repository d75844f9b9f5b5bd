//! Units of work executed by a batch call.

use crate::error::StepError;
use crate::execute::CancelToken;

/// A single unit of work.
///
/// `call` consumes the invocation, so a step can run at most once. The
/// token is the execution's cancellation flag; a long step may poll it and
/// return [`StepError::Cancelled`] to stop early.
pub trait Invocation<T>: Send {
    fn call(self: Box<Self>, cancel: &CancelToken) -> Result<T, StepError>;
}

impl<T, F> Invocation<T> for F
where
    F: FnOnce(&CancelToken) -> Result<T, StepError> + Send,
{
    fn call(self: Box<Self>, cancel: &CancelToken) -> Result<T, StepError> {
        (*self)(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(u32);

    impl Invocation<u32> for Constant {
        fn call(self: Box<Self>, _cancel: &CancelToken) -> Result<u32, StepError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_struct_invocation() {
        let inv: Box<dyn Invocation<u32>> = Box::new(Constant(4));
        assert_eq!(inv.call(&CancelToken::new()), Ok(4));
    }

    #[test]
    fn test_closure_invocation() {
        let name = String::from("thumbnails");
        let inv: Box<dyn Invocation<usize>> = Box::new(move |_: &CancelToken| -> Result<usize, StepError> {
            Ok(name.len())
        });
        assert_eq!(inv.call(&CancelToken::new()), Ok(10));
    }

    #[test]
    fn test_closure_observes_cancel() {
        let inv: Box<dyn Invocation<()>> = Box::new(|cancel: &CancelToken| {
            if cancel.is_cancelled() {
                Err(StepError::Cancelled)
            } else {
                Ok(())
            }
        });
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(inv.call(&token), Err(StepError::Cancelled));
    }
}
