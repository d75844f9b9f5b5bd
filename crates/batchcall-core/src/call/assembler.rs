//! Strategies for folding per-step values into one result.
//!
//! An assembler is owned by the single execution that runs its tree. Values
//! arrive in step order through `add`; `assemble` is called once after the
//! last step succeeded.

use std::marker::PhantomData;

/// Folds step values into the value a batch call resolves to.
pub trait ResultAssembler<T>: Send {
    /// The assembled value.
    type Output: Clone + Send + 'static;

    /// Record the value produced by the next step.
    fn add(&mut self, value: T);

    /// Produce the assembled value.
    fn assemble(self) -> Self::Output;
}

/// Keeps only the most recently added value.
///
/// Assembly is last-write-wins; a fresh assembler assembles to `None`.
#[derive(Debug, Clone)]
pub struct PlainAssembler<T> {
    last: Option<T>,
}

impl<T> PlainAssembler<T> {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl<T> Default for PlainAssembler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ResultAssembler<T> for PlainAssembler<T> {
    type Output = Option<T>;

    fn add(&mut self, value: T) {
        self.last = Some(value);
    }

    fn assemble(self) -> Option<T> {
        self.last
    }
}

/// Keeps every value in step order.
#[derive(Debug, Clone)]
pub struct CollectAssembler<T> {
    values: Vec<T>,
}

impl<T> CollectAssembler<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T> Default for CollectAssembler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ResultAssembler<T> for CollectAssembler<T> {
    type Output = Vec<T>;

    fn add(&mut self, value: T) {
        self.values.push(value);
    }

    fn assemble(self) -> Vec<T> {
        self.values
    }
}

/// Folds values into an accumulator with a caller-supplied function.
///
/// ```
/// use batchcall_core::call::{FoldAssembler, ResultAssembler};
///
/// let mut total = FoldAssembler::new(0u64, |acc: u64, n: u32| acc + u64::from(n));
/// total.add(2);
/// total.add(5);
/// assert_eq!(total.assemble(), 7);
/// ```
pub struct FoldAssembler<T, O, F> {
    acc: O,
    fold: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, O, F> FoldAssembler<T, O, F>
where
    F: FnMut(O, T) -> O,
{
    pub fn new(initial: O, fold: F) -> Self {
        Self {
            acc: initial,
            fold,
            _marker: PhantomData,
        }
    }
}

impl<T, O, F> ResultAssembler<T> for FoldAssembler<T, O, F>
where
    O: Default + Clone + Send + 'static,
    F: FnMut(O, T) -> O + Send,
{
    type Output = O;

    fn add(&mut self, value: T) {
        let acc = std::mem::take(&mut self.acc);
        self.acc = (self.fold)(acc, value);
    }

    fn assemble(self) -> O {
        self.acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_assembler_empty() {
        let assembler = PlainAssembler::<String>::new();
        assert_eq!(assembler.assemble(), None);
    }

    #[test]
    fn test_plain_assembler_last_write_wins() {
        let mut assembler = PlainAssembler::new();
        assembler.add("a");
        assembler.add("b");
        assert_eq!(assembler.assemble(), Some("b"));
    }

    #[test]
    fn test_collect_assembler_keeps_order() {
        let mut assembler = CollectAssembler::new();
        for n in [3, 1, 2] {
            assembler.add(n);
        }
        assert_eq!(assembler.assemble(), vec![3, 1, 2]);
        assert!(CollectAssembler::<u8>::default().assemble().is_empty());
    }

    #[test]
    fn test_fold_assembler() {
        let mut longest = FoldAssembler::new(String::new(), |acc: String, s: &str| {
            if s.len() > acc.len() { s.to_string() } else { acc }
        });
        longest.add("ab");
        longest.add("abcd");
        longest.add("abc");
        assert_eq!(longest.assemble(), "abcd");
    }
}
