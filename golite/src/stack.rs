//! Stack growth for the recursive parser, checker and evaluator
//!
//! Go source and Go call chains can nest deeper than a worker thread's
//! stack allows. Every recursive entry point runs through
//! [`ensure_sufficient_stack`], which moves onto a fresh heap-allocated
//! segment when the remaining stack drops below the red zone.

/// Remaining stack below which a new segment is allocated
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, growing the stack first if it is close to exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
