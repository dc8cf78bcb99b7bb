//! Generation-based change detection.

use crate::CachedObject;

/// Two observations are the same if they share identity and generation.
///
/// The origin system bumps the generation on spec changes only, so this answers
/// "does derived state need recomputing". Annotation-only updates compare as
/// unchanged and must be caught by a separate comparison.
pub fn is_unchanged<A, B>(a: &A, b: &B) -> bool
where
    A: CachedObject + ?Sized,
    B: CachedObject + ?Sized,
{
    a.key() == b.key() && a.generation() == b.generation()
}
