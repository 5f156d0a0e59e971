use std::collections::HashSet;
use std::hash::Hash;

/// Members present in both sets.
///
/// Both inputs are consumed; the smaller one is filtered in place and
/// returned, so neither argument order nor relative size matters.
pub fn intersect<T: Eq + Hash>(a: HashSet<T>, b: HashSet<T>) -> HashSet<T> {
    let (mut smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    smaller.retain(|member| larger.contains(member));
    smaller
}
