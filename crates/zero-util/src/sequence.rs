//! Small iterator helpers used throughout the search core.

/// Returns the item with the maximum key, breaking ties by keeping the
/// first (lowest-index) item seen — selection order must stay stable so
/// that repeated searches over the same tree pick the same child.
pub fn choose_max_by_key<T, K, I>(items: I, mut key_fn: impl FnMut(&T) -> K) -> Option<T>
where
    I: IntoIterator<Item = T>,
    K: PartialOrd,
{
    let mut best: Option<(T, K)> = None;

    for item in items {
        let key = key_fn(&item);
        match &best {
            Some((_, best_key)) if key <= *best_key => {}
            _ => best = Some((item, key)),
        }
    }

    best.map(|(item, _)| item)
}

/// Zips two iterators, returning an error if they don't have the same
/// length.
///
/// Used whenever a flat network output must line up 1:1 with a set of
/// pending tree nodes — a mismatch there means the evaluator and the tree
/// have gone out of sync. That can only happen if a backend returns the
/// wrong batch size, so it surfaces as a backend failure rather than a
/// panic.
pub fn zip_eq_exact<A, B>(
    a: impl IntoIterator<Item = A>,
    b: impl IntoIterator<Item = B>,
) -> Result<Vec<(A, B)>, String> {
    let a: Vec<A> = a.into_iter().collect();
    let b: Vec<B> = b.into_iter().collect();

    if a.len() != b.len() {
        return Err(format!("zip_eq_exact: iterators had different lengths ({} vs {})", a.len(), b.len()));
    }

    Ok(a.into_iter().zip(b).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_by_key_stable_ties() {
        let items = vec![(0, 1.0), (1, 2.0), (2, 2.0), (3, 0.5)];
        let chosen = choose_max_by_key(items, |&(_, k)| k);
        assert_eq!(chosen, Some((1, 2.0)));
    }

    #[test]
    fn max_by_key_empty() {
        let items: Vec<(i32, f32)> = vec![];
        assert_eq!(choose_max_by_key(items, |&(_, k)| k), None);
    }

    #[test]
    fn zip_eq_exact_errs_on_mismatch() {
        let result = zip_eq_exact(vec![1, 2, 3], vec![1, 2]);
        assert!(result.is_err());
    }

    #[test]
    fn zip_eq_exact_ok() {
        let result = zip_eq_exact(vec![1, 2], vec!["a", "b"]).unwrap();
        assert_eq!(result, vec![(1, "a"), (2, "b")]);
    }
}
