/// A restartable generator of the distinct orderings of a multiset.
///
/// Orderings are produced in lexicographic order of the sorted items. After each item is
/// appended to a partial ordering, `accept` is consulted with the prefix built so far,
/// and when it declines, every ordering beginning with that prefix is skipped.
pub struct PositionPermutations<T, F>
where
    T: Clone + Ord,
    F: FnMut(&[T]) -> bool,
{
    distinct: Vec<T>,
    counts: Vec<usize>,
    remaining: Vec<usize>,
    prefix: Vec<usize>,
    ordering: Vec<T>,
    cursor: Vec<usize>,
    length: usize,
    accept: F,
    done: bool,
}

impl<T, F> PositionPermutations<T, F>
where
    T: Clone + Ord,
    F: FnMut(&[T]) -> bool,
{
    pub fn new(mut items: Vec<T>, accept: F) -> Self {
        items.sort();
        let mut distinct: Vec<T> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for item in items.iter() {
            match distinct.last() {
                Some(last) if last == item => {
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    distinct.push(item.clone());
                    counts.push(1);
                }
            }
        }
        let length = items.len();
        Self {
            remaining: counts.clone(),
            distinct,
            counts,
            prefix: Vec::with_capacity(length),
            ordering: Vec::with_capacity(length),
            cursor: vec![0; length.max(1)],
            length,
            accept,
            done: false,
        }
    }

    /// Start again from the first ordering
    pub fn reset(&mut self) {
        self.remaining.clone_from(&self.counts);
        self.prefix.clear();
        self.ordering.clear();
        self.cursor.iter_mut().for_each(|c| *c = 0);
        self.done = false;
    }

    fn pop(&mut self) {
        if let Some(k) = self.prefix.pop() {
            self.remaining[k] += 1;
            self.ordering.pop();
        }
    }
}

impl<T, F> Iterator for PositionPermutations<T, F>
where
    T: Clone + Ord,
    F: FnMut(&[T]) -> bool,
{
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.length == 0 {
            self.done = true;
            return Some(Vec::new());
        }
        loop {
            let depth = self.prefix.len();
            let start = self.cursor[depth];
            let found = (start..self.distinct.len()).find(|&k| self.remaining[k] > 0);
            let Some(k) = found else {
                if depth == 0 {
                    self.done = true;
                    return None;
                }
                self.cursor[depth] = 0;
                self.pop();
                continue;
            };
            self.cursor[depth] = k + 1;
            self.prefix.push(k);
            self.remaining[k] -= 1;
            self.ordering.push(self.distinct[k].clone());
            if !(self.accept)(&self.ordering) {
                self.pop();
                continue;
            }
            if self.prefix.len() == self.length {
                let out = self.ordering.clone();
                self.pop();
                return Some(out);
            }
            self.cursor[depth + 1] = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_distinct_orderings() {
        let perms: Vec<Vec<u8>> = PositionPermutations::new(vec![2, 1, 2], |_: &[u8]| true).collect();
        assert_eq!(perms, vec![vec![1, 2, 2], vec![2, 1, 2], vec![2, 2, 1]]);

        let perms: Vec<Vec<u8>> = PositionPermutations::new(vec![1, 2, 3], |_: &[u8]| true).collect();
        assert_eq!(perms.len(), 6);

        let perms: Vec<Vec<u8>> = PositionPermutations::new(vec![7, 7], |_: &[u8]| true).collect();
        assert_eq!(perms, vec![vec![7, 7]]);
    }

    #[test]
    fn test_pruning_and_reset() {
        let mut orderings = PositionPermutations::new(vec![1, 2, 3], |prefix: &[u8]| prefix[0] != 1);
        let first: Vec<Vec<u8>> = orderings.by_ref().collect();
        assert_eq!(first, vec![vec![2, 1, 3], vec![2, 3, 1], vec![3, 1, 2], vec![3, 2, 1]]);
        assert!(orderings.next().is_none());
        orderings.reset();
        let second: Vec<Vec<u8>> = orderings.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_everything_pruned() {
        let perms: Vec<Vec<u8>> = PositionPermutations::new(vec![1, 2], |_: &[u8]| false).collect();
        assert!(perms.is_empty());
    }
}
