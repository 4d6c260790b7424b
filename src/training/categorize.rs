use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Class vocabulary with a reverse mapping.
#[derive(Debug, Clone)]
pub struct Categorize<T> {
    classes: Vec<T>,
    o2i: HashMap<T, usize>,
}

impl<T: Clone + Eq + Hash + Ord> Categorize<T> {
    /// Vocabulary of the unique `names`, in first-seen order or sorted.
    pub fn new(names: impl IntoIterator<Item = T>, sort: bool) -> Self {
        let classes: Vec<T> = if sort {
            names.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
        } else {
            let mut seen = HashSet::new();
            names
                .into_iter()
                .filter(|name| seen.insert(name.clone()))
                .collect()
        };
        let o2i = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { classes, o2i }
    }

    pub fn classes(&self) -> &[T] {
        &self.classes
    }

    pub fn o2i(&self) -> &HashMap<T, usize> {
        &self.o2i
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, obj: &T) -> Option<usize> {
        self.o2i.get(obj).copied()
    }

    pub fn decode(&self, id: usize) -> Option<&T> {
        self.classes.get(id)
    }

    /// Ids of `objs`; `None` if any is outside the vocabulary.
    pub fn map_objs<'a>(&self, objs: impl IntoIterator<Item = &'a T>) -> Option<Vec<usize>>
    where
        T: 'a,
    {
        objs.into_iter().map(|o| self.encode(o)).collect()
    }

    /// Classes of `ids`; `None` if any id is out of range.
    pub fn map_ids(&self, ids: impl IntoIterator<Item = usize>) -> Option<Vec<T>> {
        ids.into_iter().map(|i| self.decode(i).cloned()).collect()
    }
}
