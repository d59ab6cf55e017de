/// Insertion-ordered multimap with a caller-supplied key equality.
///
/// Keys are compared structurally rather than hashed, so lookups are linear;
/// the maps built by the compiler hold a handful of entries at most.
pub struct KeyToListMap<K, V> {
    entries: Vec<(K, Vec<V>)>,
    same: fn(&K, &K) -> bool,
}

impl<K, V> KeyToListMap<K, V> {
    pub fn new(same: fn(&K, &K) -> bool) -> Self {
        Self { entries: Vec::new(), same }
    }

    pub fn add(&mut self, key: K, value: V) {
        let same = self.same;
        match self.entries.iter_mut().find(|(k, _)| same(k, &key)) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &K) -> Option<&[V]> {
        self.entries.iter().find(|(k, _)| (self.same)(k, key)).map(|(_, v)| v.as_slice())
    }

    pub fn entries(&self) -> &[(K, Vec<V>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn same_ignore_case(a: &String, b: &String) -> bool {
        a.eq_ignore_ascii_case(b)
    }

    #[test]
    fn values_group_under_equal_keys_in_order() {
        let mut map = KeyToListMap::new(same_ignore_case);
        map.add("a".to_string(), 1);
        map.add("B".to_string(), 2);
        map.add("A".to_string(), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"a".to_string()), Some(&[1, 3][..]));
        assert_eq!(map.entries()[1].0, "B");
        assert!(map.get(&"c".to_string()).is_none());
    }
}
