#[cfg(test)]
mod tests {
    use lodestore::{
        BincodeCodec, Codec, EnumeratorState, Key, ScanControl, Store, StoreResult,
    };
    use lodestore_int_test::test_util::{cleanup, random_path, string_store, test_config};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    /// Codec wrapper that counts decode calls, for observing lazy-mode
    /// behavior from the outside.
    struct CountingCodec {
        inner: BincodeCodec<String>,
        decodes: Arc<AtomicUsize>,
    }

    impl Codec for CountingCodec {
        type Value = String;

        fn encode(&self, key: &Key, value: &String) -> StoreResult<Vec<u8>> {
            self.inner.encode(key, value)
        }

        fn decode(&self, key: &Key, bytes: &[u8]) -> StoreResult<String> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            self.inner.decode(key, bytes)
        }
    }

    fn counting_store(path: &str) -> (Store<CountingCodec>, Arc<AtomicUsize>) {
        let decodes = Arc::new(AtomicUsize::new(0));
        let codec = CountingCodec {
            inner: BincodeCodec::new(),
            decodes: Arc::clone(&decodes),
        };
        let store = Store::open(test_config(path), codec).expect("Failed to open counting store");
        (store, decodes)
    }

    #[test]
    fn test_forward_enumeration_reports_ascending_insertion_independent_order() {
        let path = random_path();
        let store = string_store(&path);
        // inserted out of order on purpose
        for key in ["delta", "alpha", "echo", "charlie", "bravo"] {
            store.put(key, key.to_string()).unwrap();
        }

        let mut forward = Vec::new();
        let mut enumerator = store.enumerator().unwrap().build().unwrap();
        enumerator
            .for_each_key(|key| {
                forward.push(key.to_string());
                Ok(ScanControl::Continue)
            })
            .unwrap();
        assert_eq!(forward, vec!["alpha", "bravo", "charlie", "delta", "echo"]);

        let mut backward = Vec::new();
        let mut enumerator = store.enumerator().unwrap().backward().build().unwrap();
        enumerator
            .for_each_key(|key| {
                backward.push(key.to_string());
                Ok(ScanControl::Continue)
            })
            .unwrap();
        assert_eq!(backward, vec!["echo", "delta", "charlie", "bravo", "alpha"]);
        cleanup(&path);
    }

    #[test]
    fn test_no_key_reported_twice() {
        let path = random_path();
        let store = string_store(&path);
        for i in 0..50 {
            store.put(format!("k{:03}", i), i.to_string()).unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        let mut enumerator = store.enumerator().unwrap().build().unwrap();
        enumerator
            .for_each_key(|key| {
                assert!(seen.insert(key.clone()), "key {} reported twice", key);
                Ok(ScanControl::Continue)
            })
            .unwrap();
        assert_eq!(seen.len(), 50);
        cleanup(&path);
    }

    #[test]
    fn test_prefix_bound_stops_before_foreign_keys() {
        let path = random_path();
        let store = string_store(&path);
        store.put("admin:1", "a".to_string()).unwrap();
        store.put("user:1", "u1".to_string()).unwrap();
        store.put("user:2", "u2".to_string()).unwrap();

        let mut keys = Vec::new();
        let mut enumerator = store.enumerator().unwrap().prefix("user:").build().unwrap();
        enumerator
            .for_each_key(|key| {
                keys.push(key.to_string());
                Ok(ScanControl::Continue)
            })
            .unwrap();

        assert_eq!(keys, vec!["user:1", "user:2"]);
        assert_eq!(enumerator.state(), EnumeratorState::Exhausted);
        assert!(enumerator.released());
        cleanup(&path);
    }

    #[test]
    fn test_key_only_predicate_in_lazy_mode_never_decodes() {
        let path = random_path();
        let (store, decodes) = counting_store(&path);
        for i in 0..10 {
            store.put(format!("k{}", i), format!("v{}", i)).unwrap();
        }

        let mut reported = 0;
        let mut enumerator = store
            .enumerator()
            .unwrap()
            .filter(|key, _value| Ok(key.as_bytes().ends_with(b"3")))
            .build()
            .unwrap();
        enumerator
            .for_each_lazy(|_key, _value| {
                reported += 1;
                Ok(ScanControl::Continue)
            })
            .unwrap();

        assert_eq!(reported, 1);
        assert_eq!(decodes.load(Ordering::SeqCst), 0);
        cleanup(&path);
    }

    #[test]
    fn test_value_predicate_decodes_once_per_reported_entry() {
        let path = random_path();
        let (store, decodes) = counting_store(&path);
        for i in 0..5 {
            store.put(format!("k{}", i), format!("v{}", i)).unwrap();
        }
        decodes.store(0, Ordering::SeqCst);

        let mut enumerator = store
            .enumerator()
            .unwrap()
            .filter(|_key, value| Ok(value.get()?.ends_with('2')))
            .build()
            .unwrap();
        enumerator
            .for_each(|_key, value| {
                // the callback's read reuses the predicate's decode
                assert_eq!(value, "v2");
                Ok(ScanControl::Continue)
            })
            .unwrap();

        // one decode per traversed entry, none paid twice
        assert_eq!(decodes.load(Ordering::SeqCst), 5);
        cleanup(&path);
    }

    #[test]
    fn test_stop_on_first_of_hundred_keys_reports_exactly_one() {
        let path = random_path();
        let store = string_store(&path);
        for i in 0..100 {
            store.put(format!("k{:03}", i), i.to_string()).unwrap();
        }

        let mut reported = 0;
        let mut enumerator = store.enumerator().unwrap().build().unwrap();
        enumerator
            .for_each_key(|_key| {
                reported += 1;
                Ok(ScanControl::Stop)
            })
            .unwrap();

        assert_eq!(reported, 1);
        assert_eq!(enumerator.state(), EnumeratorState::Stopped);
        assert!(enumerator.released());
        cleanup(&path);
    }

    #[test]
    fn test_seek_positions_in_both_directions() {
        let path = random_path();
        let store = string_store(&path);
        for key in ["a", "c", "e", "g"] {
            store.put(key, key.to_string()).unwrap();
        }

        let mut from_d_forward = Vec::new();
        let mut enumerator = store.enumerator().unwrap().from("d").build().unwrap();
        enumerator
            .for_each_key(|key| {
                from_d_forward.push(key.to_string());
                Ok(ScanControl::Continue)
            })
            .unwrap();
        assert_eq!(from_d_forward, vec!["e", "g"]);

        let mut from_d_backward = Vec::new();
        let mut enumerator = store
            .enumerator()
            .unwrap()
            .backward()
            .from("d")
            .build()
            .unwrap();
        enumerator
            .for_each_key(|key| {
                from_d_backward.push(key.to_string());
                Ok(ScanControl::Continue)
            })
            .unwrap();
        assert_eq!(from_d_backward, vec!["c", "a"]);
        cleanup(&path);
    }

    #[test]
    fn test_derived_reads_match_enumeration() {
        let path = random_path();
        let store = string_store(&path);
        store.put("a", "1".to_string()).unwrap();
        store.put("b", "2".to_string()).unwrap();
        store.put("c", "1".to_string()).unwrap();

        let keys = store.keys().unwrap();
        assert_eq!(keys, vec![Key::from("a"), Key::from("b"), Key::from("c")]);

        let ones = store
            .keys_matching(|_key, value| Ok(value.get()? == "1"))
            .unwrap();
        assert_eq!(ones, vec![Key::from("a"), Key::from("c")]);

        let entries = store
            .entries_matching(|_key, value| Ok(value.get()? == "2"))
            .unwrap();
        assert_eq!(entries, vec![(Key::from("b"), "2".to_string())]);
        cleanup(&path);
    }

    #[test]
    fn test_filtered_entries_skip_but_do_not_terminate() {
        let path = random_path();
        let store = string_store(&path);
        for i in 0..10 {
            store.put(format!("k{}", i), (i % 2).to_string()).unwrap();
        }

        let odd = store
            .keys_matching(|_key, value| Ok(value.get()? == "1"))
            .unwrap();
        // filtered-out keys are skipped, later matches still reported
        assert_eq!(odd.len(), 5);
        assert_eq!(odd.last().unwrap(), &Key::from("k9"));
        cleanup(&path);
    }
}
