#[cfg(test)]
mod tests {
    use lodestore::{ChangeEvent, ChangeListener, KeyFilter};
    use lodestore_int_test::test_util::{cleanup, random_path, string_store};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    #[test]
    fn test_all_subscription_sees_puts_and_deletes() {
        let path = random_path();
        let store = string_store(&path);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(move |event| {
                    let kind = match event {
                        ChangeEvent::Put { .. } => "put",
                        ChangeEvent::Delete { .. } => "delete",
                    };
                    sink.lock()
                        .unwrap()
                        .push(format!("{}:{}", kind, event.key()));
                    Ok(())
                }),
            )
            .unwrap();

        store.put("a", "1".to_string()).unwrap();
        store.delete("a").unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &["put:a".to_string(), "delete:a".to_string()]
        );
        cleanup(&path);
    }

    #[test]
    fn test_exact_subscription_ignores_other_keys() {
        let path = random_path();
        let store = string_store(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store
            .subscribe(
                KeyFilter::Exact("watched".into()),
                ChangeListener::new(move |_event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        store.put("other", "v".to_string()).unwrap();
        store.put("watched", "v".to_string()).unwrap();
        store.delete("watched").unwrap();
        store.delete("other").unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        cleanup(&path);
    }

    #[test]
    fn test_put_event_carries_committed_value() {
        let path = random_path();
        let store = string_store(&path);
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        store
            .subscribe(
                KeyFilter::Exact("k".into()),
                ChangeListener::new(move |event: &ChangeEvent<String>| {
                    if let ChangeEvent::Put { value, .. } = event {
                        *sink.lock().unwrap() = Some(value.as_ref().clone());
                    }
                    Ok(())
                }),
            )
            .unwrap();

        store.put("k", "committed".to_string()).unwrap();
        assert_eq!(
            captured.lock().unwrap().as_deref(),
            Some("committed")
        );
        cleanup(&path);
    }

    #[test]
    fn test_unsubscribe_stops_dispatch() {
        let path = random_path();
        let store = string_store(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let subscriber = store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(move |_event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        store.put("a", "1".to_string()).unwrap();
        store.unsubscribe(subscriber);
        store.put("a", "2".to_string()).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        cleanup(&path);
    }

    #[test]
    fn test_pause_drops_events_and_resume_does_not_replay() {
        let path = random_path();
        let store = string_store(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(move |_event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        store.pause_notifications();
        store.put("missed", "v".to_string()).unwrap();
        store.resume_notifications();

        // the paused commit itself succeeded, only its event was dropped
        assert!(store.exists("missed").unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        store.put("seen", "v".to_string()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        cleanup(&path);
    }

    #[test]
    fn test_no_event_for_failed_mutation() {
        let path = random_path();
        let store = string_store(&path);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(move |_event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        store.close().unwrap();
        assert!(store.put("k", "v".to_string()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        cleanup(&path);
    }

    #[test]
    fn test_failing_listener_does_not_break_commits_or_peers() {
        let path = random_path();
        let store = string_store(&path);
        store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(|_event| {
                    Err(lodestore::StoreError::Backend {
                        details: "observer failure".to_string(),
                    })
                }),
            )
            .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store
            .subscribe(
                KeyFilter::All,
                ChangeListener::new(move |_event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        store.put("k", "v".to_string()).unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        cleanup(&path);
    }

    #[test]
    fn test_per_key_event_order_matches_commit_order() {
        let path = random_path();
        let store = string_store(&path);
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        store
            .subscribe(
                KeyFilter::Exact("k".into()),
                ChangeListener::new(move |event: &ChangeEvent<String>| {
                    if let ChangeEvent::Put { value, .. } = event {
                        sink.lock().unwrap().push(value.as_ref().clone());
                    }
                    Ok(())
                }),
            )
            .unwrap();

        for i in 0..5 {
            store.put("k", i.to_string()).unwrap();
        }
        assert_eq!(
            values.lock().unwrap().as_slice(),
            &["0", "1", "2", "3", "4"]
        );
        cleanup(&path);
    }
}
