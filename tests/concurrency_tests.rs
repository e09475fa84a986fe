//! spec.md §8 scenario 6: N threads each register a distinct handler and
//! drop their handle; the demultiplexer must end up with no residue and
//! no handler should leak past its `RequestHandle`'s lifetime.

use std::thread;

use restmux::demux::{connect, create_demultiplexer, RequestHandlerId};
use restmux::mime::Mime;
use restmux::request::Method;

#[test]
fn concurrent_connect_and_drop_leaves_no_residue() {
    let demux = create_demultiplexer();
    const THREAD_COUNT: usize = 32;

    let paths: Vec<String> = (0..THREAD_COUNT).map(|i| format!("/concurrent/{i}")).collect();

    let joins: Vec<_> = paths
        .iter()
        .cloned()
        .map(|path| {
            let demux = demux.clone();
            thread::spawn(move || {
                let id = RequestHandlerId::new(path.clone(), Method::Get, Mime::WILDCARD, Mime::WILDCARD);
                let handle = connect(&demux, id, |_, _| {}).expect("each thread registers a distinct path");
                assert!(demux.path_exists(&path));
                drop(handle);
            })
        })
        .collect();

    for join in joins {
        join.join().expect("registration thread should not panic");
    }

    for path in &paths {
        assert!(!demux.path_exists(path), "{path} should have deregistered when its handle dropped");
    }
}

#[test]
fn concurrently_registering_the_same_id_lets_exactly_one_thread_win() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let demux = create_demultiplexer();
    const THREAD_COUNT: usize = 16;
    let successes = Arc::new(AtomicUsize::new(0));

    let joins: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let demux = demux.clone();
            let successes = successes.clone();
            thread::spawn(move || {
                let id = RequestHandlerId::new("/contended", Method::Get, Mime::WILDCARD, Mime::WILDCARD);
                if let Ok(handle) = connect(&demux, id, |_, _| {}) {
                    successes.fetch_add(1, Ordering::SeqCst);
                    // hold the handle until the thread exits so the path
                    // stays registered while the other threads race.
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    drop(handle);
                }
            })
        })
        .collect();

    for join in joins {
        join.join().expect("registration thread should not panic");
    }

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert!(!demux.path_exists("/contended"));
}
