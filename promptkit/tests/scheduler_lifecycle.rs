//! Kept in its own test binary: the private-scheduler counter is process-wide.

use std::thread;

use promptkit::kernel::{ExecutionMode, current_mode, live_private_schedulers};
use promptkit::{Prompt, PromptId, PromptManager, Variables};

#[test]
fn blocking_calls_never_leak_private_schedulers() {
    assert_eq!(current_mode(), ExecutionMode::Blocking);
    let manager = PromptManager::builder().build().unwrap();
    let sync = manager.blocking();
    sync.create_prompt(Prompt::builder("ping").text("pong").build().unwrap(), None)
        .unwrap();
    assert_eq!(live_private_schedulers(), 0);

    let id = PromptId::new("ping").unwrap();
    for _ in 0..20 {
        assert_eq!(sync.render(&id, &Variables::new(), None).unwrap(), "pong");
        assert_eq!(live_private_schedulers(), 0);
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    manager
                        .blocking()
                        .render(&id, &Variables::new(), None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(live_private_schedulers(), 0);

    // A failing call releases its scheduler too.
    let missing = PromptId::new("missing").unwrap();
    assert!(sync.get_prompt(&missing, None).is_err());
    assert_eq!(live_private_schedulers(), 0);
}
