//! Scenario 6 (spec.md §8): each back-pressure sleep the sweeper issues
//! must equal twice that batch's measured duration.

use fedgc_core::storage::{MemoryStorage, Storage};
use fedgc_core::{sweep, BadIndex, DbName, Oid, SweepConfig};
use std::collections::BTreeMap;
use std::sync::Mutex;

struct StepClock {
    current: Mutex<f64>,
    step: f64,
}

impl fedgc_core::Clock for StepClock {
    fn now(&self) -> f64 {
        let mut current = self.current.lock().unwrap();
        let v = *current;
        *current = v + self.step;
        v
    }
}

struct RecordingSleeper {
    calls: Mutex<Vec<f64>>,
}

impl fedgc_core::Sleeper for RecordingSleeper {
    fn sleep(&self, secs: f64) {
        self.calls.lock().unwrap().push(secs);
    }
}

#[test]
fn sleep_interval_always_doubles_the_measured_batch_duration() {
    let mut store = MemoryStorage::new(true);
    let mut bad = BadIndex::new().unwrap();
    for i in 1..=60u64 {
        let tid = store.commit(Oid::from_u64(i), b"x".to_vec());
        bad.insert("", Oid::from_u64(i), tid, []).unwrap();
    }

    let mut stores: BTreeMap<DbName, Box<dyn Storage>> = BTreeMap::new();
    stores.insert(String::new(), Box::new(store));

    let clock = StepClock {
        current: Mutex::new(0.0),
        step: 0.2,
    };
    let sleeper = RecordingSleeper {
        calls: Mutex::new(Vec::new()),
    };
    let config = SweepConfig {
        initial_batch_size: 20,
    };

    let report = sweep(&mut stores, &mut bad, &config, &clock, &sleeper).unwrap();
    assert_eq!(report.deleted[""], 60);
    assert_eq!(report.skipped[""], 0);

    let sleeps = sleeper.calls.lock().unwrap();
    assert!(!sleeps.is_empty());
    // one clock tick (0.2s) elapses per batch, so every sleep is 2 * 0.2.
    for secs in sleeps.iter() {
        assert_eq!(*secs, 0.4);
    }
}
