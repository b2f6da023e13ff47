//! Whole-search scenarios through the public API
//!
//! Drives the partition manager and the dispatcher directly (no sockets) to
//! check the allocation guarantees over complete searches.

use std::collections::BTreeMap;

use rainbow::rainbow_core::{
    Alphabet, Interval, KeySpace, PartitionManager, SchedulerMessage, SearchConfig, WorkerId,
    WorkerMessage,
};
use rainbow::rainbow_scheduler::{Dispatcher, DispatcherState, QueryOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const TARGET: &str = "098f6bcd4621d373cade4e832627b4f6";

fn lowercase_manager(block_size: u32, max_string_length: u32) -> PartitionManager {
    let keyspace = KeySpace::with_block_size(Alphabet::lowercase(), block_size).unwrap();
    PartitionManager::new(keyspace, max_string_length).unwrap()
}

#[test]
fn test_plaintext_addressing() {
    let keyspace = KeySpace::with_block_size(Alphabet::lowercase(), 100).unwrap();
    assert_eq!(keyspace.text_at(1, 0, 0).unwrap(), "a");
    assert_eq!(keyspace.text_at(2, 0, 27).unwrap(), "bb");
    assert_eq!(keyspace.text_at(3, 175, 75).unwrap(), "zzz");
    assert!(keyspace.text_at(3, 175, 76).is_err());

    // Every block's texts are exactly the block's slice of the keyspace
    let texts: Vec<String> = (0..keyspace.number_of_blocks(2).unwrap())
        .flat_map(|block| keyspace.block_texts(2, block).unwrap().collect::<Vec<_>>())
        .collect();
    assert_eq!(texts.len(), 676);
    assert_eq!(texts.first().map(String::as_str), Some("aa"));
    assert_eq!(texts.last().map(String::as_str), Some("zz"));
    assert!(texts.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_full_walk_with_large_requests() {
    let mut pm = lowercase_manager(100, 4);

    let issued: Vec<Interval> = pm.request_partitions(100, 100);
    assert_eq!(issued[0], Interval::new(1, 0, 1));
    assert_eq!(issued[1], Interval::new(2, 0, 7));
    assert_eq!(issued[2], Interval::new(3, 0, 100));
    assert_eq!(issued[3], Interval::new(3, 100, 176));
    // 26^4 = 456976 plaintexts = 4570 blocks
    assert_eq!(issued.last(), Some(&Interval::new(4, 4500, 4570)));
    assert_eq!(issued.len(), 4 + 46);
    assert_eq!(pm.request_partition(100), None);
    assert!(pm.is_exhausted());
}

#[test]
fn test_failures_reissued_before_fresh_work() {
    let mut pm = lowercase_manager(100, 8);
    let issued = pm.request_partitions(100, 10);
    let third = issued[3];
    let seventh = issued[7];

    for (i, interval) in issued.iter().enumerate() {
        if i == 3 || i == 7 {
            assert!(pm.notify_failure(interval));
        } else {
            pm.notify_complete(interval).unwrap();
        }
    }

    assert_eq!(pm.request_partition(100), Some(third));
    assert_eq!(pm.request_partition(100), Some(seventh));
    assert_eq!(pm.request_partition(100), Some(Interval::new(4, 600, 700)));
}

#[test]
fn test_cache_and_work_lanes_partition_longest_length() {
    let keyspace = KeySpace::with_block_size(Alphabet::new("ab").unwrap(), 1).unwrap();
    let mut pm = PartitionManager::new(keyspace, 4).unwrap();

    let reserved = pm.request_cache(3).unwrap();
    pm.notify_cache(&reserved).unwrap();
    pm.notify_cache(&Interval::new(4, 8, 10)).unwrap();

    let mut covered = vec![false; 16];
    for interval in pm.cached().iter() {
        for block in interval.start..interval.end {
            covered[block as usize] = true;
        }
    }
    for interval in std::iter::from_fn(|| pm.request_partition(2)) {
        if interval.string_length != 4 {
            continue;
        }
        for block in interval.start..interval.end {
            assert!(!covered[block as usize], "block {} handed out twice", block);
            covered[block as usize] = true;
        }
    }
    assert!(covered.into_iter().all(|c| c));
}

/// Simulated worker pool driving a dispatcher through a whole search
struct Simulation {
    dispatcher: Dispatcher,
    workers: BTreeMap<WorkerId, UnboundedReceiver<SchedulerMessage>>,
    held: BTreeMap<WorkerId, Vec<Interval>>,
    completed: Vec<Interval>,
    next_worker: WorkerId,
}

impl Simulation {
    fn new(config: SearchConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(&config).unwrap(),
            workers: BTreeMap::new(),
            held: BTreeMap::new(),
            completed: Vec::new(),
            next_worker: 1,
        }
    }

    fn connect(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_worker;
        self.next_worker += 1;
        self.dispatcher.worker_connected(id, tx);
        self.workers.insert(id, rx);
        self.held.insert(id, Vec::new());
        self.pump();
    }

    fn disconnect(&mut self, id: WorkerId) {
        self.workers.remove(&id);
        self.held.remove(&id);
        self.dispatcher.worker_disconnected(id);
        self.pump();
    }

    /// Move queued work into each worker's held list
    fn pump(&mut self) {
        for (id, rx) in self.workers.iter_mut() {
            while let Ok(message) = rx.try_recv() {
                match message {
                    SchedulerMessage::WorkBlockSetup {
                        string_length,
                        start,
                        end,
                        ..
                    } => self
                        .held
                        .entry(*id)
                        .or_default()
                        .push(Interval::new(string_length, start, end)),
                    SchedulerMessage::StopQuery { .. } => {
                        self.held.entry(*id).or_default().clear();
                    }
                    _ => {}
                }
            }
        }
    }

    fn complete_one(&mut self, id: WorkerId) -> bool {
        let Some(interval) = self.held.get_mut(&id).and_then(|held| held.pop()) else {
            return false;
        };
        self.completed.push(interval);
        self.dispatcher.worker_message(
            id,
            WorkerMessage::WorkBlockComplete {
                interval,
                query_id: None,
            },
        );
        self.pump();
        true
    }
}

#[test]
fn test_dispatcher_search_survives_churn() {
    let config = SearchConfig::default()
        .with_alphabet("abc")
        .with_block_size(3)
        .with_max_string_length(5)
        .with_work_size(2)
        .with_messages_buffered(3);
    let mut sim = Simulation::new(config);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    sim.connect();
    sim.connect();
    sim.dispatcher.request_query(TARGET, Default::default()).unwrap();
    sim.pump();

    let mut steps = 0;
    while sim.dispatcher.status().state == DispatcherState::Running {
        steps += 1;
        assert!(steps < 10_000, "search did not finish");

        let ids: Vec<WorkerId> = sim.workers.keys().copied().collect();
        match rng.gen_range(0..20) {
            0 if ids.len() > 1 => {
                let id = ids[rng.gen_range(0..ids.len())];
                sim.disconnect(id);
            }
            1 if ids.len() < 4 => sim.connect(),
            _ => {
                let id = ids[rng.gen_range(0..ids.len())];
                sim.complete_one(id);
            }
        }
    }

    assert_eq!(
        sim.dispatcher.status().last_outcome,
        Some(QueryOutcome::Exhausted { query_id: 0 })
    );

    // Every block searched exactly once, per length
    let pm = sim.dispatcher.partitions();
    for string_length in 1..=5 {
        let blocks = pm.number_of_blocks(string_length).unwrap();
        let mut seen = vec![0u32; blocks as usize];
        for interval in sim.completed.iter().filter(|i| i.string_length == string_length) {
            for block in interval.start..interval.end {
                seen[block as usize] += 1;
            }
        }
        assert!(
            seen.iter().all(|&count| count == 1),
            "length {} coverage: {:?}",
            string_length,
            seen
        );
    }
}

/// Glob-importing the umbrella crate leaves the built-in crate names usable
mod umbrella_glob {
    #[allow(unused_imports)]
    use rainbow::*;
    use core::cmp::max;
    use std::collections::BTreeSet;

    #[test]
    fn test_glob_import_keeps_builtin_crate_paths() {
        assert_eq!(max(3, 7), 7);
        assert!(BTreeSet::<u8>::new().is_empty());
    }
}
