use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use polyscan::{Config, Extent, Job, PolyScan, Rectangle, Vertex, WorkerPool};

const ROWS: usize = 16;
const POLYS: u32 = 96;

struct OrderLog {
    rows: Vec<Mutex<Vec<u32>>>,
}

impl OrderLog {
    fn new() -> Self {
        OrderLog {
            rows: (0..ROWS).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }
}

fn log_tag(dest: &Arc<OrderLog>, scanline: i32, _extent: &Extent, extra: &u32, _worker: usize) {
    dest.rows[scanline as usize].lock().unwrap().push(*extra);
}

fn run_overlap_burst(config: Config) {
    run_overlap_burst_on(PolyScan::new(config));
}

/// Queue POLYS overlapping triangles, each tagged through its extra-data
/// block, and check that every row saw the tags in submission order.
fn run_overlap_burst_on(mut engine: PolyScan<Arc<OrderLog>, u32>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let log = Arc::new(OrderLog::new());
    let clip = Rectangle::new(0, 63, 0, 63);

    for tag in 0..POLYS {
        *engine.extra_data() = tag;
        engine.render_triangle(
            Arc::clone(&log),
            &clip,
            log_tag,
            0,
            &Vertex::new(0.0, 0.0),
            &Vertex::new(16.0, 0.0),
            &Vertex::new(0.0, 16.0),
        );
    }
    engine.wait("end of burst");

    let expected: Vec<u32> = (0..POLYS).collect();
    for (rownum, row) in log.rows.iter().enumerate() {
        let seen = row.lock().unwrap();
        assert_eq!(seen.as_slice(), expected.as_slice(), "row {}", rownum);
    }

    let stats = engine.stats();
    assert_eq!(stats.polygons, POLYS as u64);
    assert!(stats.chain_resolved <= stats.chain_conflicts);
}

#[test]
fn overlapping_rows_deliver_in_submission_order() {
    run_overlap_burst(Config {
        max_polys: 256,
        workers: Some(4),
        ..Config::default()
    });
}

#[test]
fn order_survives_mid_burst_drains() {
    // a pool this small forces several drains inside the burst
    run_overlap_burst(Config {
        max_polys: 8,
        workers: Some(4),
        ..Config::default()
    });
}

#[test]
fn order_holds_without_a_worker_pool() {
    run_overlap_burst(Config {
        max_polys: 256,
        no_worker_pool: true,
        ..Config::default()
    });
}

fn render_strip(engine: &mut PolyScan<Arc<OrderLog>, u32>, log: &Arc<OrderLog>, clip: &Rectangle, top: f32) {
    engine.render_triangle(
        Arc::clone(log),
        clip,
        log_tag,
        0,
        &Vertex::new(0.0, top),
        &Vertex::new(40.0, top),
        &Vertex::new(0.0, top + 8.0),
    );
}

#[test]
fn disjoint_rows_still_all_arrive() {
    // stacked strips touch different buckets; no ordering between them,
    // but nothing may be lost
    let _ = env_logger::builder().is_test(true).try_init();
    let log = Arc::new(OrderLog::new());
    let clip = Rectangle::new(0, 63, 0, 63);
    let mut engine: PolyScan<Arc<OrderLog>, u32> =
        PolyScan::new(Config { workers: Some(4), ..Config::default() });

    for strip in 0..2u32 {
        *engine.extra_data() = strip;
        render_strip(&mut engine, &log, &clip, (strip * 8) as f32);
    }
    engine.wait("end of strips");

    for rownum in 0..ROWS {
        let seen = log.rows[rownum].lock().unwrap();
        assert_eq!(seen.len(), 1, "row {}", rownum);
        assert_eq!(seen[0], (rownum / 8) as u32);
    }
}

/// Bare-bones pool spawning one thread per job, with a round-robin
/// worker index
struct ThreadPerJob {
    workers: usize,
    spawned: AtomicUsize,
}

impl WorkerPool for ThreadPerJob {
    fn spawn(&self, job: Job) {
        let worker = self.spawned.fetch_add(1, Ordering::Relaxed) % self.workers;
        thread::spawn(move || job(worker));
    }
    fn num_threads(&self) -> usize {
        self.workers
    }
}

#[test]
fn supplied_pools_drive_the_engine() {
    // same burst, but scheduled by a pool the engine knows nothing about
    let pool = Arc::new(ThreadPerJob { workers: 4, spawned: AtomicUsize::new(0) });
    let engine: PolyScan<Arc<OrderLog>, u32> =
        PolyScan::with_worker_pool(Config { max_polys: 256, ..Config::default() }, pool);
    assert_eq!(engine.workers(), 4);
    run_overlap_burst_on(engine);
}
