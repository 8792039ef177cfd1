use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use polyscan::{Config, Extent, PolyScan, Rectangle, Vertex};

#[derive(Default)]
struct Counter {
    calls: AtomicUsize,
}

fn count_extent(dest: &Arc<Counter>, _scanline: i32, _extent: &Extent, _extra: &(), _worker: usize) {
    dest.calls.fetch_add(1, Ordering::Relaxed);
}

fn tag_extent(dest: &Arc<TagCounter>, _scanline: i32, _extent: &Extent, extra: &u32, _worker: usize) {
    dest.calls.fetch_add(1, Ordering::Relaxed);
    dest.tag_sum.fetch_add(*extra as usize, Ordering::Relaxed);
}

#[derive(Default)]
struct TagCounter {
    calls: AtomicUsize,
    tag_sum: AtomicUsize,
}

fn clip() -> Rectangle {
    Rectangle::new(0, 63, 0, 63)
}

fn render_ten_rows(engine: &mut PolyScan<Arc<Counter>, ()>, dest: &Arc<Counter>) {
    engine.render_triangle(
        Arc::clone(dest),
        &clip(),
        count_extent,
        0,
        &Vertex::new(0.0, 0.0),
        &Vertex::new(10.0, 0.0),
        &Vertex::new(0.0, 10.0),
    );
}

#[test]
fn wait_is_idempotent() {
    let dest = Arc::new(Counter::default());
    let mut engine: PolyScan<Arc<Counter>, ()> =
        PolyScan::new(Config { no_worker_pool: true, ..Config::default() });

    render_ten_rows(&mut engine, &dest);
    engine.wait("first");
    assert_eq!(dest.calls.load(Ordering::Relaxed), 10);

    // nothing queued: must deliver nothing more
    engine.wait("second");
    engine.wait("third");
    assert_eq!(dest.calls.load(Ordering::Relaxed), 10);

    // and the pools must be usable again
    render_ten_rows(&mut engine, &dest);
    engine.wait("fourth");
    assert_eq!(dest.calls.load(Ordering::Relaxed), 20);
}

#[test]
fn presave_flushes_queued_work() {
    let dest = Arc::new(Counter::default());
    let mut engine: PolyScan<Arc<Counter>, ()> =
        PolyScan::new(Config { workers: Some(2), ..Config::default() });

    for _ in 0..8 {
        render_ten_rows(&mut engine, &dest);
    }
    engine.presave();
    assert_eq!(dest.calls.load(Ordering::Relaxed), 80);
}

#[test]
fn drop_flushes_queued_work() {
    let dest = Arc::new(Counter::default());
    {
        let mut engine: PolyScan<Arc<Counter>, ()> =
            PolyScan::new(Config { workers: Some(2), ..Config::default() });
        for _ in 0..4 {
            render_ten_rows(&mut engine, &dest);
        }
    }
    assert_eq!(dest.calls.load(Ordering::Relaxed), 40);
}

#[test]
fn pool_exhaustion_is_transparent() {
    let dest = Arc::new(Counter::default());
    let mut engine: PolyScan<Arc<Counter>, ()> = PolyScan::new(Config {
        max_polys: 4,
        no_worker_pool: true,
        ..Config::default()
    });

    for _ in 0..20 {
        render_ten_rows(&mut engine, &dest);
    }
    engine.wait("end");

    assert_eq!(dest.calls.load(Ordering::Relaxed), 200);
    let stats = engine.stats();
    assert_eq!(stats.polygons, 20);
    assert!(stats.polygon_waits >= 1);
    assert!(stats.polygon_max <= 4);
}

#[test]
fn pool_exhaustion_with_workers() {
    let dest = Arc::new(Counter::default());
    let mut engine: PolyScan<Arc<Counter>, ()> = PolyScan::new(Config {
        max_polys: 4,
        workers: Some(2),
        ..Config::default()
    });

    for _ in 0..20 {
        render_ten_rows(&mut engine, &dest);
    }
    engine.wait("end");

    assert_eq!(dest.calls.load(Ordering::Relaxed), 200);
    assert!(engine.stats().polygon_waits >= 1);
}

#[test]
fn extra_data_carries_across_drains() {
    let dest = Arc::new(TagCounter::default());
    let mut engine: PolyScan<Arc<TagCounter>, u32> =
        PolyScan::new(Config { no_worker_pool: true, ..Config::default() });

    *engine.extra_data() = 7;
    engine.render_triangle(
        Arc::clone(&dest),
        &clip(),
        tag_extent,
        0,
        &Vertex::new(0.0, 0.0),
        &Vertex::new(10.0, 0.0),
        &Vertex::new(0.0, 10.0),
    );
    engine.wait("first");
    assert_eq!(dest.calls.load(Ordering::Relaxed), 10);
    assert_eq!(dest.tag_sum.load(Ordering::Relaxed), 70);

    // no new block reserved: the drained one must still be visible
    engine.render_triangle(
        Arc::clone(&dest),
        &clip(),
        tag_extent,
        0,
        &Vertex::new(0.0, 0.0),
        &Vertex::new(10.0, 0.0),
        &Vertex::new(0.0, 10.0),
    );
    engine.wait("second");
    assert_eq!(dest.tag_sum.load(Ordering::Relaxed), 140);

    // a fresh block replaces it
    *engine.extra_data() = 9;
    engine.render_triangle(
        Arc::clone(&dest),
        &clip(),
        tag_extent,
        0,
        &Vertex::new(0.0, 0.0),
        &Vertex::new(10.0, 0.0),
        &Vertex::new(0.0, 10.0),
    );
    engine.wait("third");
    assert_eq!(dest.tag_sum.load(Ordering::Relaxed), 140 + 90);
}

#[test]
fn extra_pool_exhaustion_is_transparent() {
    let dest = Arc::new(TagCounter::default());
    let mut engine: PolyScan<Arc<TagCounter>, u32> = PolyScan::new(Config {
        max_polys: 4,
        no_worker_pool: true,
        ..Config::default()
    });

    let mut expected_sum = 0usize;
    for tag in 0..12u32 {
        *engine.extra_data() = tag;
        engine.render_triangle(
            Arc::clone(&dest),
            &clip(),
            tag_extent,
            0,
            &Vertex::new(0.0, 0.0),
            &Vertex::new(10.0, 0.0),
            &Vertex::new(0.0, 10.0),
        );
        expected_sum += tag as usize * 10;
    }
    engine.wait("end");

    assert_eq!(dest.calls.load(Ordering::Relaxed), 120);
    assert_eq!(dest.tag_sum.load(Ordering::Relaxed), expected_sum);
    assert!(engine.stats().extra_waits >= 1);
}

#[test]
fn stats_track_units_and_high_water_marks() {
    let dest = Arc::new(Counter::default());
    let mut engine: PolyScan<Arc<Counter>, ()> =
        PolyScan::new(Config { no_worker_pool: true, ..Config::default() });

    // ten rows from scanline 0 span buckets 0 and 1: two units
    render_ten_rows(&mut engine, &dest);
    let stats = engine.stats();
    assert_eq!(stats.polygons, 1);
    assert_eq!(stats.units, 2);
    assert_eq!(stats.polygon_max, 1);
    assert_eq!(stats.unit_max, 2);

    engine.wait("end");
    render_ten_rows(&mut engine, &dest);
    // totals grow, high-water marks do not
    let stats = engine.stats();
    assert_eq!(stats.polygons, 2);
    assert_eq!(stats.units, 4);
    assert_eq!(stats.polygon_max, 1);
    assert_eq!(stats.unit_max, 2);
}
