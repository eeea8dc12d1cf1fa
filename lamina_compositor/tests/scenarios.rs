// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end compositor scenarios against the software backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use lamina_backend_soft::{MemoryFramebuffer, PageFlipFramebuffer, VBlankTimer, VirtualOutput};
use lamina_compositor::{Compositor, CompositorConfig, CompositorThread, CycleOutcome};
use lamina_core::Error;
use lamina_core::geometry::{PixelPoint, PixelRect, PixelSize};
use lamina_core::pixel::Pixel;
use lamina_core::region::Region;
use lamina_core::surface::{Surface, SurfaceDesc, SurfaceId};
use lamina_core::timing::SyncOutcome;
use lamina_core::wake::{WakeReason, WakeSignal};
use lamina_core::zorder::{ZOrderDirectory, ZPosition};

const RED: Pixel = Pixel::opaque_rgb(255, 0, 0);
const GREEN: Pixel = Pixel::opaque_rgb(0, 255, 0);
const BLUE: Pixel = Pixel::opaque_rgb(0, 0, 255);

fn directory(width: i32, height: i32) -> Arc<ZOrderDirectory> {
    Arc::new(ZOrderDirectory::with_waker(
        PixelRect::new(0, 0, width, height),
        Arc::new(WakeSignal::new()),
    ))
}

fn memory_compositor(
    dir: &Arc<ZOrderDirectory>,
) -> (Compositor<MemoryFramebuffer>, lamina_backend_soft::FramebufferView) {
    let fb = MemoryFramebuffer::new(dir.screen().size()).unwrap();
    let view = fb.view();
    let compositor = Compositor::new(CompositorConfig::default(), Arc::clone(dir), fb).unwrap();
    (compositor, view)
}

fn paint(surface: &Surface, color: Pixel) {
    let mut pixels = surface.acquire_write().unwrap();
    pixels.fill(color);
    pixels.commit_all();
}

fn add(
    dir: &ZOrderDirectory,
    id: u32,
    rect: PixelRect,
    opaque: bool,
    color: Pixel,
) -> Arc<Surface> {
    let desc = if opaque {
        SurfaceDesc::opaque(SurfaceId(id), rect.origin(), rect.size())
    } else {
        SurfaceDesc::translucent(SurfaceId(id), rect.origin(), rect.size())
    };
    let surface = Arc::new(Surface::new(desc).unwrap());
    dir.insert(Arc::clone(&surface), ZPosition::Top).unwrap();
    paint(&surface, color);
    surface
}

fn settle<B: lamina_core::backend::PresentationBackend>(compositor: &mut Compositor<B>) {
    for _ in 0..8 {
        if compositor.run_cycle(WakeReason::Signaled) == CycleOutcome::Idle {
            return;
        }
    }
    panic!("compositor did not go idle");
}

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn stacked_surfaces_blend_back_to_front() {
    let dir = directory(100, 100);
    let (mut compositor, view) = memory_compositor(&dir);
    add(&dir, 1, PixelRect::new(0, 0, 100, 100), true, RED);
    add(&dir, 2, PixelRect::new(25, 25, 75, 75), true, GREEN);
    add(&dir, 3, PixelRect::new(50, 50, 100, 100), true, BLUE);
    dir.set_alpha(SurfaceId(3), 0.5).unwrap();

    let snapshot = dir.snapshot();
    let bottom = snapshot.get(SurfaceId(1)).unwrap();
    let mut expected = Region::from_rect(PixelRect::new(0, 0, 100, 100));
    expected.subtract_rect(PixelRect::new(25, 25, 75, 75));
    assert!(
        bottom.visible_region.coverage_eq(&expected),
        "a half-transparent surface hides nothing"
    );

    assert!(matches!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Presented { damage_area: 10_000, .. }
    ));
    assert_eq!(view.pixel(10, 10), Some(RED));
    assert_eq!(view.pixel(30, 30), Some(GREEN));
    assert_eq!(view.pixel(60, 60), Some(Pixel { b: 128, g: 127, r: 0, a: 255 }));
    assert_eq!(view.pixel(90, 90), Some(Pixel { b: 128, g: 0, r: 127, a: 255 }));
}

#[test]
fn unchanged_screen_is_never_presented() {
    let dir = directory(32, 32);
    let (mut compositor, view) = memory_compositor(&dir);
    add(&dir, 1, PixelRect::new(0, 0, 16, 16), true, RED);

    compositor.run_cycle(WakeReason::Signaled);
    assert_eq!(view.presents(), 1);
    for _ in 0..5 {
        assert_eq!(compositor.run_cycle(WakeReason::Timeout), CycleOutcome::Idle);
    }
    assert_eq!(view.presents(), 1, "idle cycles do not present");
    assert_eq!(compositor.stats().idle_cycles, 5);
}

#[test]
fn damage_committed_mid_session_is_kept_for_the_next_one() {
    let surface = Surface::new(SurfaceDesc::opaque(
        SurfaceId(1),
        PixelPoint::ORIGIN,
        PixelSize::new(64, 64),
    ))
    .unwrap();
    surface.invalidate(&Region::from_rect(PixelRect::new(20, 20, 30, 30)));

    let current = surface.begin_session();
    assert_eq!(current, Region::from_rect(PixelRect::new(20, 20, 30, 30)));
    surface
        .acquire_write()
        .unwrap()
        .commit_rect(PixelRect::new(0, 0, 10, 10));
    assert!(surface.end_session(), "damage arrived during the session");

    let next = surface.begin_session();
    assert_eq!(next, Region::from_rect(PixelRect::new(0, 0, 10, 10)));
    assert!(!surface.end_session());
}

#[test]
fn bypass_surface_is_excluded_from_the_presented_region() {
    let dir = directory(800, 600);
    let (mut compositor, view) = memory_compositor(&dir);
    add(&dir, 1, PixelRect::new(0, 0, 800, 600), true, RED);
    let fullscreen = PixelRect::new(0, 0, 640, 480);
    add(&dir, 2, fullscreen, true, GREEN);
    dir.set_bypass(SurfaceId(2), true).unwrap();

    let outcome = compositor.run_cycle(WakeReason::Signaled);
    assert!(
        matches!(
            outcome,
            CycleOutcome::Presented {
                damage_area: 172_800,
                ..
            }
        ),
        "got {outcome:?}"
    );
    let presented = view.last_region();
    assert!(!presented.intersects(&Region::from_rect(fullscreen)));
    assert_eq!(view.pixel(700, 500), Some(RED));
    assert_eq!(
        view.pixel(100, 100),
        Some(Pixel::TRANSPARENT),
        "the client scans out there"
    );
}

#[test]
fn concurrent_producer_never_loses_damage() {
    const BANDS: usize = 8;
    const BAND_HEIGHT: i32 = 8;

    let dir = directory(64, 64);
    let (mut compositor, view) = memory_compositor(&dir);
    let surface = add(&dir, 1, PixelRect::new(0, 0, 64, 64), true, Pixel::BLACK);
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let surface = Arc::clone(&surface);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut model = [Pixel::BLACK; BANDS];
            for i in 0..400_usize {
                let band = i % BANDS;
                let shade = u8::try_from(i % 251).unwrap();
                model[band] = Pixel::opaque_rgb(shade, 255 - shade, u8::try_from(band).unwrap());
                let mut pixels = loop {
                    match surface.acquire_write() {
                        Ok(pixels) => break pixels,
                        Err(err) if err.is_transient() => thread::yield_now(),
                        Err(err) => panic!("unexpected producer error: {err}"),
                    }
                };
                // Repaint the whole slot so every buffer matches the model.
                for (n, color) in model.iter().enumerate() {
                    let y0 = i32::try_from(n).unwrap() * BAND_HEIGHT;
                    pixels.fill_rect(PixelRect::new(0, y0, 64, y0 + BAND_HEIGHT), *color);
                }
                let y0 = i32::try_from(band).unwrap() * BAND_HEIGHT;
                pixels.commit_rect(PixelRect::new(0, y0, 64, y0 + BAND_HEIGHT));
            }
            done.store(true, Ordering::Release);
            model
        })
    };

    while !done.load(Ordering::Acquire) {
        compositor.run_cycle(WakeReason::Signaled);
    }
    let model = producer.join().unwrap();
    settle(&mut compositor);

    for (n, color) in model.iter().enumerate() {
        let y = i32::try_from(n).unwrap() * BAND_HEIGHT + 3;
        assert_eq!(view.pixel(10, y), Some(*color), "band {n} is current");
    }
    assert_eq!(compositor.stats().torn_reads, 0);
}

#[test]
fn presented_frames_are_never_torn() {
    let dir = directory(32, 32);
    let output = VirtualOutput::new(PixelSize::new(32, 32), 1024);
    let receiver = output.receiver();
    let mut compositor =
        Compositor::new(CompositorConfig::default(), Arc::clone(&dir), output).unwrap();
    let surface = add(&dir, 1, PixelRect::new(0, 0, 32, 32), true, Pixel::BLACK);

    let producer = {
        let surface = Arc::clone(&surface);
        thread::spawn(move || {
            for i in 0..200_u32 {
                let shade = u8::try_from(i % 256).unwrap();
                if let Ok(mut pixels) = surface.acquire_write() {
                    pixels.fill(Pixel::opaque_rgb(shade, shade, shade));
                    pixels.commit_all();
                }
            }
        })
    };
    while !producer.is_finished() {
        compositor.run_cycle(WakeReason::Signaled);
    }
    producer.join().unwrap();
    settle(&mut compositor);

    let records = receiver.drain();
    assert!(!records.is_empty());
    for record in &records {
        for part in &record.payload {
            let first = part.pixels[0];
            assert!(
                part.pixels.iter().all(|p| *p == first),
                "record {} mixes two commits",
                record.sequence
            );
        }
    }
}

#[test]
fn moving_a_surface_repaints_what_it_uncovered() {
    let dir = directory(64, 64);
    let (mut compositor, view) = memory_compositor(&dir);
    add(&dir, 1, PixelRect::new(0, 0, 16, 16), true, RED);
    compositor.run_cycle(WakeReason::Signaled);
    assert_eq!(view.pixel(4, 4), Some(RED));

    dir.move_to(SurfaceId(1), PixelPoint::new(32, 32)).unwrap();
    assert!(matches!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Presented { damage_area: 512, .. }
    ));
    assert_eq!(view.pixel(4, 4), Some(Pixel::BLACK), "background restored");
    assert_eq!(view.pixel(40, 40), Some(RED));
}

#[test]
fn visibility_partitions_every_snapshot() {
    let dir = directory(256, 256);
    let mut seed = 0x2545_f491_u32;
    let mut next = move |bound: u32| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        i32::try_from(seed % bound).unwrap()
    };

    for id in 1..=24 {
        let x = next(200);
        let y = next(200);
        let rect = PixelRect::new(x - 20, y - 20, x + next(80) + 1, y + next(80) + 1);
        let desc = if id % 3 == 0 {
            SurfaceDesc::translucent(SurfaceId(id), rect.origin(), rect.size())
        } else {
            SurfaceDesc::opaque(SurfaceId(id), rect.origin(), rect.size())
        };
        dir.insert(Arc::new(Surface::new(desc).unwrap()), ZPosition::Top)
            .unwrap();
        if id % 5 == 0 {
            dir.lower(SurfaceId(id)).unwrap();
        }
        if id % 7 == 0 {
            dir.set_hidden(SurfaceId(id - 1), true).unwrap();
        }
        dir.snapshot().verify_partition().unwrap();
    }
    for id in (1..=24).step_by(4) {
        dir.remove(SurfaceId(id)).unwrap();
        dir.snapshot().verify_partition().unwrap();
    }
}

#[test]
fn resize_round_trip_damages_the_whole_surface_once() {
    let dir = directory(200, 200);
    let (mut compositor, view) = memory_compositor(&dir);
    let desc = SurfaceDesc::opaque(SurfaceId(1), PixelPoint::ORIGIN, PixelSize::new(100, 100));
    let surface = compositor.create_surface(desc).unwrap();
    dir.insert(Arc::clone(&surface), ZPosition::Top).unwrap();
    paint(&surface, RED);
    settle(&mut compositor);

    assert!(
        compositor
            .resize_surface(&surface, PixelSize::new(150, 150))
            .unwrap()
    );
    assert!(
        compositor
            .resize_surface(&surface, PixelSize::new(100, 100))
            .unwrap()
    );
    assert_eq!(surface.size(), PixelSize::new(100, 100));
    assert_eq!(surface.committed_sequence(), 0, "sequences restart");

    let damage = surface.begin_session();
    assert_eq!(damage.area(), 10_000, "whole surface damaged");
    assert!(!surface.end_session(), "and only once");

    paint(&surface, GREEN);
    settle(&mut compositor);
    assert_eq!(view.pixel(50, 50), Some(GREEN));
    assert_eq!(view.pixel(120, 120), Some(Pixel::BLACK), "vacated area cleared");
}

#[test]
fn surface_mid_resize_is_skipped_then_recovered() {
    let dir = directory(40, 40);
    let (mut compositor, view) = memory_compositor(&dir);
    let surface = add(&dir, 1, PixelRect::new(0, 0, 20, 20), true, RED);
    settle(&mut compositor);

    let held = surface.acquire_write().unwrap();
    let resizer = {
        let surface = Arc::clone(&surface);
        thread::spawn(move || surface.resize(PixelSize::new(20, 20)))
    };
    assert!(eventually(|| matches!(
        surface.acquire_write(),
        Err(Error::ResizeInProgress)
    )));

    surface.invalidate_all();
    assert_eq!(compositor.run_cycle(WakeReason::Signaled), CycleOutcome::Idle);
    assert_eq!(compositor.stats().skipped_surfaces, 1);
    assert_eq!(view.pixel(5, 5), Some(RED), "previous pixels stay on screen");

    drop(held);
    resizer.join().unwrap().unwrap();
    paint(&surface, BLUE);
    settle(&mut compositor);
    assert_eq!(view.pixel(5, 5), Some(BLUE));
}

#[test]
fn repeated_present_failures_fall_back_to_the_topmost_surface() {
    let dir = directory(64, 64);
    let (mut compositor, view) = memory_compositor(&dir);
    add(&dir, 1, PixelRect::new(0, 0, 64, 64), true, RED);
    let top = add(&dir, 2, PixelRect::new(8, 8, 24, 24), true, GREEN);
    view.fail_next_presents(3);

    for attempt in 1..=3 {
        assert_eq!(
            compositor.run_cycle(WakeReason::Signaled),
            CycleOutcome::PresentFailed,
            "attempt {attempt}"
        );
    }
    assert!(compositor.is_fallback());
    assert_eq!(compositor.stats().consecutive_failures, 3);

    assert_eq!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Fallback { presented: true }
    );
    assert_eq!(view.pixel(10, 10), Some(GREEN));
    assert_eq!(
        view.pixel(40, 40),
        Some(Pixel::TRANSPARENT),
        "the fallback never paints below the topmost surface"
    );
    assert_eq!(view.last_region().area(), 256);

    assert_eq!(
        compositor.run_cycle(WakeReason::Timeout),
        CycleOutcome::Fallback { presented: false }
    );
    paint(&top, BLUE);
    assert_eq!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Fallback { presented: true }
    );
    assert_eq!(view.pixel(10, 10), Some(BLUE));
    assert_eq!(compositor.stats().fallback_frames, 2);
}

#[test]
fn disabled_compositing_starts_on_the_fallback_path() {
    let dir = directory(32, 32);
    let fb = MemoryFramebuffer::new(PixelSize::new(32, 32)).unwrap();
    let view = fb.view();
    let config = CompositorConfig {
        enabled: false,
        ..CompositorConfig::default()
    };
    let mut compositor = Compositor::new(config, Arc::clone(&dir), fb).unwrap();
    add(&dir, 1, PixelRect::new(0, 0, 8, 8), true, RED);

    assert!(compositor.is_fallback());
    assert_eq!(
        compositor.run_cycle(WakeReason::Signaled),
        CycleOutcome::Fallback { presented: true }
    );
    assert_eq!(view.pixel(2, 2), Some(RED));
}

#[test]
fn removed_surfaces_return_their_buffers_to_the_pool() {
    let dir = directory(64, 64);
    let (mut compositor, view) = memory_compositor(&dir);
    let desc = SurfaceDesc::opaque(SurfaceId(7), PixelPoint::ORIGIN, PixelSize::new(32, 32));
    let surface = compositor.create_surface(desc).unwrap();
    dir.insert(Arc::clone(&surface), ZPosition::Top).unwrap();
    paint(&surface, RED);
    settle(&mut compositor);
    assert_eq!(view.pixel(4, 4), Some(RED));

    drop(dir.remove(SurfaceId(7)).unwrap());
    assert!(matches!(surface.acquire_write(), Err(Error::Retired)));
    compositor.run_cycle(WakeReason::Signaled);
    assert_eq!(compositor.retired_pending(), 1, "a producer still holds it");
    assert_eq!(view.pixel(4, 4), Some(Pixel::BLACK), "removal exposes the area");

    drop(surface);
    compositor.run_cycle(WakeReason::Timeout);
    assert_eq!(compositor.retired_pending(), 0);
    assert_eq!(compositor.stats().reclaimed_surfaces, 1);
    assert_eq!(compositor.pool().len(), 2);
}

#[test]
fn threaded_engine_serves_surface_requests() {
    let dir = directory(64, 64);
    let fb = MemoryFramebuffer::new(PixelSize::new(64, 64)).unwrap();
    let view = fb.view();
    let compositor = Compositor::new(CompositorConfig::default(), Arc::clone(&dir), fb).unwrap();
    let handle = CompositorThread::spawn(compositor).unwrap();

    let desc = SurfaceDesc::opaque(SurfaceId(1), PixelPoint::new(4, 4), PixelSize::new(8, 8));
    let surface = handle.create_surface(desc).unwrap();
    dir.insert(Arc::clone(&surface), ZPosition::Top).unwrap();
    paint(&surface, RED);
    assert!(eventually(|| view.pixel(6, 6) == Some(RED)), "first frame");

    handle
        .resize_surface(&surface, PixelSize::new(32, 32))
        .unwrap();
    paint(&surface, GREEN);
    assert!(eventually(|| view.pixel(30, 30) == Some(GREEN)), "resized frame");

    handle.request_full_repaint().unwrap();
    assert!(eventually(|| handle.stats().last_damage_area == 64 * 64));
    assert!(handle.stats().frames_presented >= 2);

    let compositor = handle.shutdown().unwrap();
    assert!(compositor.frame_index() > 0);
}

#[test]
fn failing_backend_is_retried_at_the_refresh_rate() {
    let dir = directory(32, 32);
    let fb = MemoryFramebuffer::new(PixelSize::new(32, 32)).unwrap();
    let view = fb.view();
    view.fail_next_presents(u32::MAX);
    let config = CompositorConfig {
        refresh_interval_ns: 10_000_000,
        ..CompositorConfig::default()
    };
    let compositor = Compositor::new(config, Arc::clone(&dir), fb).unwrap();
    let handle = CompositorThread::spawn(compositor).unwrap();
    add(&dir, 1, PixelRect::new(0, 0, 16, 16), true, RED);

    let started = Instant::now();
    assert!(eventually(|| handle.stats().fallback), "compositing disabled");
    thread::sleep(Duration::from_millis(200));
    let stats = handle.stats();
    let elapsed = started.elapsed().as_millis();
    let paced = u64::try_from(elapsed / 10).unwrap();
    assert!(
        stats.present_failures <= paced + 5,
        "{} failed presents in {elapsed} ms",
        stats.present_failures
    );
    assert_eq!(stats.fallback_frames, 0);
    drop(handle);
}

#[test]
fn threaded_resize_does_not_stall_composition() {
    let dir = directory(64, 64);
    let fb = MemoryFramebuffer::new(PixelSize::new(64, 64)).unwrap();
    let view = fb.view();
    let compositor = Compositor::new(CompositorConfig::default(), Arc::clone(&dir), fb).unwrap();
    let handle = Arc::new(CompositorThread::spawn(compositor).unwrap());

    let slow = add(&dir, 1, PixelRect::new(0, 0, 16, 16), true, RED);
    let other = add(&dir, 2, PixelRect::new(32, 32, 48, 48), true, RED);
    assert!(eventually(|| view.pixel(40, 40) == Some(RED)), "first frame");

    let held = slow.acquire_write().unwrap();
    let resizer = {
        let handle = Arc::clone(&handle);
        let slow = Arc::clone(&slow);
        thread::spawn(move || handle.resize_surface(&slow, PixelSize::new(24, 24)))
    };
    assert!(eventually(|| matches!(
        slow.acquire_write(),
        Err(Error::ResizeInProgress)
    )));

    paint(&other, GREEN);
    assert!(
        eventually(|| view.pixel(40, 40) == Some(GREEN)),
        "other surfaces keep compositing while the resize waits"
    );
    assert!(!resizer.is_finished(), "resize waits for the producer");

    drop(held);
    resizer.join().unwrap().unwrap();
    assert_eq!(slow.size(), PixelSize::new(24, 24));
    paint(&slow, BLUE);
    assert!(eventually(|| view.pixel(20, 20) == Some(BLUE)), "resized frame");
}

#[test]
fn page_flip_backend_reports_tear_free_frames() {
    let dir = directory(16, 16);
    let timer = VBlankTimer::start(Duration::from_millis(1)).unwrap();
    let fb = PageFlipFramebuffer::new(PixelSize::new(16, 16))
        .unwrap()
        .with_vblank(timer);
    let config = CompositorConfig {
        refresh_interval_ns: 1_000_000_000,
        ..CompositorConfig::default()
    };
    let mut compositor = Compositor::new(config, Arc::clone(&dir), fb).unwrap();
    add(&dir, 1, PixelRect::new(0, 0, 16, 16), true, GREEN);

    let outcome = compositor.run_cycle(WakeReason::Signaled);
    assert_eq!(
        outcome,
        CycleOutcome::Presented {
            damage_area: 256,
            sync: SyncOutcome::VBlank
        }
    );
    assert_eq!(compositor.backend().flips(), 1);
    assert_eq!(compositor.backend().front_buffer().get(3, 3), Some(GREEN));
    assert_eq!(compositor.stats().tear_free_frames, 1);
}
