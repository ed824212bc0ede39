//! Property tests for the frame driver against the mock backend

use ash::vk;

use super::mock::{
    AcquireScript, Event, MockBackend, MockFence, MockWindow, PresentScript, RecordingHook,
};
use crate::config::PresentConfig;
use crate::render::frame::{FrameDriver, FrameState, PresentError, SurfaceExtent};

type MockDriver = FrameDriver<MockBackend, MockWindow, RecordingHook>;

fn config(frames_in_flight: usize) -> PresentConfig {
    PresentConfig {
        max_frames_in_flight: frames_in_flight,
        fence_timeout_ns: 5_000_000,
        ..PresentConfig::default()
    }
}

fn driver_with(frames_in_flight: usize, backend: &MockBackend) -> MockDriver {
    FrameDriver::new(
        backend.clone(),
        MockWindow::new(1280, 720),
        RecordingHook::default(),
        &config(frames_in_flight),
    )
    .unwrap()
}

fn assert_clean(backend: &MockBackend) {
    let violations = backend.violations();
    assert!(violations.is_empty(), "violations: {violations:#?}");
}

fn submits(events: &[Event]) -> Vec<(usize, u32, u64, MockFence)> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, event)| match event {
            Event::Submit { image, generation, fence } => Some((i, *image, *generation, *fence)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_frames_advance_slots() {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);

    for _ in 0..5 {
        driver.run_frame().unwrap();
    }

    assert_eq!(driver.stats().frames_completed, 5);
    assert_eq!(driver.stats().frames_presented, 5);
    assert_eq!(driver.frame_slot(), 1);
    assert_eq!(driver.state(), FrameState::Idle);
    assert_eq!(driver.stats().recreations, 0);
    assert_clean(&backend);
}

#[test]
fn test_in_flight_work_is_bounded_by_slot_count() {
    for frames_in_flight in 1..=3 {
        let backend = MockBackend::new();
        backend.set_image_count(4);
        let mut driver = driver_with(frames_in_flight, &backend);

        for _ in 0..20 {
            driver.run_frame().unwrap();
        }

        assert!(
            backend.max_in_flight() <= frames_in_flight,
            "{} submissions in flight with N = {frames_in_flight}",
            backend.max_in_flight()
        );
        assert_clean(&backend);
    }

    // With M a multiple of N every image stays on one slot, so the ring is the only limit
    let backend = MockBackend::new();
    backend.set_image_count(4);
    let mut driver = driver_with(2, &backend);
    for _ in 0..10 {
        driver.run_frame().unwrap();
    }
    assert_eq!(backend.max_in_flight(), 2);
}

#[test]
fn test_image_reuse_waits_for_the_other_slot() {
    let backend = MockBackend::new();
    backend.script_acquire([
        AcquireScript::Image(0),
        AcquireScript::Image(1),
        AcquireScript::Image(0),
    ]);
    let mut driver = driver_with(3, &backend);

    for _ in 0..3 {
        driver.run_frame().unwrap();
    }

    let events = backend.events();
    let submits = submits(&events);
    let (_, _, _, first_fence) = submits[0];
    let (third_submit, third_image, _, third_fence) = submits[2];
    assert_eq!(third_image, 0);
    assert_ne!(first_fence, third_fence);

    let third_acquire = events[..third_submit]
        .iter()
        .rposition(|event| matches!(event, Event::Acquire { .. }))
        .unwrap();
    assert!(events[third_acquire..third_submit].contains(&Event::WaitFence(first_fence)));
    assert_eq!(driver.stats().image_handoff_waits, 1);
    assert_clean(&backend);
}

#[test]
fn test_fence_reset_only_after_wait_and_acquire() {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);
    for _ in 0..6 {
        driver.run_frame().unwrap();
    }

    let events = backend.events();
    for (submit, _, _, fence) in submits(&events) {
        let reset = events[..submit]
            .iter()
            .rposition(|event| *event == Event::ResetFence(fence))
            .unwrap();
        let wait = events[..reset]
            .iter()
            .rposition(|event| *event == Event::WaitFence(fence))
            .unwrap();
        let acquire = events[..submit]
            .iter()
            .rposition(|event| matches!(event, Event::Acquire { .. }))
            .unwrap();
        assert!(wait < acquire && acquire < reset, "bad order around event {submit}");
    }
    assert_clean(&backend);
}

#[test]
fn test_out_of_date_acquire_skips_the_frame() {
    let backend = MockBackend::new();
    backend.script_acquire([AcquireScript::OutOfDate]);
    let mut driver = driver_with(2, &backend);

    driver.run_frame().unwrap();

    let stats = driver.stats();
    assert_eq!(stats.out_of_date_acquires, 1);
    assert_eq!(stats.recreations, 1);
    assert_eq!(stats.frames_completed, 0);
    assert_eq!(driver.frame_slot(), 0);

    let events = backend.events();
    assert!(!events.iter().any(|e| matches!(e, Event::ResetFence(_) | Event::Submit { .. })));

    driver.run_frame().unwrap();
    assert_eq!(driver.stats().frames_completed, 1);
    assert_eq!(driver.frame_slot(), 1);
    assert_clean(&backend);
}

#[test]
fn test_recreation_is_atomic() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::Optimal, PresentScript::OutOfDate]);
    let mut driver = driver_with(2, &backend);

    for _ in 0..4 {
        driver.run_frame().unwrap();
    }

    let builds = backend.builds();
    assert_eq!(builds.iter().map(|(g, _)| *g).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(driver.generation().value(), 1);
    assert_eq!(backend.live_generation(), Some(1));

    let events = backend.events();
    let destroy = events
        .iter()
        .position(|e| *e == Event::Destroy { generation: 0 })
        .unwrap();
    let rebuild = events
        .iter()
        .position(|e| matches!(e, Event::Build { generation: 1, .. }))
        .unwrap();
    assert!(destroy < rebuild);
    assert_eq!(events[destroy - 1], Event::WaitIdle);

    for (index, _, generation, _) in submits(&events) {
        if index > rebuild {
            assert_eq!(generation, 1);
        }
    }
    // The recreation frame does not advance: 1 before, 2 after
    assert_eq!(driver.stats().frames_completed, 3);
    assert_eq!(driver.stats().frames_presented, 3);
    assert_eq!(driver.hook().rebuilds, vec![0, 1]);
    assert_eq!(backend.wait_idle_calls(), 1);
    assert_clean(&backend);
}

#[test]
fn test_rebuild_clears_image_tracking() {
    let backend = MockBackend::new();
    backend.script_acquire([
        AcquireScript::Image(0),
        AcquireScript::Image(1),
        AcquireScript::Image(0),
    ]);
    backend.script_present([PresentScript::Optimal, PresentScript::Suboptimal]);
    let mut driver = driver_with(2, &backend);

    for _ in 0..3 {
        driver.run_frame().unwrap();
    }

    // Slot 1 renders image 0 after the rebuild; the slot 0 record from the
    // old generation must not cause a hand-off wait
    assert_eq!(driver.stats().image_handoff_waits, 0);
    assert_eq!(driver.stats().recreations, 1);
    assert_clean(&backend);
}

#[test]
fn test_suboptimal_acquire_presents_then_rebuilds() {
    let backend = MockBackend::new();
    backend.script_acquire([AcquireScript::Suboptimal(1)]);
    let mut driver = driver_with(2, &backend);

    driver.run_frame().unwrap();

    let events = backend.events();
    let present = events
        .iter()
        .position(|e| *e == Event::Present { image: 1, generation: 0 })
        .unwrap();
    let rebuild = events
        .iter()
        .position(|e| matches!(e, Event::Build { generation: 1, .. }))
        .unwrap();
    assert!(present < rebuild);
    assert_eq!(driver.stats().frames_presented, 1);
    assert_eq!(driver.stats().frames_completed, 0);
    assert_eq!(driver.stats().recreations, 1);
    assert_clean(&backend);
}

#[test]
fn test_resize_flag_rebuilds_at_new_extent() {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);

    driver.window_mut().request_resize();
    driver.window_mut().queue_extents([(1024, 768)]);
    driver.run_frame().unwrap();

    let builds = backend.builds();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[1].1, SurfaceExtent::new(1024, 768));
    assert!(!driver.window().resize_pending());

    driver.run_frame().unwrap();
    assert_eq!(backend.builds().len(), 2);
    assert_clean(&backend);
}

#[test]
fn test_degenerate_extent_blocks_until_drawable() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::OutOfDate]);
    let mut driver = driver_with(2, &backend);
    driver
        .window_mut()
        .queue_extents([(0, 0), (0, 0), (0, 0), (800, 600)]);

    driver.run_frame().unwrap();

    assert_eq!(driver.window().wait_events_calls, 3);
    let builds = backend.builds();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[1].1, SurfaceExtent::new(800, 600));
    assert_clean(&backend);
}

#[test]
fn test_startup_waits_for_minimized_window() {
    let backend = MockBackend::new();
    let mut window = MockWindow::new(1280, 720);
    window.queue_extents([(0, 0), (0, 0), (640, 480)]);

    let driver =
        FrameDriver::new(backend.clone(), window, RecordingHook::default(), &config(2)).unwrap();

    assert_eq!(driver.window().wait_events_calls, 2);
    assert_eq!(backend.builds(), vec![(0, SurfaceExtent::new(640, 480))]);
}

#[test]
fn test_close_while_minimized_ends_cleanly() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::OutOfDate]);
    let mut driver = driver_with(2, &backend);
    driver.window_mut().queue_extents([(0, 0)]);
    driver.window_mut().close_on_wait();

    let result = driver.run_frame();
    assert!(matches!(result, Err(PresentError::WindowClosed)));
    assert!(driver.resources().is_none());

    driver.shutdown().unwrap();
    assert_eq!(backend.live_generation(), None);
    assert_eq!(backend.live_fences(), 0);
    assert_clean(&backend);
}

fn shutdown_after(frames: usize) {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);
    for _ in 0..frames {
        driver.run_frame().unwrap();
    }

    driver.shutdown().unwrap();

    assert_eq!(driver.state(), FrameState::ShutDown);
    assert_eq!(backend.pending_submissions(), 0);
    assert_eq!(backend.live_fences(), 0);
    assert_eq!(backend.live_semaphores(), 0);
    assert_eq!(backend.fences_created(), backend.fences_destroyed());
    assert_eq!(backend.semaphores_created(), backend.semaphores_destroyed());
    assert_eq!(backend.live_generation(), None);
    assert_clean(&backend);

    let events_before = backend.events().len();
    driver.shutdown().unwrap();
    assert_eq!(backend.events().len(), events_before);
    assert!(matches!(driver.run_frame(), Err(PresentError::ShutDown)));
    drop(driver);
    assert_eq!(backend.events().len(), events_before);
    assert_clean(&backend);
}

#[test]
fn test_shutdown_without_frames() {
    shutdown_after(0);
}

#[test]
fn test_shutdown_after_one_frame() {
    shutdown_after(1);
}

#[test]
fn test_shutdown_after_wrapping_the_ring() {
    shutdown_after(3);
}

#[test]
fn test_drop_shuts_down() {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);
    driver.run_frame().unwrap();
    drop(driver);

    assert_eq!(backend.pending_submissions(), 0);
    assert_eq!(backend.live_fences(), 0);
    assert_eq!(backend.live_semaphores(), 0);
    assert_eq!(backend.live_generation(), None);
    assert_clean(&backend);
}

#[test]
fn test_shutdown_releases_even_if_idle_wait_fails() {
    let backend = MockBackend::new();
    let mut driver = driver_with(2, &backend);
    driver.run_frame().unwrap();
    backend.fail_wait_idle_with(vk::Result::ERROR_DEVICE_LOST);

    assert!(matches!(
        driver.shutdown(),
        Err(PresentError::Api {
            result: vk::Result::ERROR_DEVICE_LOST,
            ..
        })
    ));
    assert_eq!(backend.live_fences(), 0);
    assert_eq!(backend.live_generation(), None);
    assert!(driver.shutdown().is_ok());
}

#[test]
fn test_fatal_acquire_error_surfaces() {
    let backend = MockBackend::new();
    backend.script_acquire([AcquireScript::Fail(vk::Result::ERROR_DEVICE_LOST)]);
    let mut driver = driver_with(2, &backend);

    let err = driver.run_frame().unwrap_err();
    assert!(matches!(
        err,
        PresentError::Api {
            operation: "vkAcquireNextImageKHR",
            result: vk::Result::ERROR_DEVICE_LOST
        }
    ));
    assert!(!backend.events().iter().any(|e| matches!(e, Event::ResetFence(_))));
    driver.shutdown().unwrap();
    assert_clean(&backend);
}

#[test]
fn test_fatal_present_error_surfaces() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::Fail(vk::Result::ERROR_SURFACE_LOST_KHR)]);
    let mut driver = driver_with(2, &backend);

    assert!(matches!(
        driver.run_frame(),
        Err(PresentError::Api {
            operation: "vkQueuePresentKHR",
            result: vk::Result::ERROR_SURFACE_LOST_KHR
        })
    ));
    assert_eq!(driver.stats().recreations, 0);
    driver.shutdown().unwrap();
}

#[test]
fn test_submit_failure_surfaces() {
    let backend = MockBackend::new();
    backend.fail_submit_with(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
    let mut driver = driver_with(2, &backend);

    assert!(matches!(
        driver.run_frame(),
        Err(PresentError::Api {
            operation: "vkQueueSubmit",
            ..
        })
    ));
    driver.shutdown().unwrap();
    assert_eq!(backend.live_fences(), 0);
}

#[test]
fn test_rebuild_failure_is_terminal() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::OutOfDate]);
    let mut driver = driver_with(2, &backend);
    backend.fail_next_builds(1);

    let err = driver.run_frame().unwrap_err();
    match err {
        PresentError::RecreationFailed(inner) => {
            assert!(matches!(*inner, PresentError::NoCompatibleConfiguration(_)));
        }
        other => panic!("expected RecreationFailed, got {other:?}"),
    }
    assert!(driver.resources().is_none());
    assert_eq!(backend.live_generation(), None);
    assert_eq!(driver.state(), FrameState::Failed);

    let builds = backend.builds();
    let idle_waits = backend.wait_idle_calls();
    let events = backend.events().len();

    // Later frames report the halt without touching the backend again
    assert!(matches!(driver.run_frame(), Err(PresentError::Halted)));
    assert!(matches!(driver.run_frame(), Err(PresentError::Halted)));
    assert_eq!(backend.builds(), builds);
    assert_eq!(backend.wait_idle_calls(), idle_waits);
    assert_eq!(backend.events().len(), events);
    assert!(driver.resources().is_none());

    driver.shutdown().unwrap();
    assert_eq!(driver.state(), FrameState::ShutDown);
    assert_clean(&backend);
}

#[test]
fn test_startup_build_failure_releases_the_ring() {
    let backend = MockBackend::new();
    backend.fail_next_builds(1);

    let result = FrameDriver::new(
        backend.clone(),
        MockWindow::new(800, 600),
        RecordingHook::default(),
        &config(2),
    );

    assert!(matches!(result, Err(PresentError::NoCompatibleConfiguration(_))));
    assert_eq!(backend.fences_created(), 2);
    assert_eq!(backend.live_fences(), 0);
    assert_eq!(backend.live_semaphores(), 0);
    assert_clean(&backend);
}

#[test]
fn test_invalid_config_rejected() {
    let backend = MockBackend::new();
    let result = FrameDriver::new(
        backend.clone(),
        MockWindow::new(800, 600),
        RecordingHook::default(),
        &config(0),
    );
    assert!(matches!(result, Err(PresentError::InitializationFailed(_))));
    assert_eq!(backend.fences_created(), 0);
}

#[test]
fn test_fence_timeout_is_fatal() {
    let backend = MockBackend::new();
    let mut driver = driver_with(1, &backend);
    driver.run_frame().unwrap();
    backend.hang_gpu();

    assert!(matches!(
        driver.run_frame(),
        Err(PresentError::FenceTimeout { timeout_ns: 5_000_000 })
    ));
    driver.shutdown().unwrap();
    assert_clean(&backend);
}

#[test]
fn test_out_of_range_image_index_is_fatal() {
    let backend = MockBackend::new();
    backend.script_acquire([AcquireScript::Image(7)]);
    let mut driver = driver_with(2, &backend);

    assert!(matches!(
        driver.run_frame(),
        Err(PresentError::InvalidImageIndex {
            index: 7,
            image_count: 3
        })
    ));
    driver.shutdown().unwrap();
}

#[test]
fn test_hook_runs_once_per_submitted_frame() {
    let backend = MockBackend::new();
    backend.script_present([PresentScript::Optimal, PresentScript::Suboptimal]);
    let mut driver = driver_with(2, &backend);

    for _ in 0..4 {
        driver.run_frame().unwrap();
    }

    let calls = &driver.hook().calls;
    assert_eq!(calls.len(), 4);
    assert_eq!(calls.iter().map(|c| c.frame_number).collect::<Vec<_>>(), vec![0, 1, 1, 2]);
    assert_eq!(calls.iter().map(|c| c.slot).collect::<Vec<_>>(), vec![0, 1, 1, 0]);
    assert!(calls[..2].iter().all(|c| c.generation == 0));
    assert!(calls[2..].iter().all(|c| c.generation == 1));

    let writes = &driver.resources().unwrap().uniform_writes;
    assert_eq!(writes.len(), 2);
    assert_clean(&backend);
}

#[test]
fn test_hook_failure_is_fatal() {
    let backend = MockBackend::new();
    let hook = RecordingHook {
        fail_on_frame: Some(1),
        ..RecordingHook::default()
    };
    let mut driver =
        FrameDriver::new(backend.clone(), MockWindow::new(800, 600), hook, &config(2)).unwrap();

    driver.run_frame().unwrap();
    assert!(driver.run_frame().is_err());
    driver.shutdown().unwrap();
    assert_eq!(backend.live_fences(), 0);
}
