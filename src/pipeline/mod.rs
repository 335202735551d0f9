//! Worker-thread scheduling around the gesture engine.
//!
//! The worker owns the frame source, the landmark detector and every piece of
//! per-hand state. The consumer only sees `FrameResult`s through a drop-oldest
//! channel.

#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod channel;
pub mod frame_ops;
pub mod replay;
pub mod skeleton;

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::{
    config::{Config, RoiConfig, SchedulerConfig},
    error::Error,
    gesture::{FrameAnalysis, GestureEngine},
    types::{Frame, FrameResult, Landmarks},
};

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, CameraSource, available_cameras};
pub use channel::{ResultReceiver, ResultSender, result_channel};
pub use replay::{Trace, TraceDetector, TraceSource};

const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Capture device. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn read(&mut self) -> Result<Option<Frame>>;

    fn frame_rate(&self) -> f32;
}

/// Hand-landmark model; at most one hand per frame.
pub trait LandmarkDetector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>>;

    fn close(&mut self) {}
}

/// Rolling mean of recent processing times.
pub struct LatencyTracker {
    samples: VecDeque<Duration>,
    window: usize,
}

impl LatencyTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    pub fn exceeds(&self, budget: Duration) -> bool {
        self.average() > budget
    }
}

/// Low-light mode with hysteresis between the on and off thresholds.
pub struct LowLightMonitor {
    enabled: bool,
    on_below: f32,
    off_above: f32,
}

impl LowLightMonitor {
    pub fn new(initial: bool, on_below: f32, off_above: f32) -> Self {
        Self {
            enabled: initial,
            on_below,
            off_above,
        }
    }

    /// Feeds one mean-luma sample and returns the resulting mode.
    pub fn observe(&mut self, luma: f32) -> bool {
        if !self.enabled && luma < self.on_below {
            log::info!("low light detected (luma {luma:.0}), enhancement on");
            self.enabled = true;
        } else if self.enabled && luma > self.off_above {
            log::info!("light recovered (luma {luma:.0}), enhancement off");
            self.enabled = false;
        }
        self.enabled
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Per-session scheduling state owned by the worker.
struct Scheduler {
    config: SchedulerConfig,
    roi: RoiConfig,
    latency: LatencyTracker,
    low_light: LowLightMonitor,
    skip_counter: u64,
    processed: u64,
    downscaled: bool,
}

impl Scheduler {
    fn new(config: &Config) -> Self {
        let scheduler = config.scheduler.clone();
        Self {
            latency: LatencyTracker::new(scheduler.latency_window),
            low_light: LowLightMonitor::new(
                scheduler.low_light_initial,
                scheduler.low_light_on,
                scheduler.low_light_off,
            ),
            roi: config.roi,
            config: scheduler,
            skip_counter: 0,
            processed: 0,
            downscaled: false,
        }
    }

    /// High-rate sources have every other frame dropped.
    fn should_skip(&mut self, source_fps: f32) -> bool {
        if source_fps <= self.config.skip_above_fps {
            return false;
        }
        self.skip_counter += 1;
        self.skip_counter % 2 != 0
    }

    fn process_frame(
        &mut self,
        frame: Frame,
        detector: &mut impl LandmarkDetector,
        engine: &mut GestureEngine,
    ) -> Result<FrameResult> {
        let (source_w, source_h) = (frame.width, frame.height);

        let downscale = self.latency.exceeds(self.config.latency_budget());
        if downscale != self.downscaled {
            log::debug!(
                "average latency {:?}, downscaling {}",
                self.latency.average(),
                if downscale { "on" } else { "off" }
            );
            self.downscaled = downscale;
        }
        let mut working = if downscale {
            frame_ops::scale(&frame, self.config.downscale_factor)?
        } else {
            frame
        };

        self.processed += 1;
        if self.processed % self.config.luminance_interval == 0 {
            match frame_ops::sampled_luma(&working) {
                Ok(luma) => {
                    self.low_light.observe(luma);
                }
                Err(err) => log::warn!("luminance sample failed: {err:#}"),
            }
        }
        frame_ops::enhance_low_light(&mut working, self.low_light.enabled());

        let landmarks = detector.detect(&working).context("landmark detection failed")?;
        let analysis = engine.process(landmarks.as_ref(), working.timestamp);
        self.draw_overlay(&mut working, &analysis);

        let timestamp = working.timestamp;
        let frame = if downscale {
            frame_ops::resize_rgba(&working, source_w, source_h)?
        } else {
            working
        };

        Ok(FrameResult {
            gesture: analysis.gesture,
            frame,
            pointer: analysis.pointer,
            landmarks: analysis.landmarks,
            timestamp,
        })
    }

    fn draw_overlay(&self, frame: &mut Frame, analysis: &FrameAnalysis) {
        if let Some(landmarks) = &analysis.landmarks {
            skeleton::draw_skeleton(frame, landmarks);
            skeleton::draw_roi(frame, &self.roi, analysis.in_roi);
        }
        skeleton::draw_label(frame, &analysis.gesture);
    }
}

/// Closes the detector and signals exit however the worker ends.
struct WorkerGuard<D: LandmarkDetector> {
    detector: D,
    done: Sender<()>,
}

impl<D: LandmarkDetector> Drop for WorkerGuard<D> {
    fn drop(&mut self) {
        self.detector.close();
        log::info!("gesture worker stopped");
        let _ = self.done.try_send(());
    }
}

fn run_worker_loop<S: FrameSource, D: LandmarkDetector>(
    source: &mut S,
    detector: &mut D,
    mut engine: GestureEngine,
    mut scheduler: Scheduler,
    results: ResultSender,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        let frame = match source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source exhausted");
                break;
            }
            Err(err) => {
                log::warn!("frame read failed: {err:#}");
                thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };

        if scheduler.should_skip(source.frame_rate()) {
            continue;
        }

        let started = Instant::now();
        match scheduler.process_frame(frame, detector, &mut engine) {
            Ok(result) => results.publish(result),
            Err(err) => log::warn!("frame processing failed: {err:#}"),
        }
        scheduler.latency.record(started.elapsed());
    }
}

/// Handle on a running worker.
pub struct Session {
    stop: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
    stop_timeout: Duration,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Requests a stop and waits up to `timeout`. Returns whether the worker
    /// exited in time; a late worker is left detached.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.shutdown(timeout)
    }

    /// Waits for the worker to end on its own, e.g. at end of stream.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("gesture worker panicked");
            }
        }
    }

    fn shutdown(&mut self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::error!("gesture worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("gesture worker did not stop within {timeout:?}");
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let timeout = self.stop_timeout;
        self.shutdown(timeout);
    }
}

/// Spawns the worker. `open_source` runs on the worker thread; its failure is
/// returned here as `Error::Device` and no session is started.
pub fn start_session<S, F, D>(
    open_source: F,
    detector: D,
    config: &Config,
    engine: GestureEngine,
) -> Result<(Session, ResultReceiver)>
where
    S: FrameSource + 'static,
    F: FnOnce() -> Result<S> + Send + 'static,
    D: LandmarkDetector,
{
    let (results_tx, results_rx) = result_channel(config.scheduler.channel_depth);
    let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);
    let (done_tx, done_rx) = bounded(1);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let scheduler = Scheduler::new(config);

    let handle = thread::Builder::new()
        .name("gesture-worker".into())
        .spawn(move || {
            let mut guard = WorkerGuard {
                detector,
                done: done_tx,
            };
            let mut source = match open_source() {
                Ok(source) => source,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("{err:#}")));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            log::info!("gesture worker started");

            run_worker_loop(
                &mut source,
                &mut guard.detector,
                engine,
                scheduler,
                results_tx,
                &stop_flag,
            );
        })
        .context("failed to spawn gesture worker")?;

    let opened = ready_rx
        .recv()
        .unwrap_or_else(|_| Err("worker exited before opening the source".into()));
    if let Err(reason) = opened {
        let _ = handle.join();
        return Err(Error::Device(reason).into());
    }

    Ok((
        Session {
            stop,
            done: done_rx,
            handle: Some(handle),
            stop_timeout: config.scheduler.stop_timeout(),
        },
        results_rx,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::gesture::TemplateStore;

    #[test]
    fn latency_average_is_windowed() {
        let mut tracker = LatencyTracker::new(3);
        assert_eq!(tracker.average(), Duration::ZERO);
        for ms in [100, 10, 10, 10] {
            tracker.record(Duration::from_millis(ms));
        }
        assert_eq!(tracker.average(), Duration::from_millis(10));
        assert!(!tracker.exceeds(Duration::from_millis(35)));
        tracker.record(Duration::from_millis(100));
        assert!(tracker.exceeds(Duration::from_millis(35)));
    }

    #[test]
    fn low_light_has_hysteresis() {
        let mut monitor = LowLightMonitor::new(true, 80.0, 100.0);
        assert!(monitor.observe(90.0));
        assert!(!monitor.observe(120.0));
        assert!(!monitor.observe(90.0));
        assert!(monitor.observe(60.0));
    }

    #[test]
    fn fast_sources_skip_every_other_frame() {
        let mut scheduler = Scheduler::new(&Config::default());
        let kept = (0..10).filter(|_| !scheduler.should_skip(60.0)).count();
        assert_eq!(kept, 5);
        let kept = (0..10).filter(|_| !scheduler.should_skip(30.0)).count();
        assert_eq!(kept, 10);
    }

    #[test]
    fn slow_frames_are_processed_downscaled_and_restored() {
        struct SizeProbe(Vec<(u32, u32)>);
        impl LandmarkDetector for SizeProbe {
            fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
                self.0.push((frame.width, frame.height));
                Ok(None)
            }
        }

        let mut scheduler = Scheduler::new(&Config::default());
        for _ in 0..30 {
            scheduler.latency.record(Duration::from_millis(50));
        }
        let mut engine = GestureEngine::new(&Config::default(), TemplateStore::new());
        let mut probe = SizeProbe(Vec::new());
        let frame = Frame::filled(64, 48, [40, 40, 40, 255], 0, Instant::now());

        let result = scheduler.process_frame(frame, &mut probe, &mut engine).unwrap();
        assert_eq!(probe.0, vec![(48, 36)]);
        assert_eq!((result.frame.width, result.frame.height), (64, 48));
    }

    struct EmptySource;

    impl FrameSource for EmptySource {
        fn read(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }

        fn frame_rate(&self) -> f32 {
            30.0
        }
    }

    struct CountingDetector(Arc<AtomicUsize>);

    impl LandmarkDetector for CountingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<Landmarks>> {
            Ok(None)
        }

        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn open_failure_is_a_device_error_and_still_closes_detector() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = Config::default();
        let engine = GestureEngine::new(&config, TemplateStore::new());
        let outcome = start_session(
            || -> Result<EmptySource> { Err(anyhow::anyhow!("no such camera")) },
            CountingDetector(closed.clone()),
            &config,
            engine,
        );

        let err = outcome.err().unwrap();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Device(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    struct EndlessSource {
        next: u64,
    }

    impl FrameSource for EndlessSource {
        fn read(&mut self) -> Result<Option<Frame>> {
            thread::sleep(Duration::from_millis(1));
            let frame = Frame::filled(16, 16, [90, 90, 90, 255], self.next, Instant::now());
            self.next += 1;
            Ok(Some(frame))
        }

        fn frame_rate(&self) -> f32 {
            30.0
        }
    }

    /// Fails on every odd frame.
    struct FlakyDetector {
        calls: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl LandmarkDetector for FlakyDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if frame.index % 2 == 1 {
                anyhow::bail!("model hiccup on frame {}", frame.index);
            }
            Ok(None)
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn detector_errors_do_not_stop_the_worker_and_stop_is_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let config = Config::default();
        let engine = GestureEngine::new(&config, TemplateStore::new());
        let detector = FlakyDetector {
            calls: calls.clone(),
            closed: closed.clone(),
        };
        let (session, results) =
            start_session(|| Ok(EndlessSource { next: 0 }), detector, &config, engine).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < 10 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(calls.load(Ordering::SeqCst) >= 10);
        assert!(session.is_running());

        let newest = results.latest().unwrap();
        assert_eq!(newest.frame.index % 2, 0);
        assert!(!results.is_finished());

        assert!(session.stop(Duration::from_secs(1)));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        results.drain();
        assert!(results.is_finished());
    }

    #[test]
    fn end_of_stream_ends_the_worker() {
        let closed = Arc::new(AtomicUsize::new(0));
        let config = Config::default();
        let engine = GestureEngine::new(&config, TemplateStore::new());
        let (session, results) = start_session(
            || Ok(EmptySource),
            CountingDetector(closed.clone()),
            &config,
            engine,
        )
        .unwrap();

        session.join();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(results.is_finished());
    }
}
