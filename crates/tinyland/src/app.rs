//! The cooperative frame loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use tinyland_compositor::Compositor;
use tinyland_tracker::{MarkerDetector, Snapshot};

use crate::{DrawingContext, FrameSource, Landscape, PipelineError, RenderError, Renderer, SourceError};

/// Application logic driven once per frame.
pub trait App {
    /// Queue projector-space shapes for this frame.
    fn draw(&mut self, snapshot: &Snapshot, ctx: &mut DrawingContext);

    /// Paint directly onto the projector image before shapes are drawn.
    fn paint(&mut self, _snapshot: &Snapshot, image: RgbImage) -> RgbImage {
        image
    }
}

/// Paints each marker's template, then marks its centre and labels it
/// with its id.
#[derive(Clone, Debug)]
pub struct MarkerApp {
    compositor: Compositor,
}

impl MarkerApp {
    pub fn new(compositor: Compositor) -> Self {
        Self { compositor }
    }
}

impl App for MarkerApp {
    fn draw(&mut self, snapshot: &Snapshot, ctx: &mut DrawingContext) {
        for marker in snapshot.markers() {
            let c = marker.center;
            ctx.rotated_rect(
                format!("rect{}", marker.id),
                c.x,
                c.y,
                5.0,
                5.0,
                marker.rotation().unwrap_or(0.0),
                tinyland_core::color::WHITE,
            );
            ctx.text(c.x, c.y + 10.0, marker.id);
        }
    }

    fn paint(&mut self, snapshot: &Snapshot, image: RgbImage) -> RgbImage {
        self.compositor.paint_snapshot(snapshot, &image)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Checked between frames; the loop returns once it is set.
    pub stop: Arc<AtomicBool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    /// Frames spent showing the calibration pattern.
    pub calibration_frames: u64,
    pub markers: u64,
}

/// Stop flag raised by Ctrl-C.
pub fn install_stop_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(stop)
}

/// Run frames from `source` through `landscape` and `app` into `renderer`.
///
/// While a calibration is pending the renderer shows the calibration
/// pattern instead of the application's output.
pub fn run<S, D, A, R>(
    landscape: &mut Landscape<D>,
    source: &mut S,
    renderer: &mut R,
    app: &mut A,
    options: &RunOptions,
) -> Result<RunStats, RunError>
where
    S: FrameSource + ?Sized,
    D: MarkerDetector,
    A: App + ?Sized,
    R: Renderer + ?Sized,
{
    renderer.setup()?;
    let (width, height) = landscape.config().projector_size();
    let mut stats = RunStats::default();

    while !options.stop.load(Ordering::SeqCst) {
        if options.max_frames.is_some_and(|max| stats.frames >= max) {
            break;
        }

        let frame = source.next_frame()?;
        let out = landscape.process_frame(frame)?;
        stats.frames += 1;
        stats.markers += out.snapshot.len() as u64;

        if landscape.calibration().is_requested() {
            stats.calibration_frames += 1;
            renderer.show_calibration_markers()?;
            continue;
        }

        let mut ctx = DrawingContext::new(width, height);
        let image = app.paint(&out.snapshot, out.image);
        app.draw(&out.snapshot, &mut ctx);
        renderer.render(&ctx, &image)?;
    }

    log::info!(
        "stopped after {} frames ({} calibrating, {} markers)",
        stats.frames,
        stats.calibration_frames,
        stats.markers
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, FrameLoop};
    use tinyland_core::{Quad, RetryError, RetryPolicy};
    use tinyland_tracker::{DetectedMarker, NullDetector, RecordedDetector};

    #[derive(Default)]
    struct Recorder {
        rendered: Vec<DrawingContext>,
        calibrations: usize,
        setups: usize,
    }

    impl Renderer for Recorder {
        fn setup(&mut self) -> Result<(), RenderError> {
            self.setups += 1;
            Ok(())
        }

        fn render(&mut self, ctx: &DrawingContext, _image: &RgbImage) -> Result<(), RenderError> {
            self.rendered.push(ctx.clone());
            Ok(())
        }

        fn show_calibration_markers(&mut self) -> Result<(), RenderError> {
            self.calibrations += 1;
            Ok(())
        }
    }

    #[test]
    fn runs_until_frame_limit() {
        let det = RecordedDetector::new(vec![vec![DetectedMarker {
            id: 3,
            corners: Quad::rect(10.0, 10.0, 20.0, 20.0),
        }]]);
        let mut landscape = Landscape::new(Config::new(64, 48), det).unwrap();
        let mut source = FrameLoop::new(vec![RgbImage::new(64, 48)]);
        let mut renderer = Recorder::default();
        let mut app = MarkerApp::new(Compositor::default());
        let options = RunOptions {
            max_frames: Some(3),
            ..RunOptions::default()
        };

        let stats = run(&mut landscape, &mut source, &mut renderer, &mut app, &options).unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.markers, 3);
        assert_eq!(renderer.setups, 1);
        assert_eq!(renderer.rendered.len(), 3);
        assert!(matches!(
            &renderer.rendered[0].shapes()[0],
            crate::Shape::Rectangle { name, .. } if name == "rect3"
        ));
    }

    #[test]
    fn pending_calibration_shows_pattern() {
        let mut cfg = Config::new(64, 48);
        cfg.calibrate = true;
        let mut landscape = Landscape::new(cfg, NullDetector).unwrap();
        let mut source = FrameLoop::new(vec![RgbImage::new(64, 48)]);
        let mut renderer = Recorder::default();
        let mut app = MarkerApp::new(Compositor::default());
        let options = RunOptions {
            max_frames: Some(2),
            ..RunOptions::default()
        };

        let stats = run(&mut landscape, &mut source, &mut renderer, &mut app, &options).unwrap();
        assert_eq!(stats.calibration_frames, 2);
        assert_eq!(renderer.calibrations, 2);
        assert!(renderer.rendered.is_empty());
    }

    #[test]
    fn raised_stop_flag_ends_the_loop_immediately() {
        let mut landscape = Landscape::new(Config::new(8, 8), NullDetector).unwrap();
        let mut source = FrameLoop::default();
        let mut renderer = Recorder::default();
        let mut app = MarkerApp::new(Compositor::default());
        let options = RunOptions::default();
        options.stop.store(true, Ordering::SeqCst);

        let stats = run(&mut landscape, &mut source, &mut renderer, &mut app, &options).unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn source_errors_propagate() {
        let mut landscape = Landscape::new(Config::new(8, 8), NullDetector).unwrap();
        let mut source = FrameLoop::default();
        let mut renderer = Recorder::default();
        let mut app = MarkerApp::new(Compositor::default());
        let err = run(&mut landscape, &mut source, &mut renderer, &mut app, &RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, RunError::Source(_)));
    }

    #[test]
    fn unwarpable_frame_stops_the_loop_with_a_pipeline_error() {
        let mut landscape = Landscape::new(Config::new(8, 8), NullDetector)
            .unwrap()
            .with_retry(RetryPolicy::immediate(5));
        let mut source = FrameLoop::new(vec![RgbImage::new(0, 0)]);
        let mut renderer = Recorder::default();
        let mut app = MarkerApp::new(Compositor::default());
        let err = run(&mut landscape, &mut source, &mut renderer, &mut app, &RunOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Pipeline(PipelineError::WarpExhausted(RetryError::Exhausted {
                attempts: 5,
                ..
            }))
        ));
        assert!(renderer.rendered.is_empty());
    }
}
