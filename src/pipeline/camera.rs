use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::{RgbAFormat, RgbFormat},
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use super::{FrameSource, frame_ops};
use crate::{error::Error, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    format!("{} ({})", info.human_name(), info.description())
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.to_string()),
            },
            Err(err) => last_err = Some(err.to_string()),
        }
    }

    let reason = last_err.unwrap_or_else(|| "no supported format".to_string());
    Err(Error::Device(format!("camera {index}: {reason}")).into())
}

/// Live capture device. Opened and dropped on the worker thread:
///
/// ```no_run
/// # fn run(detector: impl gesture_control::LandmarkDetector) -> anyhow::Result<()> {
/// use gesture_control::{Config, GestureEngine, TemplateStore, pipeline::{CameraSource, start_session}};
///
/// let config = Config::default();
/// let engine = GestureEngine::new(&config, TemplateStore::new());
/// let (session, results) =
///     start_session(|| CameraSource::open(0, true), detector, &config, engine)?;
/// # drop((session, results));
/// # Ok(())
/// # }
/// ```
pub struct CameraSource {
    camera: Camera,
    next_index: u64,
    mirror: bool,
}

impl CameraSource {
    /// `mirror` flips frames horizontally for a selfie view.
    pub fn open(index: u32, mirror: bool) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(index))?;
        let format = camera.camera_format();
        log::info!(
            "opened camera {index}: {}x{} @ {} fps ({:?})",
            format.width(),
            format.height(),
            format.frame_rate(),
            format.format()
        );
        Ok(Self {
            camera,
            next_index: 0,
            mirror,
        })
    }
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> Result<Option<Frame>> {
        let buffer = self.camera.frame()?;
        let timestamp = std::time::Instant::now();
        let image = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|err| anyhow!("failed to decode camera frame: {err}"))?;

        let mut frame = Frame {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
            index: self.next_index,
            timestamp,
        };
        self.next_index += 1;
        if self.mirror {
            frame_ops::mirror_horizontal(&mut frame);
        }
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> f32 {
        self.camera.frame_rate() as f32
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err}");
        }
    }
}
