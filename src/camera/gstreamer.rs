use super::backend::{CameraBackend, StreamConstraints, VideoStream};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// V4L2 camera read through a GStreamer appsink
pub struct GstCameraBackend {
    config: CameraConfig,
    next_stream_id: AtomicU64,
}

impl GstCameraBackend {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        info!(
            "GStreamer camera backend initialized for {}",
            device_path(config.index)
        );

        Ok(Self {
            config,
            next_stream_id: AtomicU64::new(1),
        })
    }

    fn build_pipeline_string(&self, constraints: &StreamConstraints) -> String {
        let caps = match constraints.ideal_resolution {
            Some((width, height)) => format!(
                "video/x-raw,format=RGB,width={},height={}",
                width, height
            ),
            None => "video/x-raw,format=RGB".to_string(),
        };

        format!(
            "v4l2src device={} do-timestamp=true ! videoconvert ! videoscale ! {} ! \
             appsink name=sink sync=false max-buffers=2 drop=true",
            device_path(self.config.index),
            caps
        )
    }
}

/// [`start_pipeline`] on the blocking pool; the settle wait can take seconds
async fn start_playing(pipeline: &Pipeline) -> Result<(), CameraError> {
    let starting = pipeline.clone();
    tokio::task::spawn_blocking(move || start_pipeline(&starting))
        .await
        .map_err(|e| CameraError::CaptureStream {
            details: format!("Pipeline start task failed: {}", e),
        })?
}

/// Set the pipeline playing and wait for the state change to settle
fn start_pipeline(pipeline: &Pipeline) -> Result<(), CameraError> {
    if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(CameraError::Denied {
            details: format!("Failed to start GStreamer pipeline: {}", e),
        });
    }

    // Negotiation failures only surface once the state change settles
    let (settled, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(5));
    if let Err(e) = settled {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(CameraError::Denied {
            details: format!("Camera pipeline did not start: {}", e),
        });
    }
    Ok(())
}

fn device_path(index: u32) -> String {
    format!("/dev/video{}", index)
}

#[async_trait]
impl CameraBackend for GstCameraBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn is_supported(&self) -> bool {
        Path::new(&device_path(self.config.index)).exists()
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        if let Some(facing) = constraints.facing {
            debug!("V4L2 has no facing selection; ignoring {:?}", facing);
        }

        let id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let pipeline_desc = self.build_pipeline_string(constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        let latest = Arc::new(Mutex::new(None));
        let (metadata_tx, metadata) = watch::channel(None);
        let frame_counter = Arc::new(AtomicU64::new(0));

        let sink_latest = Arc::clone(&latest);
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                    match sample_to_frame(&sample, frame_id) {
                        Ok(frame) => {
                            if frame_id == 0 {
                                metadata_tx.send_replace(Some((frame.width, frame.height)));
                            }
                            trace!("Captured frame {} ({}x{})", frame_id, frame.width, frame.height);
                            *sink_latest.lock() = Some(frame);
                        }
                        Err(e) => error!("Error processing GStreamer sample: {}", e),
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        start_playing(&pipeline).await?;

        info!("GStreamer stream {} started", id);
        Ok(Box::new(GstStream {
            id,
            pipeline,
            latest,
            metadata,
            live: AtomicBool::new(true),
        }))
    }
}

struct GstStream {
    id: u64,
    pipeline: Pipeline,
    latest: Arc<Mutex<Option<FrameData>>>,
    metadata: watch::Receiver<Option<(u32, u32)>>,
    live: AtomicBool,
}

#[async_trait]
impl VideoStream for GstStream {
    fn id(&self) -> u64 {
        self.id
    }

    async fn wait_for_metadata(&self) -> Result<(u32, u32), CameraError> {
        let mut metadata = self.metadata.clone();
        let dims = metadata
            .wait_for(|m| m.is_some())
            .await
            .map_err(|_| CameraError::CaptureStream {
                details: format!("stream {} closed before its first frame", self.id),
            })?;
        (*dims).ok_or_else(|| CameraError::CaptureStream {
            details: "missing dimensions".to_string(),
        })
    }

    fn current_frame(&self) -> Option<FrameData> {
        if !self.is_live() {
            return None;
        }
        self.latest.lock().clone()
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop GStreamer stream {}: {}", self.id, e);
            }
            info!("GStreamer stream {} stopped", self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Copy an RGB sample into a tightly packed frame, dropping row padding
fn sample_to_frame(sample: &gstreamer::Sample, frame_id: u64) -> Result<FrameData, CameraError> {
    let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
        details: "No buffer in sample".to_string(),
    })?;

    let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
        details: "No caps in sample".to_string(),
    })?;

    let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
        details: format!("Failed to get video info: {}", e),
    })?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0].max(1) as usize;
    let row_bytes = width as usize * 3;

    let map = buffer
        .map_readable()
        .map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to map buffer: {}", e),
        })?;

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in map.as_slice().chunks(stride).take(height as usize) {
        if row.len() < row_bytes {
            return Err(CameraError::CaptureStream {
                details: format!("Short row in {}x{} sample", width, height),
            });
        }
        data.extend_from_slice(&row[..row_bytes]);
    }

    Ok(FrameData::new(
        frame_id,
        SystemTime::now(),
        data,
        width,
        height,
        FrameFormat::Rgb24,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(description: &str) -> Pipeline {
        gstreamer::init().unwrap();
        gstreamer::parse::launch(description)
            .unwrap()
            .downcast::<Pipeline>()
            .unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_start_playing_settles_on_a_single_thread_runtime() {
        let pipeline = launch("videotestsrc is-live=true ! video/x-raw,format=RGB,width=64,height=48 ! fakesink");

        let ticker = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        });
        start_playing(&pipeline).await.unwrap();
        ticker.await.unwrap();

        let (_, current, _) = pipeline.state(gstreamer::ClockTime::ZERO);
        assert_eq!(current, gstreamer::State::Playing);
        pipeline.set_state(gstreamer::State::Null).unwrap();
    }

    #[tokio::test]
    async fn test_start_playing_reports_a_missing_device() {
        let pipeline = launch("v4l2src device=/dev/video-photobooth-missing ! fakesink");
        let err = start_playing(&pipeline).await.unwrap_err();
        assert!(matches!(err, CameraError::Denied { .. }));
    }

    #[test]
    fn test_pipeline_string_carries_constraints() {
        let backend = GstCameraBackend::new(CameraConfig::default()).unwrap();
        let preferred = backend.build_pipeline_string(&StreamConstraints::preferred(
            crate::config::FacingMode::User,
            (640, 640),
        ));
        assert!(preferred.contains("width=640,height=640"));
        assert!(preferred.contains("appsink name=sink"));

        let open = backend.build_pipeline_string(&StreamConstraints::unconstrained());
        assert!(open.contains("video/x-raw,format=RGB !"));
    }
}
