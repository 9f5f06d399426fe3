// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The external decode pipeline and its adapter.
//!
//! A pipeline accepts complete Annex B access units and decodes them on its
//! own worker thread(s). It reports back through [`PipelineEvents`], whose
//! methods only touch atomics and so are safe to call from any callback
//! thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};

use crate::codec::{AccessUnit, Frame, PixelFormat, Plane};
use crate::error::{BoxError, ErrorInt};
use crate::Error;

/// Default [`PipelineConfig::description`]: a GStreamer-style launch line
/// which parses and decodes an Annex B byte stream into I420 pictures.
pub const DEFAULT_DESCRIPTION: &str = "appsrc name=source is-live=true do-timestamp=true \
     block=false ! h264parse ! avdec_h264 ! appsink name=sink drop=true sync=false";

/// Configuration handed to [`PipelineFactory::create`] on every (re)start.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    description: String,
    format_specific_params: Option<String>,
    output_format: PixelFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            description: DEFAULT_DESCRIPTION.to_owned(),
            format_specific_params: None,
            output_format: PixelFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets an implementation-specific description of the pipeline to build.
    pub fn description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    /// Sets the SDP `fmtp` parameters, passed through uninterpreted.
    pub fn format_specific_params(self, format_specific_params: Option<String>) -> Self {
        Self {
            format_specific_params,
            ..self
        }
    }

    /// Sets the pixel format decoded samples are expected in.
    pub fn output_format(self, output_format: PixelFormat) -> Self {
        Self {
            output_format,
            ..self
        }
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn get_format_specific_params(&self) -> Option<&str> {
        self.format_specific_params.as_deref()
    }

    pub fn get_output_format(&self) -> PixelFormat {
        self.output_format
    }
}

/// State shared between one pipeline instance's callbacks and the decoder.
///
/// Each instance gets its own `PipelineEvents`; callbacks still running on a
/// torn-down instance can't affect its replacement. Relaxed ordering is
/// sufficient: these only gate non-blocking polls, and the sample data itself
/// is handed over by the pipeline's own synchronization.
#[derive(Debug)]
pub struct PipelineEvents {
    pending_samples: AtomicU32,
    healthy: AtomicBool,
}

impl PipelineEvents {
    fn new() -> Self {
        PipelineEvents {
            pending_samples: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Notes a newly decoded sample is ready to pull. Call from the
    /// pipeline's producer callback.
    pub fn on_new_sample(&self) {
        self.pending_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks the pipeline as broken. Call from the pipeline's error callback;
    /// the next decode call will restart it.
    pub fn on_error(&self) {
        self.healthy.store(false, Ordering::Relaxed);
    }

    /// Returns the number of decoded samples not yet pulled.
    pub fn pending_samples(&self) -> u32 {
        self.pending_samples.load(Ordering::Relaxed)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Claims one pending sample, returning false if there are none.
    fn take_pending_sample(&self) -> bool {
        self.pending_samples
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// One plane of a [`DecodedSample`].
#[derive(Clone)]
pub struct SamplePlane {
    pub stride: usize,
    pub data: Bytes,
}

impl std::fmt::Debug for SamplePlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplePlane")
            .field("stride", &self.stride)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A decoded picture as handed back by a [`Pipeline`].
pub struct DecodedSample {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Y, U, and V planes, in that order.
    pub planes: [SamplePlane; 3],

    /// Keeps the pipeline's mapping of the sample alive; dropped (unmapped)
    /// along with the sample.
    mapping: Option<Box<dyn Send>>,
}

impl DecodedSample {
    pub fn new(width: u32, height: u32, format: PixelFormat, planes: [SamplePlane; 3]) -> Self {
        DecodedSample {
            width,
            height,
            format,
            planes,
            mapping: None,
        }
    }

    /// Attaches a guard which must outlive any view of the plane data, such
    /// as a mapped buffer. It's released when the sample is dropped.
    pub fn with_mapping(self, mapping: impl Send + 'static) -> Self {
        Self {
            mapping: Some(Box::new(mapping)),
            ..self
        }
    }

    /// Checks that the planes are large enough for the stated geometry.
    fn validate(&self, expected_format: PixelFormat) -> Result<(), String> {
        if self.format != expected_format {
            return Err(format!(
                "format {} while expecting {}",
                self.format, expected_format
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty {}x{} picture", self.width, self.height));
        }
        for (i, plane) in self.planes.iter().enumerate() {
            let row_bytes = self.format.plane_row_bytes(i, self.width);
            let rows = self.format.plane_rows(i, self.height);
            if plane.stride < row_bytes {
                return Err(format!(
                    "plane {} stride {} < row length {}",
                    i, plane.stride, row_bytes
                ));
            }
            let needed = plane
                .stride
                .checked_mul(rows - 1)
                .and_then(|n| n.checked_add(row_bytes));
            match needed {
                Some(n) if n <= plane.data.len() => {}
                _ => {
                    return Err(format!(
                        "plane {} has {} bytes; too short for {} rows of stride {}",
                        i,
                        plane.data.len(),
                        rows,
                        plane.stride
                    ))
                }
            }
        }
        Ok(())
    }

    fn as_frame(&self) -> Frame<'_> {
        let plane = |i: usize| Plane {
            stride: self.planes[i].stride,
            data: &self.planes[i].data[..],
        };
        Frame {
            width: self.width,
            height: self.height,
            format: self.format,
            planes: [plane(0), plane(1), plane(2)],
        }
    }
}

impl std::fmt::Debug for DecodedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedSample")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("planes", &self.planes)
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}

/// A running decode pipeline instance. Dropping it tears it down.
pub trait Pipeline: Send {
    /// Hands over a complete Annex B access unit for decoding.
    fn submit(&mut self, access_unit: Bytes) -> Result<(), BoxError>;

    /// Returns the next decoded sample, if one is ready.
    ///
    /// Called only after [`PipelineEvents::on_new_sample`] has announced one,
    /// so implementations may block briefly to retrieve it.
    fn pull_latest_sample(&mut self) -> Option<DecodedSample>;
}

/// Creates [`Pipeline`]s, initially and on each restart.
pub trait PipelineFactory {
    type Pipeline: Pipeline;

    /// Builds and starts a pipeline which reports to `events`.
    ///
    /// Teardown of a partially-constructed pipeline on failure is the
    /// implementation's responsibility, typically by its `Drop` impls.
    fn create(
        &self,
        config: &PipelineConfig,
        events: Arc<PipelineEvents>,
    ) -> Result<Self::Pipeline, BoxError>;
}

struct Running<P> {
    pipeline: P,
    events: Arc<PipelineEvents>,
}

/// Owns the pipeline instance: submission, non-blocking pulls, and restarts.
pub(crate) struct PipelineAdapter<F: PipelineFactory> {
    /// The one sample currently handed out as a [`Frame`]. Declared before
    /// `running` so it's released before the pipeline is torn down.
    current: Option<DecodedSample>,

    /// `None` only after a failed (re)start.
    running: Option<Running<F::Pipeline>>,

    factory: F,
    config: PipelineConfig,
}

impl<F: PipelineFactory> PipelineAdapter<F> {
    pub(crate) fn new(factory: F, config: PipelineConfig) -> Result<Self, Error> {
        let mut adapter = PipelineAdapter {
            current: None,
            running: None,
            factory,
            config,
        };
        adapter.replace()?;
        Ok(adapter)
    }

    /// Returns false if the pipeline has reported an error or failed to start.
    pub(crate) fn is_healthy(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| r.events.is_healthy())
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Hands `access_unit` to the pipeline. Doesn't restart on failure.
    pub(crate) fn submit(&mut self, access_unit: AccessUnit) -> Result<(), Error> {
        let running = match self.running.as_mut() {
            Some(r) => r,
            None => bail!(ErrorInt::NoPipeline),
        };
        let data = access_unit.into_data();
        let len = data.len();
        running
            .pipeline
            .submit(data)
            .map_err(|source| wrap!(ErrorInt::SubmitFailed { len, source }))
    }

    /// Returns a newly decoded picture if one is ready, without blocking.
    ///
    /// The previously returned picture is released first; at most one is
    /// held at a time.
    pub(crate) fn try_take_decoded_frame(&mut self) -> Option<Frame<'_>> {
        let running = self.running.as_mut()?;
        if !running.events.take_pending_sample() {
            return None;
        }
        self.current = None;
        let sample = match running.pipeline.pull_latest_sample() {
            Some(s) => s,
            None => {
                warn!("pipeline announced a decoded sample but had none to pull");
                return None;
            }
        };
        if let Err(reason) = sample.validate(self.config.output_format) {
            warn!("discarding unusable decoded sample: {reason}");
            return None;
        }
        Some(self.current.insert(sample).as_frame())
    }

    /// Tears down the current pipeline and creates a fresh one with the same
    /// configuration.
    pub(crate) fn restart(&mut self) -> Result<(), Error> {
        info!("restarting decode pipeline");
        self.replace()
    }

    /// Swaps the running instance (if any) for a newly created one.
    ///
    /// The old instance is fully torn down first. On failure there's no
    /// running instance, so [`Self::is_healthy`] stays false and the next
    /// decode call tries again.
    fn replace(&mut self) -> Result<(), Error> {
        self.current = None;
        if let Some(old) = self.running.take() {
            debug!(
                "tearing down pipeline with {} unpulled samples",
                old.events.pending_samples()
            );
            drop(old);
        }
        let events = Arc::new(PipelineEvents::new());
        let pipeline = self
            .factory
            .create(&self.config, Arc::clone(&events))
            .map_err(|e| wrap!(ErrorInt::InitFailed(e)))?;
        self.running = Some(Running { pipeline, events });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn events(&self) -> Option<&Arc<PipelineEvents>> {
        self.running.as_ref().map(|r| &r.events)
    }
}

impl<F: PipelineFactory> std::fmt::Debug for PipelineAdapter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineAdapter")
            .field("config", &self.config)
            .field("running", &self.running.as_ref().map(|r| &r.events))
            .field("current", &self.current)
            .finish()
    }
}
