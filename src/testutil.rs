// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::codec::PixelFormat;
use crate::error::BoxError;
use crate::pipeline::{
    DecodedSample, Pipeline, PipelineConfig, PipelineEvents, PipelineFactory, SamplePlane,
};

pub(crate) fn init_logging() {
    let h = mylog::Builder::new()
        .set_format(
            ::std::env::var("DEPAY_FORMAT")
                .map_err(|_| ())
                .and_then(|s| mylog::Format::from_str(&s))
                .unwrap_or(mylog::Format::Google),
        )
        .set_spec(::std::env::var("DEPAY_LOG").as_deref().unwrap_or("info"))
        .build();
    let _ = h.install();
}

/// Returns a mid-gray I420 picture with unpadded strides.
pub(crate) fn gray_sample(width: u32, height: u32) -> DecodedSample {
    let format = PixelFormat::I420;
    let plane = |i: usize| {
        let stride = format.plane_row_bytes(i, width);
        let len = stride * format.plane_rows(i, height);
        SamplePlane {
            stride,
            data: Bytes::from(vec![0x80u8; len]),
        }
    };
    DecodedSample::new(width, height, format, [plane(0), plane(1), plane(2)])
}

#[derive(Default)]
pub(crate) struct FakeState {
    /// Number of successful `create` calls.
    pub(crate) created: usize,

    /// Number of pipelines created and not yet dropped.
    pub(crate) live: usize,

    /// Number of upcoming `create` calls to fail.
    pub(crate) fail_creates: usize,

    pub(crate) fail_submit: bool,

    /// If set, each submitted access unit immediately "decodes" to a 2x2 sample.
    pub(crate) auto_decode: bool,

    pub(crate) descriptions: Vec<String>,
    pub(crate) submitted: Vec<Bytes>,
    samples: VecDeque<DecodedSample>,
    events: Option<Arc<PipelineEvents>>,
}

/// A scripted [`PipelineFactory`] whose pipelines share one [`FakeState`].
#[derive(Clone, Default)]
pub(crate) struct FakeFactory(Arc<Mutex<FakeState>>);

impl FakeFactory {
    pub(crate) fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    /// Returns the events of the most recently created pipeline.
    pub(crate) fn events(&self) -> Arc<PipelineEvents> {
        Arc::clone(self.state().events.as_ref().expect("a pipeline was created"))
    }

    /// Simulates the pipeline's worker thread finishing a picture.
    pub(crate) fn produce(&self, sample: DecodedSample) {
        let events = {
            let mut l = self.state();
            l.samples.push_back(sample);
            Arc::clone(l.events.as_ref().expect("a pipeline was created"))
        };
        events.on_new_sample();
    }
}

impl PipelineFactory for FakeFactory {
    type Pipeline = FakePipeline;

    fn create(
        &self,
        config: &PipelineConfig,
        events: Arc<PipelineEvents>,
    ) -> Result<FakePipeline, BoxError> {
        let mut l = self.state();
        l.descriptions.push(config.get_description().to_owned());
        if l.fail_creates > 0 {
            l.fail_creates -= 1;
            return Err("no element \"avdec_h264\"".into());
        }
        l.created += 1;
        l.live += 1;
        l.samples.clear();
        l.events = Some(Arc::clone(&events));
        Ok(FakePipeline {
            state: Arc::clone(&self.0),
            events,
        })
    }
}

pub(crate) struct FakePipeline {
    state: Arc<Mutex<FakeState>>,
    events: Arc<PipelineEvents>,
}

impl Pipeline for FakePipeline {
    fn submit(&mut self, access_unit: Bytes) -> Result<(), BoxError> {
        let mut l = self.state.lock().unwrap();
        if l.fail_submit {
            return Err("appsrc flow error".into());
        }
        l.submitted.push(access_unit);
        if l.auto_decode {
            l.samples.push_back(gray_sample(2, 2));
            self.events.on_new_sample();
        }
        Ok(())
    }

    fn pull_latest_sample(&mut self) -> Option<DecodedSample> {
        self.state.lock().unwrap().samples.pop_front()
    }
}

impl Drop for FakePipeline {
    fn drop(&mut self) {
        if let Ok(mut l) = self.state.lock() {
            l.live -= 1;
        }
    }
}
