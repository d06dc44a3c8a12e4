use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{HandposeEngine, common};
use crate::{
    model_download::{ModelDownloadEvent, ensure_handpose_estimator_model_ready},
    types::{Frame, Landmark},
};

pub(super) struct OrtEngine {
    handpose: Session,
}

impl OrtEngine {
    pub(super) fn load(model_path: &Path) -> Result<Self> {
        ensure_handpose_estimator_model_ready(model_path, log_download_event).with_context(|| {
            format!("failed to prepare handpose model at {}", model_path.display())
        })?;

        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        log::info!("handpose ORT backend ready using {}", model_path.display());
        Ok(Self { handpose })
    }
}

fn log_download_event(event: ModelDownloadEvent) {
    match event {
        ModelDownloadEvent::AlreadyPresent => log::debug!("handpose model already present"),
        ModelDownloadEvent::Started { total } => {
            log::debug!("handpose model download started, size {total:?}")
        }
        ModelDownloadEvent::Progress { downloaded, total } => {
            log::trace!("handpose model {downloaded} of {total:?} bytes")
        }
        ModelDownloadEvent::Finished => log::debug!("handpose model download finished"),
    }
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Option<Vec<Landmark>>> {
        let (input, letterbox) = common::prepare_frame(frame, common::INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };
        if confidence < common::MIN_CONFIDENCE {
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened)?;

        Ok(Some(common::normalize_landmarks(&landmarks, &letterbox)))
    }
}
