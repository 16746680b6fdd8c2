use chrono::{DateTime, Utc};
use tch::{CModule, Device, Kind, Tensor};

use crate::config::AppConfig;
use crate::error::LoadError;

/// The forward pass of a loaded model.
///
/// Production implementations wrap a TorchScript module; tests substitute
/// deterministic stubs so lifecycle behavior can be exercised without a
/// model artifact on disk.
pub trait ForwardPass: Send + Sync {
    fn forward(&self, input: &Tensor) -> Result<Tensor, tch::TchError>;

    /// Total trainable parameter count, when the backend can report it.
    fn parameter_count(&self) -> Option<i64> {
        None
    }
}

struct TorchModule(CModule);

impl ForwardPass for TorchModule {
    fn forward(&self, input: &Tensor) -> Result<Tensor, tch::TchError> {
        self.0.forward_ts(&[input])
    }

    fn parameter_count(&self) -> Option<i64> {
        let params = self.0.named_parameters().ok()?;
        Some(params.iter().map(|(_, t)| t.numel() as i64).sum())
    }
}

/// A loaded, self-tested model plus the metadata the service reports.
///
/// Owned by the lifecycle manager; everything here is read-only after
/// construction.
pub struct ModelHandle {
    module: Box<dyn ForwardPass>,
    pub input_size: (u32, u32),
    pub num_classes: usize,
    pub loaded_at: DateTime<Utc>,
    pub parameters: Option<i64>,
}

impl ModelHandle {
    pub fn new(module: Box<dyn ForwardPass>, input_size: (u32, u32), num_classes: usize) -> Self {
        let parameters = module.parameter_count();
        Self {
            module,
            input_size,
            num_classes,
            loaded_at: Utc::now(),
            parameters,
        }
    }

    pub fn module(&self) -> &dyn ForwardPass {
        self.module.as_ref()
    }
}

/// Loads the TorchScript artifact and runs the post-load self-test.
///
/// The byte-size check rejects truncated uploads and HTML error pages
/// saved as model files before libtorch ever sees them. The self-test
/// pushes a zeroed input through the module to confirm the call path works
/// and that the output dimensionality matches the deployed taxonomy.
pub fn load_torch_model(config: &AppConfig, num_classes: usize) -> Result<ModelHandle, LoadError> {
    let path = &config.model_path;
    let metadata = std::fs::metadata(path)
        .map_err(|_| LoadError::ArtifactMissing(path.clone()))?;
    if metadata.len() < config.min_artifact_bytes {
        return Err(LoadError::ArtifactTooSmall {
            size: metadata.len(),
            min: config.min_artifact_bytes,
        });
    }

    log::info!("Loading model from {} ({} bytes)", path, metadata.len());
    let module = CModule::load_on_device(path, Device::cuda_if_available())
        .map_err(|e| LoadError::Deserialize(e.to_string()))?;

    let handle = ModelHandle::new(Box::new(TorchModule(module)), config.input_size, num_classes);
    self_test(&handle)?;
    log::info!(
        "Model loaded: input {}x{}, {} classes, {} parameters",
        handle.input_size.0,
        handle.input_size.1,
        handle.num_classes,
        handle
            .parameters
            .map_or_else(|| "unknown".to_string(), |p| p.to_string())
    );
    Ok(handle)
}

/// Synthetic forward pass run once after loading.
pub fn self_test(handle: &ModelHandle) -> Result<(), LoadError> {
    let (height, width) = handle.input_size;
    let input = Tensor::zeros(
        [1, 3, height as i64, width as i64],
        (Kind::Float, Device::Cpu),
    );
    let output = tch::no_grad(|| handle.module().forward(&input))
        .map_err(|e| LoadError::SelfTest(e.to_string()))?;
    let produced = output.numel();
    if produced != handle.num_classes {
        return Err(LoadError::SelfTest(format!(
            "model produced {} scores but the taxonomy has {} classes",
            produced, handle.num_classes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_artifact_fails_before_touching_libtorch() {
        let config = AppConfig {
            model_path: "/nonexistent/rice_disease.pt".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            load_torch_model(&config, 9),
            Err(LoadError::ArtifactMissing(_))
        ));
    }

    #[test]
    fn undersized_artifact_is_rejected_by_the_byte_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<html>404 not found</html>").unwrap();
        let config = AppConfig {
            model_path: file.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        match load_torch_model(&config, 9) {
            Err(LoadError::ArtifactTooSmall { size, min }) => {
                assert!(size < min);
            }
            other => panic!("expected ArtifactTooSmall, got {:?}", other.err()),
        }
    }

    #[test]
    fn self_test_checks_output_dimensionality() {
        struct WrongWidth;
        impl ForwardPass for WrongWidth {
            fn forward(&self, _input: &Tensor) -> Result<Tensor, tch::TchError> {
                Ok(Tensor::zeros([1, 5], (Kind::Float, Device::Cpu)))
            }
        }
        let handle = ModelHandle::new(Box::new(WrongWidth), (224, 224), 9);
        assert!(matches!(self_test(&handle), Err(LoadError::SelfTest(_))));
    }
}
