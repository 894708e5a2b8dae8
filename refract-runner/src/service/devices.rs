//! Device service
//!
//! Discovers the execution devices available to the frame processor.
//! Reported by the metrics endpoint and used to seed the
//! `execution_providers` default of new job contexts.

use refract_core::domain::context::{ContextKey, ContextValue};
use refract_core::dto::metrics::ExecutionDevice;
use std::process::Command;
use tracing::{debug, info};

use crate::context::JobContext;

pub const CPU_PROVIDER: &str = "cpu";
pub const CUDA_PROVIDER: &str = "cuda";

/// Service trait for execution device discovery
pub trait DeviceService: Send + Sync {
    /// Lists every device a processor could execute on
    fn discover(&self) -> Vec<ExecutionDevice>;

    /// Distinct providers of the discovered devices, in discovery order
    fn providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = Vec::new();
        for device in self.discover() {
            if !providers.contains(&device.provider) {
                providers.push(device.provider);
            }
        }
        providers
    }

    /// Seeds `execution_providers` and `execution_device_ids` if unset
    fn apply_defaults(&self, context: &mut JobContext) {
        let devices = self.discover();
        let providers = self.providers();
        let device_ids = (0..devices.len()).map(|id| id.to_string()).collect();

        // Both keys are list-typed, init_if_absent cannot fail here
        let _ = context.init_if_absent(
            ContextKey::ExecutionProviders,
            ContextValue::List(providers),
        );
        let _ = context.init_if_absent(
            ContextKey::ExecutionDeviceIds,
            ContextValue::List(device_ids),
        );
    }
}

/// Reports the CPU plus any GPU visible to `nvidia-smi`
#[derive(Debug, Default)]
pub struct StandardDeviceService;

impl StandardDeviceService {
    pub fn new() -> Self {
        Self
    }

    fn detect_cuda(&self) -> Vec<ExecutionDevice> {
        let output = Command::new("nvidia-smi")
            .args(["--query-gpu=name", "--format=csv,noheader"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                parse_gpu_names(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(_) | Err(_) => {
                debug!("nvidia-smi unavailable, skipping CUDA detection");
                Vec::new()
            }
        }
    }
}

impl DeviceService for StandardDeviceService {
    fn discover(&self) -> Vec<ExecutionDevice> {
        let mut devices = vec![ExecutionDevice {
            provider: CPU_PROVIDER.to_string(),
            name: std::env::consts::ARCH.to_string(),
        }];
        devices.extend(self.detect_cuda());

        info!("Discovered {} execution devices", devices.len());
        devices
    }
}

fn parse_gpu_names(output: &str) -> Vec<ExecutionDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| ExecutionDevice {
            provider: CUDA_PROVIDER.to_string(),
            name: name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDevices(Vec<ExecutionDevice>);

    impl DeviceService for FixedDevices {
        fn discover(&self) -> Vec<ExecutionDevice> {
            self.0.clone()
        }
    }

    fn device(provider: &str, name: &str) -> ExecutionDevice {
        ExecutionDevice {
            provider: provider.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_gpu_names() {
        let devices = parse_gpu_names("NVIDIA GeForce RTX 4090\n\nTesla T4\n");
        assert_eq!(
            devices,
            vec![
                device(CUDA_PROVIDER, "NVIDIA GeForce RTX 4090"),
                device(CUDA_PROVIDER, "Tesla T4"),
            ]
        );
    }

    #[test]
    fn test_standard_service_always_reports_cpu() {
        let devices = StandardDeviceService::new().discover();
        assert_eq!(devices[0].provider, CPU_PROVIDER);
    }

    #[test]
    fn test_providers_are_distinct() {
        let service = FixedDevices(vec![
            device(CPU_PROVIDER, "x86_64"),
            device(CUDA_PROVIDER, "A"),
            device(CUDA_PROVIDER, "B"),
        ]);
        assert_eq!(service.providers(), vec!["cpu", "cuda"]);
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_providers() {
        let service = FixedDevices(vec![device(CPU_PROVIDER, "x86_64")]);

        let mut context = JobContext::new();
        service.apply_defaults(&mut context);
        assert_eq!(context.execution_providers, Some(vec!["cpu".to_string()]));
        assert_eq!(context.execution_device_ids, Some(vec!["0".to_string()]));

        let mut context = JobContext::new();
        context.execution_providers = Some(vec!["cuda".to_string()]);
        service.apply_defaults(&mut context);
        assert_eq!(context.execution_providers, Some(vec!["cuda".to_string()]));
    }
}
