use candle_core::Device;
use tracing::{info, warn};

/// Map a configured device name (`cpu`, `metal`, `cuda`) to a candle device, falling back to CPU.
pub fn select_device(name: &str) -> Device {
    match name.to_ascii_lowercase().as_str() {
        "metal" | "mps" => {
            if let Some(dev) = metal_device() { info!("Device: Metal (MPS)"); return dev; }
        }
        "cuda" | "gpu" => {
            if let Some(dev) = cuda_device() { info!("Device: CUDA"); return dev; }
        }
        "cpu" => {}
        other => warn!(device = other, "unknown device name"),
    }
    info!("Device: CPU");
    Device::Cpu
}

#[cfg(feature = "metal")]
fn metal_device() -> Option<Device> {
    Device::new_metal(0).map_err(|e| warn!("Metal unavailable: {}", e)).ok()
}

#[cfg(not(feature = "metal"))]
fn metal_device() -> Option<Device> {
    warn!("metal requested but built without the `metal` feature");
    None
}

#[cfg(feature = "cuda")]
fn cuda_device() -> Option<Device> {
    Device::new_cuda(0).map_err(|e| warn!("CUDA unavailable: {}", e)).ok()
}

#[cfg(not(feature = "cuda"))]
fn cuda_device() -> Option<Device> {
    warn!("cuda requested but built without the `cuda` feature");
    None
}
