//! OpenCL-backed kernel launcher (feature `opencl`)
//!
//! The one implementation that touches real hardware. The thresholding
//! kernel is compiled once at construction; every launch writes the input
//! buffer, enqueues with an explicit work-group size, waits on the queue,
//! and reads the output back. `finish()` is the synchronization barrier
//! the timing engine brackets its clock with.

use std::sync::Mutex;

use ocl::ProQue;

use crate::error::{BarridoError, Result};
use crate::launch::{KernelLauncher, LaunchConfig, LauncherInfo};
use crate::pattern::InputPattern;

const KERNEL_SRC: &str = r#"
    __kernel void threshold_map(
        __global const float* input,
        __global float* output,
        const float threshold,
        const uint n
    ) {
        uint gid = get_global_id(0);
        if (gid < n) {
            output[gid] = input[gid] > threshold ? 1.0f : 0.0f;
        }
    }
"#;

fn device_err(e: &ocl::Error) -> BarridoError {
    BarridoError::Device {
        reason: e.to_string(),
    }
}

/// Kernel launcher backed by the first available OpenCL device
///
/// Launches are issued strictly sequentially by the sweep controller, so
/// the queue is wrapped in a mutex purely to keep the launcher `Sync` for
/// the timing engine's watchdog worker.
pub struct OpenClLauncher {
    proque: Mutex<ProQue>,
}

impl OpenClLauncher {
    /// Build the program and command queue on the default device.
    ///
    /// # Errors
    ///
    /// Returns [`BarridoError::Device`] when no OpenCL platform/device is
    /// available or the kernel fails to compile.
    pub fn new() -> Result<Self> {
        let proque = ProQue::builder()
            .src(KERNEL_SRC)
            .dims(1)
            .build()
            .map_err(|e| device_err(&e))?;
        Ok(Self {
            proque: Mutex::new(proque),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ProQue>> {
        self.proque.lock().map_err(|_| BarridoError::Device {
            reason: "launcher mutex poisoned by an earlier panic".to_string(),
        })
    }
}

impl KernelLauncher for OpenClLauncher {
    fn info(&self) -> LauncherInfo {
        let device = self
            .proque
            .lock()
            .ok()
            .and_then(|pq| pq.device().name().ok())
            .unwrap_or_else(|| "unknown".to_string());
        LauncherInfo {
            name: "opencl".to_string(),
            device,
            simulated: false,
        }
    }

    fn launch(&self, pattern: &InputPattern, config: &LaunchConfig) -> Result<Vec<f32>> {
        let n = pattern.len();
        if !config.covers(n) {
            return Err(BarridoError::InvalidConfig {
                reason: format!(
                    "launch of {} threads does not cover {n} elements",
                    config.threads_launched()
                ),
            });
        }

        let proque = self.lock()?;

        let input = proque
            .buffer_builder::<f32>()
            .len(n)
            .build()
            .map_err(|e| device_err(&e))?;
        input
            .cmd()
            .write(&pattern.values)
            .enq()
            .map_err(|e| device_err(&e))?;

        let output = proque
            .buffer_builder::<f32>()
            .len(n)
            .build()
            .map_err(|e| device_err(&e))?;

        let kernel = proque
            .kernel_builder("threshold_map")
            .arg(&input)
            .arg(&output)
            .arg(pattern.threshold)
            .arg(n as u32)
            .global_work_size(config.threads_launched())
            .build()
            .map_err(|e| device_err(&e))?;

        unsafe {
            kernel
                .cmd()
                .local_work_size(config.block_size as usize)
                .enq()
                .map_err(|e| device_err(&e))?;
        }
        proque.finish().map_err(|e| device_err(&e))?;

        let mut host_output = vec![0.0f32; n];
        output
            .cmd()
            .read(&mut host_output)
            .enq()
            .map_err(|e| device_err(&e))?;
        Ok(host_output)
    }

    fn synchronize(&self) -> Result<()> {
        self.lock()?.finish().map_err(|e| device_err(&e))
    }
}
