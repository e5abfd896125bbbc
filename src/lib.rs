//! Vulkan bring-up without the boilerplate: instance and device builders,
//! swapchain construction, and a double-buffered present loop on [ash](ash).
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod device;
mod error;
mod frame;
mod host;
mod instance;
mod swapchain;
mod sync;
#[cfg(feature = "enable_tracing")]
mod tracing;
mod version;

pub use device::{
    Device, DeviceBuilder, PhysicalDevice, PhysicalDeviceSelector, PreferredDeviceType, QueueType,
};
pub use error::*;
pub use frame::{FrameLoop, FrameLoopBuilder};
pub use host::{HostInfo, VALIDATION_LAYER_NAME};
pub use instance::{Instance, InstanceBuilder, WindowSource};
pub use swapchain::{BufferMode, Swapchain, SwapchainBuilder};
pub use sync::{FrameSync, create_fence, create_semaphore, reset_fence, wait_for_fence};
pub use version::Version;
