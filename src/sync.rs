//! Semaphores and fences for frame pacing.

use ash::vk;

use crate::{Device, Result};

pub fn create_semaphore(device: &Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    // SAFETY: the device is live.
    let semaphore = unsafe {
        device
            .device
            .create_semaphore(&create_info, device.allocation_callbacks.as_ref())
    }?;
    Ok(semaphore)
}

pub fn create_fence(device: &Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    // SAFETY: the device is live.
    let fence = unsafe {
        device
            .device
            .create_fence(&create_info, device.allocation_callbacks.as_ref())
    }?;
    Ok(fence)
}

pub fn wait_for_fence(device: &Device, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
    // SAFETY: the fence belongs to this device.
    unsafe { device.device.wait_for_fences(&[fence], true, timeout_ns) }?;
    Ok(())
}

pub fn reset_fence(device: &Device, fence: vk::Fence) -> Result<()> {
    // SAFETY: the fence belongs to this device.
    unsafe { device.device.reset_fences(&[fence]) }?;
    Ok(())
}

/// Synchronization objects one in-flight frame owns.
pub struct FrameSync {
    /// Signaled when the presentation engine releases the acquired image.
    pub image_available: vk::Semaphore,
    /// Signaled when the frame's submitted work completes.
    pub render_finished: vk::Semaphore,
    /// Signaled when the frame's submission retires. Born signaled so the
    /// first wait on a fresh slot passes immediately.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &Device) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
        })
    }

    /// Blocks until the slot's previous submission retires.
    pub fn wait(&self, device: &Device) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    pub fn reset(&self, device: &Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    pub fn destroy(&self, device: &Device) {
        // SAFETY: the caller waited for the slot's work to retire.
        unsafe {
            device
                .device
                .destroy_semaphore(self.image_available, device.allocation_callbacks.as_ref());
            device
                .device
                .destroy_semaphore(self.render_finished, device.allocation_callbacks.as_ref());
            device
                .device
                .destroy_fence(self.in_flight, device.allocation_callbacks.as_ref());
        }
    }
}
