//! A fixed-slot frame loop over a swapchain.
//!
//! [`FrameLoop`] owns the per-slot command buffers and synchronization
//! objects for a small number of frames in flight and drives the
//! wait, acquire, record, submit, present cycle each call to
//! [`FrameLoop::frame`]. Work recording is handed to a closure; the loop
//! itself transitions the acquired image to `PRESENT_SRC_KHR`, so a frame
//! that records nothing still presents correctly.

use std::sync::Arc;

use ash::vk;

use crate::swapchain::Swapchain;
use crate::sync::FrameSync;
use crate::{Device, QueueType, Result};

const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

fn next_slot(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight
}

/// Transition to `PRESENT_SRC_KHR` that every frame records last. The
/// `UNDEFINED` source layout deliberately discards the image contents, so
/// frames that rendered nothing stay valid.
fn present_barrier(image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
        .old_layout(vk::ImageLayout::UNDEFINED)
        .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(vk::REMAINING_MIP_LEVELS)
                .base_array_layer(0)
                .layer_count(vk::REMAINING_ARRAY_LAYERS),
        )
}

struct FrameSlot {
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
}

pub struct FrameLoopBuilder {
    device: Arc<Device>,
    frames_in_flight: u32,
    submit_queue_type: QueueType,
    present_queue_type: QueueType,
}

impl FrameLoopBuilder {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            submit_queue_type: QueueType::Graphics,
            present_queue_type: QueueType::Present,
        }
    }

    /// How many frames may be recorded before the oldest must retire.
    /// Defaults to two, one being recorded while one is on screen.
    pub fn frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Queue the recorded command buffers are submitted to. The command pool
    /// lives on this queue's family. Defaults to the graphics queue.
    pub fn submit_queue(mut self, queue_type: QueueType) -> Self {
        self.submit_queue_type = queue_type;
        self
    }

    /// Queue presentation happens on. Defaults to the present queue.
    pub fn present_queue(mut self, queue_type: QueueType) -> Self {
        self.present_queue_type = queue_type;
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(self) -> Result<FrameLoop> {
        let frames_in_flight = self.frames_in_flight.max(1);
        let (submit_family, submit_queue) = self.device.get_queue(self.submit_queue_type)?;
        let (_, present_queue) = self.device.get_queue(self.present_queue_type)?;

        let pool_create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(submit_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        // SAFETY: the device is live and the family index came from it.
        let command_pool = unsafe {
            self.device
                .device
                .create_command_pool(&pool_create_info, self.device.allocation_callbacks.as_ref())
        }?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames_in_flight);
        // SAFETY: the pool was just created on this device.
        let command_buffers =
            unsafe { self.device.device.allocate_command_buffers(&allocate_info) }?;

        let mut frames = Vec::with_capacity(frames_in_flight as usize);
        for command_buffer in command_buffers {
            frames.push(FrameSlot {
                command_buffer,
                sync: FrameSync::new(&self.device)?,
            });
        }

        #[cfg(feature = "enable_tracing")]
        tracing::info!(
            frames_in_flight,
            submit_family,
            "Created frame loop"
        );

        Ok(FrameLoop {
            device: self.device,
            command_pool,
            submit_queue,
            submit_family,
            present_queue,
            frames,
            current_slot: 0,
        })
    }
}

pub struct FrameLoop {
    device: Arc<Device>,
    command_pool: vk::CommandPool,
    submit_queue: vk::Queue,
    submit_family: u32,
    present_queue: vk::Queue,
    frames: Vec<FrameSlot>,
    current_slot: usize,
}

impl FrameLoop {
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Slot the next [`frame`](Self::frame) call will use.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Family the command pool and submissions live on.
    pub fn submit_queue_family(&self) -> u32 {
        self.submit_family
    }

    /// Runs one frame: waits for the slot's previous submission, acquires an
    /// image, records `record` into the slot's command buffer, transitions
    /// the image for presentation, submits, presents, and advances to the
    /// next slot.
    ///
    /// The transition uses `vkCmdPipelineBarrier2`, so the device must have
    /// been created with the `synchronization2` feature. Returns whether the
    /// swapchain reported itself suboptimal for the surface; acquire and
    /// present failures such as `ERROR_OUT_OF_DATE_KHR` surface as errors.
    pub fn frame<F>(&mut self, swapchain: &Swapchain, record: F) -> Result<bool>
    where
        F: FnOnce(vk::CommandBuffer, vk::Image),
    {
        let device = &self.device.device;
        let slot = &self.frames[self.current_slot];

        slot.sync.wait(&self.device)?;
        slot.sync.reset(&self.device)?;

        let (image_index, acquire_suboptimal) =
            swapchain.acquire_next_image(slot.sync.image_available, u64::MAX)?;
        let image = swapchain.images()[image_index as usize];

        // SAFETY: the fence wait above guarantees the buffer is no longer
        // in flight, and the pool allows per-buffer resets.
        unsafe {
            device.reset_command_buffer(
                slot.command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )
        }?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: the buffer was reset and is not pending.
        unsafe { device.begin_command_buffer(slot.command_buffer, &begin_info) }?;

        record(slot.command_buffer, image);

        let barriers = [present_barrier(image)];
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        // SAFETY: the buffer is in the recording state.
        unsafe { device.cmd_pipeline_barrier2(slot.command_buffer, &dependency_info) };
        unsafe { device.end_command_buffer(slot.command_buffer) }?;

        let wait_semaphores = [slot.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let command_buffers = [slot.command_buffer];
        let signal_semaphores = [slot.sync.render_finished];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        // SAFETY: everything referenced lives until the fence signals, which
        // the slot waits on before reuse.
        unsafe { device.queue_submit(self.submit_queue, &[submit_info], slot.sync.in_flight) }?;

        let present_suboptimal =
            swapchain.present(self.present_queue, image_index, &signal_semaphores)?;

        self.current_slot = next_slot(self.current_slot, self.frames.len());
        Ok(acquire_suboptimal || present_suboptimal)
    }

    pub fn destroy(&self) {
        for slot in &self.frames {
            slot.sync.destroy(&self.device);
        }
        // SAFETY: destroying the pool frees the slot command buffers with it;
        // the caller waited for the device to go idle.
        unsafe {
            self.device
                .device
                .destroy_command_pool(self.command_pool, self.device.allocation_callbacks.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_advance_in_a_cycle() {
        assert_eq!(next_slot(0, 2), 1);
        assert_eq!(next_slot(1, 2), 0);
        assert_eq!(next_slot(2, 3), 0);
        assert_eq!(next_slot(0, 1), 0);
    }

    #[test]
    fn present_barrier_discards_into_present_layout() {
        let barrier = present_barrier(vk::Image::null());
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(barrier.src_stage_mask, vk::PipelineStageFlags2::ALL_COMMANDS);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags2::MEMORY_WRITE);
        assert_eq!(
            barrier.dst_access_mask,
            vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ
        );
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(barrier.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }

    #[test]
    fn present_barrier_covers_every_mip_and_layer() {
        let range = present_barrier(vk::Image::null()).subresource_range;
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, vk::REMAINING_ARRAY_LAYERS);
    }
}
