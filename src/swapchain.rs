use std::sync::Arc;

use ash::vk::AllocationCallbacks;
use ash::{khr, vk};

use crate::error::FormatError;
use crate::{Device, Instance, QueueType, SwapchainError};

/// Common minimum image counts, for use with
/// [`SwapchainBuilder::desired_min_image_count`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Ord, Eq)]
pub enum BufferMode {
    SingleBuffering = 1,
    DoubleBuffering = 2,
    TripleBuffering = 3,
}

impl From<BufferMode> for u32 {
    fn from(mode: BufferMode) -> u32 {
        mode as u32
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
enum Priority {
    Main,
    Fallback,
}

#[derive(Debug, Clone, Copy)]
struct Format {
    inner: vk::SurfaceFormatKHR,
    priority: Priority,
}

#[derive(Debug, Clone, Copy)]
struct PresentMode {
    inner: vk::PresentModeKHR,
    priority: Priority,
}

struct SurfaceSupportDetails {
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
}

fn query_surface_support_details(
    phys_device: vk::PhysicalDevice,
    surface_loader: Option<&khr::surface::Instance>,
    surface: Option<vk::SurfaceKHR>,
) -> crate::Result<SurfaceSupportDetails> {
    let Some((surface_loader, surface)) = surface_loader.zip(surface) else {
        return Err(SwapchainError::SurfaceHandleNotProvided.into());
    };

    // SAFETY: the surface was created from this instance and is still alive.
    let capabilities =
        unsafe { surface_loader.get_physical_device_surface_capabilities(phys_device, surface) }
            .map_err(SwapchainError::FailedQuerySurfaceSupportDetails)?;
    let formats =
        unsafe { surface_loader.get_physical_device_surface_formats(phys_device, surface) }
            .map_err(SwapchainError::FailedQuerySurfaceSupportDetails)?;
    let present_modes =
        unsafe { surface_loader.get_physical_device_surface_present_modes(phys_device, surface) }
            .map_err(SwapchainError::FailedQuerySurfaceSupportDetails)?;

    Ok(SurfaceSupportDetails {
        capabilities,
        formats,
        present_modes,
    })
}

fn default_formats() -> Vec<Format> {
    vec![
        Format {
            inner: vk::SurfaceFormatKHR::default()
                .format(vk::Format::B8G8R8A8_SRGB)
                .color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR),
            priority: Priority::Main,
        },
        Format {
            inner: vk::SurfaceFormatKHR::default()
                .format(vk::Format::R8G8B8A8_SRGB)
                .color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR),
            priority: Priority::Fallback,
        },
    ]
}

fn default_present_modes() -> Vec<PresentMode> {
    vec![
        PresentMode {
            inner: vk::PresentModeKHR::MAILBOX,
            priority: Priority::Main,
        },
        PresentMode {
            inner: vk::PresentModeKHR::FIFO,
            priority: Priority::Fallback,
        },
    ]
}

fn find_desired_surface_format(
    available: &[vk::SurfaceFormatKHR],
    desired: &mut [Format],
) -> crate::Result<vk::SurfaceFormatKHR> {
    if !desired.is_sorted_by_key(|f| f.priority) {
        desired.sort_by_key(|f| f.priority);
    }

    for desired in desired.iter() {
        for available in available {
            if desired.inner.format == available.format
                && desired.inner.color_space == available.color_space
            {
                return Ok(desired.inner);
            }
        }
    }

    Err(SwapchainError::NoSuitableDesiredFormat(FormatError {
        available: available.to_vec(),
        desired: desired.iter().map(|d| d.inner).collect(),
    })
    .into())
}

fn find_best_surface_format(
    available: &[vk::SurfaceFormatKHR],
    desired: &mut [Format],
) -> vk::SurfaceFormatKHR {
    find_desired_surface_format(available, desired).unwrap_or(available[0])
}

fn find_present_mode(
    available: &[vk::PresentModeKHR],
    desired: &mut [PresentMode],
) -> vk::PresentModeKHR {
    if !desired.is_sorted_by_key(|m| m.priority) {
        desired.sort_by_key(|m| m.priority);
    }

    desired
        .iter()
        .map(|d| d.inner)
        .find(|mode| available.contains(mode))
        // FIFO is the one mode every presentation engine offers.
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

fn resolve_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: u32,
    required: u32,
) -> std::result::Result<u32, SwapchainError> {
    let mut image_count = if required >= 1 {
        if required < capabilities.min_image_count {
            return Err(SwapchainError::RequiredMinImageCountTooLow);
        }
        required
    } else if desired == 0 {
        // minImageCount + 1 typically lands on triple buffering, which is
        // what most drivers hand out anyway.
        capabilities.min_image_count + 1
    } else {
        desired.max(capabilities.min_image_count)
    };

    // maxImageCount of zero means no upper limit.
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }
    Ok(image_count)
}

fn resolve_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    // A fixed currentExtent is authoritative; the all-ones sentinel means the
    // surface takes its size from the swapchain.
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

pub struct SwapchainBuilder {
    instance: Arc<Instance>,
    device: Arc<Device>,
    allocation_callbacks: Option<AllocationCallbacks<'static>>,
    desired_formats: Vec<Format>,
    create_flags: vk::SwapchainCreateFlagsKHR,
    desired_extent: vk::Extent2D,
    array_layer_count: u32,
    min_image_count: u32,
    required_min_image_count: u32,
    image_usage_flags: vk::ImageUsageFlags,
    composite_alpha: vk::CompositeAlphaFlagsKHR,
    desired_present_modes: Vec<PresentMode>,
    pre_transform: vk::SurfaceTransformFlagsKHR,
    clipped: bool,
    old_swapchain: vk::SwapchainKHR,
}

impl SwapchainBuilder {
    pub fn new(instance: Arc<Instance>, device: Arc<Device>) -> Self {
        Self {
            allocation_callbacks: instance.allocation_callbacks,
            instance,
            device,
            desired_formats: Vec::with_capacity(4),
            create_flags: vk::SwapchainCreateFlagsKHR::default(),
            desired_extent: vk::Extent2D {
                width: 256,
                height: 256,
            },
            array_layer_count: 1,
            min_image_count: 0,
            required_min_image_count: 0,
            image_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            pre_transform: vk::SurfaceTransformFlagsKHR::default(),
            desired_present_modes: Vec::with_capacity(4),
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            clipped: true,
            old_swapchain: Default::default(),
        }
    }

    /// Size the swapchain falls back to when the surface does not dictate
    /// one. Most platforms report a fixed extent that overrides this.
    pub fn desired_extent(mut self, width: u32, height: u32) -> Self {
        self.desired_extent = vk::Extent2D { width, height };
        self
    }

    pub fn desired_format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.desired_formats.push(Format {
            inner: format,
            priority: Priority::Main,
        });
        self
    }

    pub fn fallback_format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.desired_formats.push(Format {
            inner: format,
            priority: Priority::Fallback,
        });
        self
    }

    /// Use the default swapchain formats. This is done if no formats are provided.
    ///
    /// Default surface format is [
    ///     [`vk::Format::B8G8R8A8_SRGB`],
    ///     [`vk::ColorSpaceKHR::SRGB_NONLINEAR`]
    /// ]
    pub fn use_default_format_selection(mut self) -> Self {
        self.desired_formats = default_formats();
        self
    }

    pub fn desired_present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.desired_present_modes.push(PresentMode {
            inner: present_mode,
            priority: Priority::Main,
        });
        self
    }

    pub fn fallback_present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.desired_present_modes.push(PresentMode {
            inner: present_mode,
            priority: Priority::Fallback,
        });
        self
    }

    pub fn use_default_present_modes(mut self) -> Self {
        self.desired_present_modes = default_present_modes();
        self
    }

    /// Sets the desired minimum image count for the swapchain.
    /// Note that the presentation engine is always free to create more images than requested.
    /// You may pass one of the values specified in the [`BufferMode`] enum, or any integer value.
    /// For instance, if you pass [`BufferMode::DoubleBuffering`], the presentation engine is
    /// allowed to give you a double buffering setup, triple buffering, or more. This is up to the drivers.
    pub fn desired_min_image_count(mut self, min_image_count: u32) -> Self {
        self.min_image_count = min_image_count;
        self
    }

    /// Sets a required minimum image count. Building fails with
    /// [`SwapchainError::RequiredMinImageCountTooLow`] when the surface
    /// cannot provide it.
    pub fn required_min_image_count(mut self, required_min_image_count: u32) -> Self {
        self.required_min_image_count = required_min_image_count;
        self
    }

    /// Set whether the Vulkan implementation is allowed to discard rendering operations that
    /// affect regions of the surface that are not visible. Default is true.
    /// # Note:
    /// Applications should use the default of true if:
    /// - They do not expect to read back the content of presentable images before presenting them or after reacquiring them
    /// - If their fragment shaders do not have any side effects that require them to run for all pixels in the presentable image.
    pub fn clipped(mut self, clipped: bool) -> Self {
        self.clipped = clipped;
        self
    }

    pub fn create_flags(mut self, flags: vk::SwapchainCreateFlagsKHR) -> Self {
        self.create_flags = flags;
        self
    }

    /// Set the bitmask of the image usage for acquired swapchain images.
    /// If the surface capabilities cannot allow it, building the swapchain will result in the
    /// [`SwapchainError::RequiredUsageNotSupported`] error.
    pub fn image_usage_flags(mut self, flags: vk::ImageUsageFlags) -> Self {
        self.image_usage_flags = flags;
        self
    }

    /// Add a image usage to the bitmask for acquired swapchain images.
    pub fn add_image_usage_flags(mut self, flags: vk::ImageUsageFlags) -> Self {
        self.image_usage_flags |= flags;
        self
    }

    pub fn image_array_layer_count(mut self, count: u32) -> Self {
        self.array_layer_count = count;
        self
    }

    pub fn composite_alpha(mut self, composite_alpha: vk::CompositeAlphaFlagsKHR) -> Self {
        self.composite_alpha = composite_alpha;
        self
    }

    /// Transform applied to images at presentation, for example a rotation on
    /// mobile. Defaults to whatever the surface currently reports.
    pub fn pre_transform(mut self, pre_transform: vk::SurfaceTransformFlagsKHR) -> Self {
        self.pre_transform = pre_transform;
        self
    }

    /// Hand over the retiring swapchain when rebuilding after a resize. The
    /// old one still has to be destroyed by the caller afterwards.
    pub fn old_swapchain(mut self, old_swapchain: vk::SwapchainKHR) -> Self {
        self.old_swapchain = old_swapchain;
        self
    }

    pub fn allocation_callbacks(mut self, allocation_callbacks: AllocationCallbacks<'static>) -> Self {
        self.allocation_callbacks = Some(allocation_callbacks);
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(&mut self) -> crate::Result<Swapchain> {
        if self.instance.surface.is_none() {
            return Err(SwapchainError::SurfaceHandleNotProvided.into());
        };

        if self.desired_formats.is_empty() {
            self.desired_formats = default_formats();
        };
        if self.desired_present_modes.is_empty() {
            self.desired_present_modes = default_present_modes();
        }

        let surface_support = query_surface_support_details(
            self.device.physical_device.physical_device,
            self.instance.surface_loader.as_ref(),
            self.instance.surface,
        )?;

        let image_count = resolve_image_count(
            &surface_support.capabilities,
            self.min_image_count,
            self.required_min_image_count,
        )?;

        let surface_format =
            find_best_surface_format(&surface_support.formats, &mut self.desired_formats);
        let present_mode = find_present_mode(
            &surface_support.present_modes,
            &mut self.desired_present_modes,
        );
        let extent = resolve_extent(&surface_support.capabilities, self.desired_extent);

        let array_layer_count = if surface_support.capabilities.max_image_array_layers
            < self.array_layer_count
        {
            surface_support.capabilities.max_image_array_layers
        } else {
            self.array_layer_count.max(1)
        };

        if !surface_support
            .capabilities
            .supported_usage_flags
            .contains(self.image_usage_flags)
        {
            return Err(SwapchainError::RequiredUsageNotSupported.into());
        }

        let pre_transform = if self.pre_transform == vk::SurfaceTransformFlagsKHR::default() {
            surface_support.capabilities.current_transform
        } else {
            self.pre_transform
        };

        let graphics_family = self.device.get_queue_index(QueueType::Graphics)?;
        let present_family = self.device.get_queue_index(QueueType::Present)?;
        let family_indices = [graphics_family, present_family];

        let mut swapchain_create_info = vk::SwapchainCreateInfoKHR::default()
            .flags(self.create_flags)
            .surface(self.instance.surface.unwrap_or_default())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(array_layer_count)
            .image_usage(self.image_usage_flags)
            .pre_transform(pre_transform)
            .composite_alpha(self.composite_alpha)
            .present_mode(present_mode)
            .clipped(self.clipped)
            .old_swapchain(self.old_swapchain);

        // Images shared across distinct graphics and present families skip
        // the ownership transfers this crate never records.
        swapchain_create_info = if graphics_family != present_family {
            swapchain_create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            swapchain_create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain_device =
            khr::swapchain::Device::new(&self.instance.instance, &self.device.device);
        // SAFETY: the create info only references locals that outlive the call.
        let swapchain = unsafe {
            swapchain_device
                .create_swapchain(&swapchain_create_info, self.allocation_callbacks.as_ref())
        }
        .map_err(SwapchainError::FailedCreateSwapchain)?;

        // SAFETY: the swapchain was just created from this loader.
        let images = unsafe { swapchain_device.get_swapchain_images(swapchain) }
            .map_err(SwapchainError::FailedGetSwapchainImages)?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!(
            format = ?surface_format.format,
            ?present_mode,
            ?extent,
            images = images.len(),
            "Created swapchain"
        );

        Ok(Swapchain {
            device: self.device.device.clone(),
            swapchain,
            swapchain_device,
            images,
            image_format: surface_format.format,
            color_space: surface_format.color_space,
            image_usage_flags: self.image_usage_flags,
            extent,
            requested_min_image_count: image_count,
            present_mode,
            allocation_callbacks: self.allocation_callbacks,
        })
    }
}

pub struct Swapchain {
    device: ash::Device,
    swapchain: vk::SwapchainKHR,
    swapchain_device: khr::swapchain::Device,
    images: Vec<vk::Image>,
    image_format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    image_usage_flags: vk::ImageUsageFlags,
    extent: vk::Extent2D,
    requested_min_image_count: u32,
    present_mode: vk::PresentModeKHR,
    allocation_callbacks: Option<AllocationCallbacks<'static>>,
}

impl Swapchain {
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    pub fn image_usage_flags(&self) -> vk::ImageUsageFlags {
        self.image_usage_flags
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn requested_min_image_count(&self) -> u32 {
        self.requested_min_image_count
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// One color view per swapchain image, in image order. The views are the
    /// caller's to destroy, see [`Self::destroy_image_views`].
    pub fn create_image_views(&self) -> crate::Result<Vec<vk::ImageView>> {
        let mut views = Vec::with_capacity(self.images.len());
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.image_format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            // SAFETY: the image belongs to this swapchain's device.
            match unsafe {
                self.device
                    .create_image_view(&create_info, self.allocation_callbacks.as_ref())
            } {
                Ok(view) => views.push(view),
                Err(err) => {
                    self.destroy_image_views(&views);
                    return Err(SwapchainError::FailedCreateSwapchainImageViews(err).into());
                }
            }
        }
        Ok(views)
    }

    pub fn destroy_image_views(&self, views: &[vk::ImageView]) {
        for &view in views {
            // SAFETY: the view was created from this device.
            unsafe {
                self.device
                    .destroy_image_view(view, self.allocation_callbacks.as_ref());
            }
        }
    }

    /// Acquires the next presentable image, signaling `semaphore` once the
    /// presentation engine releases it. Returns the image index and whether
    /// the swapchain is suboptimal for the surface.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> crate::Result<(u32, bool)> {
        // SAFETY: swapchain and semaphore belong to this device.
        let acquired = unsafe {
            self.swapchain_device.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }?;
        Ok(acquired)
    }

    /// Queues the image for presentation after `wait_semaphores`. Returns
    /// whether the swapchain is suboptimal for the surface.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> crate::Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: the queue comes from the device this swapchain was built on.
        let suboptimal = unsafe { self.swapchain_device.queue_present(queue, &present_info) }?;
        Ok(suboptimal)
    }

    pub fn destroy(&self) {
        // SAFETY: callers destroy image views first and keep the surface
        // alive until after this returns.
        unsafe {
            self.swapchain_device
                .destroy_swapchain(self.swapchain, self.allocation_callbacks.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR::default()
            .format(format)
            .color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
    }

    #[test]
    fn default_formats_prefer_bgra() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        let picked = find_best_surface_format(&available, &mut default_formats());
        assert_eq!(picked.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn fallback_format_is_used_when_the_main_one_is_missing() {
        let available = [surface_format(vk::Format::R8G8B8A8_SRGB)];
        let picked = find_best_surface_format(&available, &mut default_formats());
        assert_eq!(picked.format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn main_formats_are_checked_before_fallbacks_regardless_of_insertion_order() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        let mut desired = vec![
            Format {
                inner: surface_format(vk::Format::R8G8B8A8_SRGB),
                priority: Priority::Fallback,
            },
            Format {
                inner: surface_format(vk::Format::B8G8R8A8_SRGB),
                priority: Priority::Main,
            },
        ];
        let picked = find_best_surface_format(&available, &mut desired);
        assert_eq!(picked.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn missing_desired_format_reports_both_sides() {
        let available = [surface_format(vk::Format::R5G6B5_UNORM_PACK16)];
        let result = find_desired_surface_format(&available, &mut default_formats());
        match result {
            Err(crate::Error::Swapchain(SwapchainError::NoSuitableDesiredFormat(err))) => {
                assert_eq!(err.available, available.to_vec());
                assert_eq!(err.desired.len(), 2);
            }
            other => panic!("expected NoSuitableDesiredFormat, got {other:?}"),
        }
    }

    #[test]
    fn best_format_falls_back_to_the_first_available() {
        let available = [surface_format(vk::Format::R5G6B5_UNORM_PACK16)];
        let picked = find_best_surface_format(&available, &mut default_formats());
        assert_eq!(picked.format, vk::Format::R5G6B5_UNORM_PACK16);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        let picked = find_present_mode(&available, &mut default_present_modes());
        assert_eq!(picked, vk::PresentModeKHR::FIFO);

        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        let picked = find_present_mode(&with_mailbox, &mut default_present_modes());
        assert_eq!(picked, vk::PresentModeKHR::MAILBOX);

        let none_desired = [vk::PresentModeKHR::IMMEDIATE];
        let picked = find_present_mode(&none_desired, &mut vec![]);
        assert_eq!(picked, vk::PresentModeKHR::FIFO);
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn unset_image_count_requests_one_over_the_minimum() {
        assert_eq!(resolve_image_count(&capabilities(2, 8), 0, 0), Ok(3));
    }

    #[test]
    fn desired_image_count_is_clamped_to_surface_limits() {
        assert_eq!(resolve_image_count(&capabilities(2, 8), 1, 0), Ok(2));
        assert_eq!(resolve_image_count(&capabilities(2, 8), 16, 0), Ok(8));
        // A zero maximum means the surface imposes no upper limit.
        assert_eq!(resolve_image_count(&capabilities(2, 0), 16, 0), Ok(16));
    }

    #[test]
    fn buffer_modes_translate_to_image_counts() {
        let triple = u32::from(BufferMode::TripleBuffering);
        assert_eq!(resolve_image_count(&capabilities(2, 8), triple, 0), Ok(3));
        assert_eq!(
            resolve_image_count(&capabilities(2, 2), triple, 0),
            Ok(u32::from(BufferMode::DoubleBuffering))
        );
    }

    #[test]
    fn required_image_count_below_the_surface_minimum_fails() {
        assert_eq!(
            resolve_image_count(&capabilities(3, 8), 0, 2),
            Err(SwapchainError::RequiredMinImageCountTooLow)
        );
        assert_eq!(resolve_image_count(&capabilities(3, 8), 0, 4), Ok(4));
    }

    #[test]
    fn fixed_surface_extents_are_authoritative() {
        let mut caps = capabilities(2, 8);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = resolve_extent(
            &caps,
            vk::Extent2D {
                width: 1024,
                height: 768,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn undefined_surface_extents_clamp_the_desired_size() {
        let mut caps = capabilities(2, 8);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps.min_image_extent = vk::Extent2D {
            width: 64,
            height: 64,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        let extent = resolve_extent(
            &caps,
            vk::Extent2D {
                width: 4096,
                height: 16,
            },
        );
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 64);
    }
}
