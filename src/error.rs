use ash::vk;
use thiserror::Error;

use crate::version::Version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Instance error: {0}")]
    Instance(#[from] InstanceError),
    #[error("Physical device error: {0}")]
    PhysicalDevice(#[from] PhysicalDeviceError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Swapchain error: {0}")]
    Swapchain(#[from] SwapchainError),
    #[error("Vulkan loading error: {0}")]
    Loading(#[from] ash::LoadingError),
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("Vulkan {0} unavailable, loader supports {1}")]
    VulkanVersionUnavailable(Version, Version),
    #[error("Failed to create instance: {0}")]
    FailedCreateInstance(vk::Result),
    #[error("Window handle unavailable")]
    WindowHandleUnavailable,
    #[error("Failed to find requested layers: {0:?}")]
    RequestedLayersNotPresent(Vec<String>),
    #[error("Failed to find requested extensions: {0:?}")]
    RequestedExtensionsNotPresent(Vec<String>),
    #[error("Failed to find windowing extensions: {0:?}")]
    WindowingExtensionsNotPresent(Vec<String>),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum PhysicalDeviceError {
    #[error("No surface provided")]
    NoSurfaceProvided,
    #[error("Failed to enumerate physical devices: {0}")]
    FailedToEnumeratePhysicalDevices(vk::Result),
    #[error("No physical devices found")]
    NoPhysicalDevicesFound,
    #[error("No suitable device")]
    NoSuitableDevice,
}

#[derive(Debug, PartialOrd, PartialEq, Eq, Ord, Error)]
pub enum QueueError {
    #[error("Present unavailable")]
    PresentUnavailable,
    #[error("Graphics unavailable")]
    GraphicsUnavailable,
    #[error("Compute unavailable")]
    ComputeUnavailable,
    #[error("Transfer unavailable")]
    TransferUnavailable,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FormatError {
    pub available: Vec<vk::SurfaceFormatKHR>,
    pub desired: Vec<vk::SurfaceFormatKHR>,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum SwapchainError {
    #[error("Surface handle not provided")]
    SurfaceHandleNotProvided,
    #[error("Failed to query surface support details: {0}")]
    FailedQuerySurfaceSupportDetails(vk::Result),
    #[error("Failed to create swapchain: {0}")]
    FailedCreateSwapchain(vk::Result),
    #[error("Failed to get swapchain images: {0}")]
    FailedGetSwapchainImages(vk::Result),
    #[error("Failed to create swapchain image views: {0}")]
    FailedCreateSwapchainImageViews(vk::Result),
    #[error("Required min image count too low")]
    RequiredMinImageCountTooLow,
    #[error("Required usage not supported")]
    RequiredUsageNotSupported,
    #[error("No suitable desired format, available: {:?}", .0.available)]
    NoSuitableDesiredFormat(FormatError),
}

pub type Result<T> = std::result::Result<T, Error>;
