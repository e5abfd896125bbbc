use std::borrow::Cow;
use std::ffi::{self, CStr, CString};
use std::fmt::Debug;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::host::{HostInfo, VALIDATION_LAYER_NAME};
use crate::version::Version;
use crate::{InstanceError, Result};

pub trait WindowSource: HasDisplayHandle + HasWindowHandle + Debug {}
impl<T> WindowSource for T where T: HasDisplayHandle + HasWindowHandle + Debug {}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes a valid callback data pointer for the duration
    // of the call.
    unsafe {
        let callback_data = *p_callback_data;
        let message_id_number = callback_data.message_id_number;

        let message_id_name = if callback_data.p_message_id_name.is_null() {
            Cow::from("")
        } else {
            CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
        };

        let message = if callback_data.p_message.is_null() {
            Cow::from("")
        } else {
            CStr::from_ptr(callback_data.p_message).to_string_lossy()
        };

        println!(
            "{message_severity:?}:\n{message_type:?} [{message_id_name} ({message_id_number})] : {message}\n",
        );
    }

    vk::FALSE
}

#[derive(Debug)]
pub struct InstanceBuilder {
    // VkApplicationInfo
    app_name: String,
    engine_name: String,
    application_version: Version,
    engine_version: Version,
    minimum_instance_version: Version,
    required_instance_version: Version,

    // VkInstanceCreateInfo
    layers: Vec<CString>,
    extensions: Vec<CString>,
    flags: vk::InstanceCreateFlags,

    // debug callback
    debug_callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    debug_message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    debug_message_type: vk::DebugUtilsMessageTypeFlagsEXT,

    // validation checks
    disabled_validation_checks: Vec<vk::ValidationCheckEXT>,
    enabled_validation_features: Vec<vk::ValidationFeatureEnableEXT>,
    disabled_validation_features: Vec<vk::ValidationFeatureDisableEXT>,

    allocation_callbacks: Option<vk::AllocationCallbacks<'static>>,

    request_validation_layers: bool,
    enable_validation_layers: bool,
    use_debug_messenger: bool,
    headless_context: bool,

    window: Option<Arc<dyn WindowSource>>,
}

impl InstanceBuilder {
    pub fn new(window: Option<Arc<dyn WindowSource>>) -> Self {
        Self {
            app_name: String::new(),
            engine_name: String::new(),
            application_version: Version::new(0, 0, 0),
            engine_version: Version::new(0, 0, 0),
            minimum_instance_version: Version::V1_0,
            required_instance_version: Version::V1_0,
            layers: vec![],
            extensions: vec![],
            flags: vk::InstanceCreateFlags::default(),
            debug_callback: None,
            debug_message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            debug_message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            disabled_validation_checks: vec![],
            enabled_validation_features: vec![],
            disabled_validation_features: vec![],
            allocation_callbacks: None,
            request_validation_layers: false,
            enable_validation_layers: false,
            use_debug_messenger: false,
            headless_context: false,
            window,
        }
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn engine_name(mut self, engine_name: impl Into<String>) -> Self {
        self.engine_name = engine_name.into();
        self
    }

    pub fn app_version(mut self, version: Version) -> Self {
        self.application_version = version;
        self
    }

    pub fn engine_version(mut self, version: Version) -> Self {
        self.engine_version = version;
        self
    }

    pub fn require_api_version(mut self, version: Version) -> Self {
        self.required_instance_version = version;
        self
    }

    /// Lowest loader version the application can still run on. Setting this
    /// relaxes [`require_api_version`](Self::require_api_version) into a
    /// preference instead of a hard floor.
    pub fn minimum_instance_version(mut self, version: Version) -> Self {
        self.minimum_instance_version = version;
        self
    }

    pub fn enable_layer(mut self, layer: &CStr) -> Self {
        self.layers.push(layer.to_owned());
        self
    }

    pub fn enable_extension(mut self, extension: &CStr) -> Self {
        self.extensions.push(extension.to_owned());
        self
    }

    pub fn enable_validation_layers(mut self, enable: bool) -> Self {
        self.enable_validation_layers = enable;
        self
    }

    /// Enables validation layers only when the host has them, instead of
    /// failing the build.
    pub fn request_validation_layers(mut self, request: bool) -> Self {
        self.request_validation_layers = request;
        self
    }

    pub fn use_default_debug_messenger(mut self) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = Some(vulkan_debug_callback);
        self
    }

    #[cfg(feature = "enable_tracing")]
    pub fn use_default_tracing_messenger(mut self) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = Some(crate::tracing::vulkan_tracing_callback);
        self
    }

    pub fn set_debug_messenger(
        mut self,
        callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    ) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = callback;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless_context = headless;
        self
    }

    pub fn debug_messenger_severity(
        mut self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> Self {
        self.debug_message_severity = severity;
        self
    }

    pub fn add_debug_messenger_severity(
        mut self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> Self {
        self.debug_message_severity |= severity;
        self
    }

    pub fn debug_messenger_type(mut self, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        self.debug_message_type = message_type;
        self
    }

    pub fn add_debug_messenger_type(
        mut self,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    ) -> Self {
        self.debug_message_type |= message_type;
        self
    }

    pub fn add_validation_disable_check(mut self, check: vk::ValidationCheckEXT) -> Self {
        self.disabled_validation_checks.push(check);
        self
    }

    pub fn add_validation_feature_enable(mut self, feature: vk::ValidationFeatureEnableEXT) -> Self {
        self.enabled_validation_features.push(feature);
        self
    }

    pub fn add_validation_feature_disable(
        mut self,
        feature: vk::ValidationFeatureDisableEXT,
    ) -> Self {
        self.disabled_validation_features.push(feature);
        self
    }

    pub fn allocation_callbacks(mut self, callbacks: vk::AllocationCallbacks<'static>) -> Self {
        self.allocation_callbacks = Some(callbacks);
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(self) -> Result<Arc<Instance>> {
        let host = HostInfo::probe()?;

        let api_version = negotiate_api_version(
            host.loader_version,
            self.required_instance_version,
            self.minimum_instance_version,
        )?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!(loader = %host.loader_version, negotiated = %api_version, "Instance version");

        let app_name = CString::new(self.app_name.as_str()).map_err(anyhow::Error::from)?;
        let engine_name = CString::new(self.engine_name.as_str()).map_err(anyhow::Error::from)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(self.application_version.to_api_version())
            .engine_name(&engine_name)
            .engine_version(self.engine_version.to_api_version())
            .api_version(api_version.to_api_version());

        #[cfg(feature = "enable_tracing")]
        tracing::debug!(
            app_name = ?app_name,
            app_version = %self.application_version,
            engine_name = ?engine_name,
            engine_version = %self.engine_version,
            api_version = %api_version,
            "Creating vkInstance with application info"
        );

        let mut enabled_extensions: Vec<CString> = vec![];
        let push_extension = |list: &mut Vec<CString>, name: &CStr| {
            if !list.iter().any(|existing| existing.as_c_str() == name) {
                list.push(name.to_owned());
            }
        };

        for extension in &self.extensions {
            push_extension(&mut enabled_extensions, extension);
        }

        let use_debug_messenger =
            self.use_debug_messenger && self.debug_callback.is_some() && host.debug_utils_available;
        if use_debug_messenger {
            push_extension(&mut enabled_extensions, ash::ext::debug_utils::NAME);
        }
        #[cfg(feature = "enable_tracing")]
        if self.use_debug_messenger && !use_debug_messenger {
            tracing::warn!("Debug messenger requested but VK_EXT_debug_utils is unavailable");
        }

        #[cfg(feature = "portability")]
        let portability_available = host.has_extension(ash::khr::portability_enumeration::NAME);
        #[cfg(feature = "portability")]
        if portability_available {
            push_extension(
                &mut enabled_extensions,
                ash::khr::portability_enumeration::NAME,
            );
        }

        if !self.headless_context && self.window.is_some() {
            let display = self.display_handle()?;
            let surface_extensions = ash_window::enumerate_required_extensions(display)?;

            let mut missing = vec![];
            for &extension in surface_extensions {
                // SAFETY: ash-window hands out pointers to static extension names.
                let name = unsafe { CStr::from_ptr(extension) };
                if host.has_extension(name) {
                    push_extension(&mut enabled_extensions, name);
                } else {
                    missing.push(name.to_string_lossy().into_owned());
                }
            }
            if !missing.is_empty() {
                return Err(InstanceError::WindowingExtensionsNotPresent(missing).into());
            }
        }

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(?enabled_extensions);

        let missing_extensions: Vec<String> = enabled_extensions
            .iter()
            .filter(|ext| !host.has_extension(ext))
            .map(|ext| ext.to_string_lossy().into_owned())
            .collect();
        if !missing_extensions.is_empty() {
            return Err(InstanceError::RequestedExtensionsNotPresent(missing_extensions).into());
        }

        let mut enabled_layers: Vec<CString> = self.layers.clone();
        if self.enable_validation_layers
            || (self.request_validation_layers && host.validation_layers_available)
        {
            enabled_layers.push(VALIDATION_LAYER_NAME.to_owned());
        }

        let missing_layers: Vec<String> = enabled_layers
            .iter()
            .filter(|layer| !host.has_layer(layer))
            .map(|layer| layer.to_string_lossy().into_owned())
            .collect();
        if !missing_layers.is_empty() {
            return Err(InstanceError::RequestedLayersNotPresent(missing_layers).into());
        }

        #[cfg(feature = "portability")]
        let instance_create_flags = if portability_available {
            self.flags | vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            self.flags
        };
        #[cfg(not(feature = "portability"))]
        let instance_create_flags = self.flags;

        let enabled_extension_ptrs = enabled_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<_>>();
        let enabled_layer_ptrs = enabled_layers
            .iter()
            .map(|layer| layer.as_ptr())
            .collect::<Vec<_>>();

        let mut instance_create_info = vk::InstanceCreateInfo::default()
            .flags(instance_create_flags)
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extension_ptrs)
            .enabled_layer_names(&enabled_layer_ptrs);

        let mut validation_features = vk::ValidationFeaturesEXT::default()
            .enabled_validation_features(&self.enabled_validation_features)
            .disabled_validation_features(&self.disabled_validation_features);
        if !self.enabled_validation_features.is_empty()
            || !self.disabled_validation_features.is_empty()
        {
            instance_create_info = instance_create_info.push_next(&mut validation_features);
        }

        let mut validation_flags = vk::ValidationFlagsEXT::default();
        if !self.disabled_validation_checks.is_empty() {
            validation_flags =
                validation_flags.disabled_validation_checks(&self.disabled_validation_checks);
            instance_create_info = instance_create_info.push_next(&mut validation_flags);
        }

        // SAFETY: every pointer in the create info refers to storage that
        // outlives the call.
        let instance = unsafe {
            host.entry
                .create_instance(&instance_create_info, self.allocation_callbacks.as_ref())
        }
        .map_err(InstanceError::FailedCreateInstance)?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!("Created vkInstance");

        let mut debug_utils = None;
        if use_debug_messenger {
            let messenger_create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(self.debug_message_severity)
                .message_type(self.debug_message_type)
                .pfn_user_callback(self.debug_callback);

            let loader = ash::ext::debug_utils::Instance::new(&host.entry, &instance);
            // SAFETY: the create info outlives the call and the instance is live.
            let messenger = unsafe {
                loader.create_debug_utils_messenger(
                    &messenger_create_info,
                    self.allocation_callbacks.as_ref(),
                )
            }?;
            debug_utils = Some((loader, messenger));

            #[cfg(feature = "enable_tracing")]
            tracing::trace!("Created debug messenger");
        }

        let mut surface = None;
        let mut surface_loader = None;
        if !self.headless_context {
            if let Some(window) = self.window.as_ref() {
                let display = window
                    .display_handle()
                    .map_err(|_| InstanceError::WindowHandleUnavailable)?;
                let window_handle = window
                    .window_handle()
                    .map_err(|_| InstanceError::WindowHandleUnavailable)?;
                // SAFETY: the window and display handles are valid, and the
                // surface is destroyed before the instance.
                surface = Some(unsafe {
                    ash_window::create_surface(
                        &host.entry,
                        &instance,
                        display.as_raw(),
                        window_handle.as_raw(),
                        self.allocation_callbacks.as_ref(),
                    )
                }?);
                surface_loader = Some(ash::khr::surface::Instance::new(&host.entry, &instance));
                #[cfg(feature = "enable_tracing")]
                tracing::info!("Created vkSurfaceKHR");
            }
        }

        Ok(Arc::new(Instance {
            instance,
            allocation_callbacks: self.allocation_callbacks,
            surface,
            surface_loader,
            instance_version: host.loader_version,
            api_version,
            headless: self.headless_context,
            debug_utils,
            host,
        }))
    }

    fn display_handle(&self) -> Result<raw_window_handle::RawDisplayHandle> {
        let window = self
            .window
            .as_ref()
            .ok_or(InstanceError::WindowHandleUnavailable)?;
        Ok(window
            .display_handle()
            .map_err(|_| InstanceError::WindowHandleUnavailable)?
            .as_raw())
    }
}

/// Picks the apiVersion the instance is created with, or reports what made
/// that impossible.
///
/// `minimum`, when above 1.0, turns `required` into a preference: the loader
/// only has to reach `minimum`, and the instance targets whatever the loader
/// actually supports up to `required`.
fn negotiate_api_version(
    loader: Version,
    required: Version,
    minimum: Version,
) -> std::result::Result<Version, InstanceError> {
    if required <= Version::V1_0 && minimum <= Version::V1_0 {
        return Ok(Version::V1_0);
    }

    let floor = if minimum > Version::V1_0 {
        minimum
    } else {
        required
    };
    if loader < floor {
        return Err(InstanceError::VulkanVersionUnavailable(floor, loader));
    }

    // A 1.0 loader rejects instances targeting anything newer.
    if loader < Version::V1_1 {
        return Ok(loader);
    }

    Ok(required.max(minimum).min(loader))
}

pub struct Instance {
    pub(crate) instance: ash::Instance,
    pub(crate) allocation_callbacks: Option<vk::AllocationCallbacks<'static>>,
    pub(crate) surface: Option<vk::SurfaceKHR>,
    pub(crate) surface_loader: Option<ash::khr::surface::Instance>,
    pub(crate) instance_version: Version,
    pub api_version: Version,
    pub(crate) headless: bool,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub(crate) host: HostInfo,
}

impl Instance {
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    /// Version the loader reported, as opposed to the negotiated
    /// [`api_version`](Self::api_version).
    pub fn loader_version(&self) -> Version {
        self.instance_version
    }

    pub fn destroy(&self) {
        // SAFETY: callers destroy dependent objects (devices, swapchains)
        // first; messenger and surface precede the instance itself.
        unsafe {
            if let Some((loader, messenger)) = &self.debug_utils {
                loader.destroy_debug_utils_messenger(
                    *messenger,
                    self.allocation_callbacks.as_ref(),
                );
            }
            if let (Some(surface), Some(loader)) = (self.surface, &self.surface_loader) {
                loader.destroy_surface(surface, self.allocation_callbacks.as_ref());
            }
            self.instance
                .destroy_instance(self.allocation_callbacks.as_ref());
        }
    }
}

impl AsRef<ash::Instance> for Instance {
    fn as_ref(&self) -> &ash::Instance {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_requirement_targets_1_0() {
        let negotiated = negotiate_api_version(Version::V1_3, Version::V1_0, Version::V1_0);
        assert_eq!(negotiated, Ok(Version::V1_0));
    }

    #[test]
    fn required_version_is_a_hard_floor() {
        assert_eq!(
            negotiate_api_version(Version::V1_3, Version::V1_3, Version::V1_0),
            Ok(Version::V1_3)
        );
        assert_eq!(
            negotiate_api_version(Version::V1_2, Version::V1_3, Version::V1_0),
            Err(InstanceError::VulkanVersionUnavailable(
                Version::V1_3,
                Version::V1_2
            ))
        );
    }

    #[test]
    fn minimum_version_relaxes_the_requirement() {
        // Loader below required but at or above minimum: target the loader.
        assert_eq!(
            negotiate_api_version(Version::V1_2, Version::V1_3, Version::V1_1),
            Ok(Version::V1_2)
        );
        // Loader below even the minimum: fail against the minimum.
        assert_eq!(
            negotiate_api_version(Version::V1_0, Version::V1_3, Version::V1_1),
            Err(InstanceError::VulkanVersionUnavailable(
                Version::V1_1,
                Version::V1_0
            ))
        );
    }

    #[test]
    fn never_targets_above_the_requirement() {
        assert_eq!(
            negotiate_api_version(Version::V1_3, Version::V1_2, Version::V1_0),
            Ok(Version::V1_2)
        );
    }
}
