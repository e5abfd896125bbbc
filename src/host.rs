use std::ffi::CStr;
use std::fmt::{Debug, Formatter};

use ash::vk;

use crate::version::Version;

pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// What the Vulkan loader on this machine offers before any instance exists:
/// layers, instance extensions and the loader's own API version.
pub struct HostInfo {
    pub available_layers: Vec<vk::LayerProperties>,
    pub available_extensions: Vec<vk::ExtensionProperties>,
    pub validation_layers_available: bool,
    pub debug_utils_available: bool,
    pub loader_version: Version,
    pub(crate) entry: ash::Entry,
}

impl Debug for HostInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostInfo")
            .field("available_layers", &self.available_layers)
            .field("available_extensions", &self.available_extensions)
            .field(
                "validation_layers_available",
                &self.validation_layers_available,
            )
            .field("debug_utils_available", &self.debug_utils_available)
            .field("loader_version", &self.loader_version)
            .finish()
    }
}

impl HostInfo {
    #[cfg_attr(feature = "enable_tracing", tracing::instrument)]
    pub fn probe() -> crate::Result<Self> {
        #[cfg(feature = "enable_tracing")]
        tracing::trace!("Loading Vulkan library...");
        // SAFETY: the loaded library outlives the entry, which HostInfo keeps alive.
        let entry = unsafe { ash::Entry::load() }?;
        #[cfg(feature = "enable_tracing")]
        tracing::trace!("Vulkan library loaded.");

        // SAFETY: entry holds a live loader.
        let available_layers = unsafe { entry.enumerate_instance_layer_properties() }?;
        let validation_layers_available = contains_layer(&available_layers, VALIDATION_LAYER_NAME);

        // SAFETY: entry holds a live loader.
        let mut available_extensions =
            unsafe { entry.enumerate_instance_extension_properties(None) }?;

        // Layers can ship their own instance extensions, debug utils in particular
        // often comes from the validation layer rather than the driver.
        for layer in &available_layers {
            let Ok(layer_name) = layer.layer_name_as_c_str() else {
                continue;
            };
            // SAFETY: entry holds a live loader and layer_name came from the loader.
            let layer_extensions =
                unsafe { entry.enumerate_instance_extension_properties(Some(layer_name)) }?;
            available_extensions.extend_from_slice(&layer_extensions);
        }

        let debug_utils_available =
            contains_extension(&available_extensions, ash::ext::debug_utils::NAME);

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(validation_layers_available, debug_utils_available);

        // Loaders predating vkEnumerateInstanceVersion only speak 1.0.
        // SAFETY: entry holds a live loader.
        let loader_version = unsafe { entry.try_enumerate_instance_version() }?
            .map_or(Version::V1_0, Version::from_api_version);

        Ok(Self {
            available_layers,
            available_extensions,
            validation_layers_available,
            debug_utils_available,
            loader_version,
            entry,
        })
    }

    pub fn has_layer(&self, layer: &CStr) -> bool {
        contains_layer(&self.available_layers, layer)
    }

    pub fn has_extension(&self, extension: &CStr) -> bool {
        contains_extension(&self.available_extensions, extension)
    }

    pub fn has_layers<'a, I: IntoIterator<Item = &'a CStr>>(&self, layers: I) -> bool {
        layers.into_iter().all(|layer| self.has_layer(layer))
    }

    pub fn has_extensions<'a, I: IntoIterator<Item = &'a CStr>>(&self, extensions: I) -> bool {
        extensions.into_iter().all(|ext| self.has_extension(ext))
    }
}

fn contains_layer(layers: &[vk::LayerProperties], name: &CStr) -> bool {
    layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str() == Ok(name))
}

fn contains_extension(extensions: &[vk::ExtensionProperties], name: &CStr) -> bool {
    extensions
        .iter()
        .any(|ext| ext.extension_name_as_c_str() == Ok(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_char;

    fn layer(name: &CStr) -> vk::LayerProperties {
        let mut properties = vk::LayerProperties::default();
        for (slot, byte) in properties.layer_name.iter_mut().zip(name.to_bytes()) {
            *slot = *byte as c_char;
        }
        properties
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut properties = vk::ExtensionProperties::default();
        for (slot, byte) in properties.extension_name.iter_mut().zip(name.to_bytes()) {
            *slot = *byte as c_char;
        }
        properties
    }

    #[test]
    fn finds_layer_by_name() {
        let layers = vec![layer(c"VK_LAYER_MESA_overlay"), layer(VALIDATION_LAYER_NAME)];
        assert!(contains_layer(&layers, VALIDATION_LAYER_NAME));
        assert!(!contains_layer(&layers, c"VK_LAYER_LUNARG_api_dump"));
    }

    #[test]
    fn finds_extension_by_name() {
        let extensions = vec![
            extension(ash::khr::surface::NAME),
            extension(ash::ext::debug_utils::NAME),
        ];
        assert!(contains_extension(&extensions, ash::ext::debug_utils::NAME));
        assert!(!contains_extension(&extensions, ash::khr::display::NAME));
    }

    #[test]
    fn empty_host_has_nothing() {
        assert!(!contains_layer(&[], VALIDATION_LAYER_NAME));
        assert!(!contains_extension(&[], ash::khr::surface::NAME));
    }
}
