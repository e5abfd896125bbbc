use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString, c_char};
use std::sync::Arc;

use ash::vk;

use crate::version::Version;
use crate::{Instance, PhysicalDeviceError, QueueError, Result};

#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum PreferredDeviceType {
    Other = 0,
    Integrated = 1,
    #[default]
    Discrete = 2,
    VirtualGpu = 3,
    Cpu = 4,
}

impl PreferredDeviceType {
    fn matches(self, device_type: vk::PhysicalDeviceType) -> bool {
        match self {
            Self::Other => device_type == vk::PhysicalDeviceType::OTHER,
            Self::Integrated => device_type == vk::PhysicalDeviceType::INTEGRATED_GPU,
            Self::Discrete => device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            Self::VirtualGpu => device_type == vk::PhysicalDeviceType::VIRTUAL_GPU,
            Self::Cpu => device_type == vk::PhysicalDeviceType::CPU,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum Suitable {
    #[default]
    Yes,
    Partial,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Present,
    Graphics,
    Compute,
    Transfer,
}

/// Every queue family the resolver could pin down for a device. A `None`
/// means the device simply has no family fitting that role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
}

fn family_matching(
    families: &[vk::QueueFamilyProperties],
    required: vk::QueueFlags,
    forbidden: vk::QueueFlags,
) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_flags.contains(required) && !family.queue_flags.intersects(forbidden)
        })
        .map(|index| index as u32)
}

/// Picks one family per role. Compute and transfer prefer families that do
/// not overlap graphics; both fall back to shared families, transfer
/// ultimately to graphics since graphics queues can always transfer.
fn resolve_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> QueueFamilies {
    let graphics = family_matching(families, vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty());
    let present = present_support
        .iter()
        .position(|supported| *supported)
        .map(|index| index as u32);
    let compute = family_matching(families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS)
        .or_else(|| family_matching(families, vk::QueueFlags::COMPUTE, vk::QueueFlags::empty()));
    let transfer = family_matching(
        families,
        vk::QueueFlags::TRANSFER,
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
    )
    .or_else(|| family_matching(families, vk::QueueFlags::TRANSFER, vk::QueueFlags::empty()))
    .or(graphics);

    QueueFamilies {
        graphics,
        present,
        compute,
        transfer,
    }
}

fn device_local_bytes(memory: &vk::PhysicalDeviceMemoryProperties) -> vk::DeviceSize {
    memory.memory_heaps[..memory.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

macro_rules! feature_set {
    ($satisfied:ident, $any:ident, $ty:ty, { $($field:ident),+ $(,)? }) => {
        fn $satisfied(requested: &$ty, supported: &$ty) -> bool {
            $((requested.$field == vk::FALSE || supported.$field == vk::TRUE) &&)+ true
        }

        fn $any(requested: &$ty) -> bool {
            $(requested.$field == vk::TRUE ||)+ false
        }
    };
}

feature_set!(
    base_features_satisfied,
    any_base_feature_requested,
    vk::PhysicalDeviceFeatures,
    {
        robust_buffer_access,
        full_draw_index_uint32,
        image_cube_array,
        independent_blend,
        geometry_shader,
        tessellation_shader,
        sample_rate_shading,
        dual_src_blend,
        logic_op,
        multi_draw_indirect,
        draw_indirect_first_instance,
        depth_clamp,
        depth_bias_clamp,
        fill_mode_non_solid,
        depth_bounds,
        wide_lines,
        large_points,
        alpha_to_one,
        multi_viewport,
        sampler_anisotropy,
        texture_compression_etc2,
        texture_compression_astc_ldr,
        texture_compression_bc,
        occlusion_query_precise,
        pipeline_statistics_query,
        vertex_pipeline_stores_and_atomics,
        fragment_stores_and_atomics,
        shader_tessellation_and_geometry_point_size,
        shader_image_gather_extended,
        shader_storage_image_extended_formats,
        shader_storage_image_multisample,
        shader_storage_image_read_without_format,
        shader_storage_image_write_without_format,
        shader_uniform_buffer_array_dynamic_indexing,
        shader_sampled_image_array_dynamic_indexing,
        shader_storage_buffer_array_dynamic_indexing,
        shader_storage_image_array_dynamic_indexing,
        shader_clip_distance,
        shader_cull_distance,
        shader_float64,
        shader_int64,
        shader_int16,
        shader_resource_residency,
        shader_resource_min_lod,
        sparse_binding,
        sparse_residency_buffer,
        sparse_residency_image2_d,
        sparse_residency_image3_d,
        sparse_residency2_samples,
        sparse_residency4_samples,
        sparse_residency8_samples,
        sparse_residency16_samples,
        sparse_residency_aliased,
        variable_multisample_rate,
        inherited_queries,
    }
);

feature_set!(
    features_1_2_satisfied,
    any_feature_1_2_requested,
    vk::PhysicalDeviceVulkan12Features<'_>,
    {
        sampler_mirror_clamp_to_edge,
        draw_indirect_count,
        storage_buffer8_bit_access,
        uniform_and_storage_buffer8_bit_access,
        storage_push_constant8,
        shader_buffer_int64_atomics,
        shader_shared_int64_atomics,
        shader_float16,
        shader_int8,
        descriptor_indexing,
        shader_input_attachment_array_dynamic_indexing,
        shader_uniform_texel_buffer_array_dynamic_indexing,
        shader_storage_texel_buffer_array_dynamic_indexing,
        shader_uniform_buffer_array_non_uniform_indexing,
        shader_sampled_image_array_non_uniform_indexing,
        shader_storage_buffer_array_non_uniform_indexing,
        shader_storage_image_array_non_uniform_indexing,
        shader_input_attachment_array_non_uniform_indexing,
        shader_uniform_texel_buffer_array_non_uniform_indexing,
        shader_storage_texel_buffer_array_non_uniform_indexing,
        descriptor_binding_uniform_buffer_update_after_bind,
        descriptor_binding_sampled_image_update_after_bind,
        descriptor_binding_storage_image_update_after_bind,
        descriptor_binding_storage_buffer_update_after_bind,
        descriptor_binding_uniform_texel_buffer_update_after_bind,
        descriptor_binding_storage_texel_buffer_update_after_bind,
        descriptor_binding_update_unused_while_pending,
        descriptor_binding_partially_bound,
        descriptor_binding_variable_descriptor_count,
        runtime_descriptor_array,
        sampler_filter_minmax,
        scalar_block_layout,
        imageless_framebuffer,
        uniform_buffer_standard_layout,
        shader_subgroup_extended_types,
        separate_depth_stencil_layouts,
        host_query_reset,
        timeline_semaphore,
        buffer_device_address,
        buffer_device_address_capture_replay,
        buffer_device_address_multi_device,
        vulkan_memory_model,
        vulkan_memory_model_device_scope,
        vulkan_memory_model_availability_visibility_chains,
        shader_output_viewport_index,
        shader_output_layer,
        subgroup_broadcast_dynamic_id,
    }
);

feature_set!(
    features_1_3_satisfied,
    any_feature_1_3_requested,
    vk::PhysicalDeviceVulkan13Features<'_>,
    {
        robust_image_access,
        inline_uniform_block,
        descriptor_binding_inline_uniform_block_update_after_bind,
        pipeline_creation_cache_control,
        private_data,
        shader_demote_to_helper_invocation,
        shader_terminate_invocation,
        subgroup_size_control,
        compute_full_subgroups,
        synchronization2,
        texture_compression_astc_hdr,
        shader_zero_initialize_workgroup_memory,
        dynamic_rendering,
        shader_integer_dot_product,
        maintenance4,
    }
);

#[derive(Default, Debug)]
pub struct PhysicalDevice {
    name: String,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) surface: Option<vk::SurfaceKHR>,

    // Features the device will be created with, not everything it supports.
    pub(crate) features: vk::PhysicalDeviceFeatures,
    pub(crate) features_1_2: vk::PhysicalDeviceVulkan12Features<'static>,
    pub(crate) features_1_3: vk::PhysicalDeviceVulkan13Features<'static>,

    pub(crate) properties: vk::PhysicalDeviceProperties,
    pub(crate) memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub(crate) queue_families: Vec<vk::QueueFamilyProperties>,
    pub(crate) present_support: Vec<bool>,
    pub(crate) extensions_to_enable: Vec<CString>,
    available_extensions: Vec<CString>,
    suitable: Suitable,
}

impl PhysicalDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    pub fn api_version(&self) -> Version {
        Version::from_api_version(self.properties.api_version)
    }

    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn has_extension(&self, extension: &CStr) -> bool {
        self.available_extensions
            .iter()
            .any(|available| available.as_c_str() == extension)
    }

    /// Adds the extension to the set the logical device is created with.
    /// Returns whether the device actually offers it.
    pub fn enable_extension_if_present(&mut self, extension: &CStr) -> bool {
        if !self.has_extension(extension) {
            return false;
        }
        if !self
            .extensions_to_enable
            .iter()
            .any(|enabled| enabled.as_c_str() == extension)
        {
            self.extensions_to_enable.push(extension.to_owned());
        }
        true
    }

    pub fn enable_extensions_if_present<'e, I: IntoIterator<Item = &'e CStr>>(
        &mut self,
        extensions: I,
    ) -> bool {
        extensions
            .into_iter()
            .all(|extension| self.enable_extension_if_present(extension))
    }
}

struct InstanceInfo<'a> {
    instance: &'a ash::Instance,
    surface_loader: Option<&'a ash::khr::surface::Instance>,
    surface: Option<vk::SurfaceKHR>,
    version: Version,
}

#[derive(Debug)]
struct SelectionCriteria<'a> {
    name: Cow<'a, str>,
    preferred_device_type: PreferredDeviceType,
    allow_any_type: bool,
    require_present: bool,
    require_dedicated_transfer_queue: bool,
    require_dedicated_compute_queue: bool,
    require_separate_transfer_queue: bool,
    require_separate_compute_queue: bool,
    required_mem_size: vk::DeviceSize,
    required_extensions: Vec<CString>,
    required_version: Version,
    required_features: vk::PhysicalDeviceFeatures,
    required_features_1_2: vk::PhysicalDeviceVulkan12Features<'static>,
    required_features_1_3: vk::PhysicalDeviceVulkan13Features<'static>,
    use_first_gpu_unconditionally: bool,
}

impl Default for SelectionCriteria<'_> {
    fn default() -> Self {
        Self {
            name: Cow::default(),
            preferred_device_type: PreferredDeviceType::Discrete,
            allow_any_type: true,
            require_present: true,
            require_dedicated_transfer_queue: false,
            require_dedicated_compute_queue: false,
            require_separate_transfer_queue: false,
            require_separate_compute_queue: false,
            required_mem_size: 0,
            required_extensions: vec![],
            required_version: Version::V1_0,
            required_features: vk::PhysicalDeviceFeatures::default(),
            required_features_1_2: vk::PhysicalDeviceVulkan12Features::default(),
            required_features_1_3: vk::PhysicalDeviceVulkan13Features::default(),
            use_first_gpu_unconditionally: false,
        }
    }
}

pub struct PhysicalDeviceSelector<'a> {
    instance_info: InstanceInfo<'a>,
    selection_criteria: SelectionCriteria<'a>,
}

impl<'a> PhysicalDeviceSelector<'a> {
    pub fn new(instance: &'a Instance) -> PhysicalDeviceSelector<'a> {
        Self {
            instance_info: InstanceInfo {
                instance: instance.as_ref(),
                surface_loader: instance.surface_loader.as_ref(),
                surface: instance.surface,
                version: instance.api_version,
            },
            selection_criteria: SelectionCriteria {
                require_present: !instance.headless,
                required_version: instance.api_version,
                ..Default::default()
            },
        }
    }

    pub fn surface(mut self, surface: vk::SurfaceKHR) -> Self {
        self.instance_info.surface = Some(surface);
        self
    }

    pub fn name(mut self, name: impl Into<Cow<'a, str>>) -> Self {
        self.selection_criteria.name = name.into();
        self
    }

    pub fn preferred_device_type(mut self, device_type: PreferredDeviceType) -> Self {
        self.selection_criteria.preferred_device_type = device_type;
        self
    }

    /// When the preferred type is missing, fall back to whatever is present
    /// instead of failing. Defaults to true.
    pub fn allow_any_gpu_device_type(mut self, allow: bool) -> Self {
        self.selection_criteria.allow_any_type = allow;
        self
    }

    pub fn require_present(mut self, require: bool) -> Self {
        self.selection_criteria.require_present = require;
        self
    }

    pub fn require_dedicated_transfer_queue(mut self, require: bool) -> Self {
        self.selection_criteria.require_dedicated_transfer_queue = require;
        self
    }

    pub fn require_dedicated_compute_queue(mut self, require: bool) -> Self {
        self.selection_criteria.require_dedicated_compute_queue = require;
        self
    }

    pub fn require_separate_transfer_queue(mut self, require: bool) -> Self {
        self.selection_criteria.require_separate_transfer_queue = require;
        self
    }

    pub fn require_separate_compute_queue(mut self, require: bool) -> Self {
        self.selection_criteria.require_separate_compute_queue = require;
        self
    }

    pub fn required_device_memory_size(mut self, required: vk::DeviceSize) -> Self {
        self.selection_criteria.required_mem_size = required;
        self
    }

    pub fn add_required_extension(mut self, extension: &CStr) -> Self {
        self.selection_criteria
            .required_extensions
            .push(extension.to_owned());
        self
    }

    pub fn minimum_version(mut self, version: Version) -> Self {
        self.selection_criteria.required_version = version;
        self
    }

    pub fn required_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.selection_criteria.required_features = features;
        self
    }

    pub fn required_features_1_2(
        mut self,
        features: vk::PhysicalDeviceVulkan12Features<'static>,
    ) -> Self {
        self.selection_criteria.required_features_1_2 = features;
        self
    }

    pub fn required_features_1_3(
        mut self,
        features: vk::PhysicalDeviceVulkan13Features<'static>,
    ) -> Self {
        self.selection_criteria.required_features_1_3 = features;
        self
    }

    pub fn select_first_device_unconditionally(mut self, select_first: bool) -> Self {
        self.selection_criteria.use_first_gpu_unconditionally = select_first;
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn select(mut self) -> Result<PhysicalDevice> {
        if self.selection_criteria.require_present {
            if self.instance_info.surface.is_none() {
                return Err(PhysicalDeviceError::NoSurfaceProvided.into());
            }
            // Presenting needs VK_KHR_swapchain whether or not the caller
            // listed it.
            let swapchain_extension = ash::khr::swapchain::NAME;
            if !self
                .selection_criteria
                .required_extensions
                .iter()
                .any(|ext| ext.as_c_str() == swapchain_extension)
            {
                self.selection_criteria
                    .required_extensions
                    .push(swapchain_extension.to_owned());
            }
        }

        // SAFETY: the instance is live for the duration of the selector.
        let physical_devices = unsafe { self.instance_info.instance.enumerate_physical_devices() }
            .map_err(PhysicalDeviceError::FailedToEnumeratePhysicalDevices)?;
        if physical_devices.is_empty() {
            return Err(PhysicalDeviceError::NoPhysicalDevicesFound.into());
        }

        let mut best: Option<PhysicalDevice> = None;
        for handle in physical_devices {
            let mut candidate = self.inspect_device(handle)?;
            if self.selection_criteria.use_first_gpu_unconditionally {
                #[cfg(feature = "enable_tracing")]
                tracing::info!(name = %candidate.name, "Selecting first device unconditionally");
                candidate.suitable = Suitable::Yes;
                return Ok(candidate);
            }

            candidate.suitable = self.suitability(&candidate);
            #[cfg(feature = "enable_tracing")]
            tracing::trace!(name = %candidate.name, suitable = ?candidate.suitable);

            let better = match &best {
                None => true,
                Some(current) => {
                    candidate.suitable < current.suitable
                        || (candidate.suitable == current.suitable
                            && device_local_bytes(&candidate.memory_properties)
                                > device_local_bytes(&current.memory_properties))
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        match best {
            Some(device) if device.suitable != Suitable::No => {
                #[cfg(feature = "enable_tracing")]
                tracing::info!(name = %device.name, "Selected physical device");
                Ok(device)
            }
            _ => Err(PhysicalDeviceError::NoSuitableDevice.into()),
        }
    }

    fn inspect_device(&self, handle: vk::PhysicalDevice) -> Result<PhysicalDevice> {
        let instance = self.instance_info.instance;

        // SAFETY: handle came from enumerate_physical_devices on this instance.
        let properties = unsafe { instance.get_physical_device_properties(handle) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(handle) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(handle) };

        let name = properties
            .device_name_as_c_str()
            .map_or_else(|_| String::from("unknown"), |n| n.to_string_lossy().into_owned());

        let mut present_support = Vec::with_capacity(queue_families.len());
        if let (Some(loader), Some(surface)) =
            (self.instance_info.surface_loader, self.instance_info.surface)
        {
            for family_index in 0..queue_families.len() as u32 {
                // SAFETY: family_index is in range for this device.
                let supported = unsafe {
                    loader.get_physical_device_surface_support(handle, family_index, surface)
                }?;
                present_support.push(supported);
            }
        } else {
            present_support.resize(queue_families.len(), false);
        }

        // SAFETY: handle is a valid physical device.
        let extension_properties =
            unsafe { instance.enumerate_device_extension_properties(handle) }?;
        let available_extensions: Vec<CString> = extension_properties
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok().map(CStr::to_owned))
            .collect();

        let mut extensions_to_enable = self.selection_criteria.required_extensions.clone();
        // VK_KHR_portability_subset must be enabled whenever the device
        // advertises it.
        let portability_subset = ash::khr::portability_subset::NAME;
        if available_extensions
            .iter()
            .any(|ext| ext.as_c_str() == portability_subset)
            && !extensions_to_enable
                .iter()
                .any(|ext| ext.as_c_str() == portability_subset)
        {
            extensions_to_enable.push(portability_subset.to_owned());
        }

        Ok(PhysicalDevice {
            name,
            physical_device: handle,
            surface: self.instance_info.surface,
            features: self.selection_criteria.required_features,
            features_1_2: self.selection_criteria.required_features_1_2,
            features_1_3: self.selection_criteria.required_features_1_3,
            properties,
            memory_properties,
            queue_families,
            present_support,
            extensions_to_enable,
            available_extensions,
            suitable: Suitable::Yes,
        })
    }

    fn supported_features(
        &self,
        handle: vk::PhysicalDevice,
        device_version: Version,
    ) -> (
        vk::PhysicalDeviceFeatures,
        vk::PhysicalDeviceVulkan12Features<'static>,
        vk::PhysicalDeviceVulkan13Features<'static>,
    ) {
        let instance = self.instance_info.instance;
        let mut supported_1_2 = vk::PhysicalDeviceVulkan12Features::default();
        let mut supported_1_3 = vk::PhysicalDeviceVulkan13Features::default();

        // vkGetPhysicalDeviceFeatures2 needs both sides at 1.1, and each
        // Vulkan1xFeatures block needs the device at that version.
        let base = if self.instance_info.version >= Version::V1_1 && device_version >= Version::V1_1
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default();
            if device_version >= Version::V1_2 {
                features2 = features2.push_next(&mut supported_1_2);
            }
            if device_version >= Version::V1_3 {
                features2 = features2.push_next(&mut supported_1_3);
            }
            // SAFETY: the chain only references the locals above.
            unsafe { instance.get_physical_device_features2(handle, &mut features2) };
            features2.features
        } else {
            // SAFETY: handle is a valid physical device.
            unsafe { instance.get_physical_device_features(handle) }
        };

        (base, supported_1_2, supported_1_3)
    }

    fn suitability(&self, device: &PhysicalDevice) -> Suitable {
        let criteria = &self.selection_criteria;

        if !criteria.name.is_empty() && criteria.name != device.name {
            return Suitable::No;
        }

        let device_version = device.api_version();
        if device_version < criteria.required_version {
            return Suitable::No;
        }

        let families = &device.queue_families;
        if criteria.require_dedicated_compute_queue
            && family_matching(
                families,
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            )
            .is_none()
        {
            return Suitable::No;
        }
        if criteria.require_dedicated_transfer_queue
            && family_matching(
                families,
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            )
            .is_none()
        {
            return Suitable::No;
        }
        if criteria.require_separate_compute_queue
            && family_matching(families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS)
                .is_none()
        {
            return Suitable::No;
        }
        if criteria.require_separate_transfer_queue
            && family_matching(families, vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS)
                .is_none()
        {
            return Suitable::No;
        }

        if criteria.require_present && !device.present_support.iter().any(|supported| *supported) {
            return Suitable::No;
        }

        let missing_extension = criteria.required_extensions.iter().any(|required| {
            !device
                .available_extensions
                .iter()
                .any(|available| available == required)
        });
        if missing_extension {
            return Suitable::No;
        }

        if device_local_bytes(&device.memory_properties) < criteria.required_mem_size {
            return Suitable::No;
        }

        let (supported, supported_1_2, supported_1_3) =
            self.supported_features(device.physical_device, device_version);
        if any_base_feature_requested(&criteria.required_features)
            && !base_features_satisfied(&criteria.required_features, &supported)
        {
            return Suitable::No;
        }
        if any_feature_1_2_requested(&criteria.required_features_1_2)
            && !features_1_2_satisfied(&criteria.required_features_1_2, &supported_1_2)
        {
            return Suitable::No;
        }
        if any_feature_1_3_requested(&criteria.required_features_1_3)
            && !features_1_3_satisfied(&criteria.required_features_1_3, &supported_1_3)
        {
            return Suitable::No;
        }

        if !criteria.preferred_device_type.matches(device.device_type()) {
            if criteria.allow_any_type {
                return Suitable::Partial;
            }
            return Suitable::No;
        }

        Suitable::Yes
    }
}

pub struct DeviceBuilder {
    physical_device: PhysicalDevice,
    instance: Arc<Instance>,
}

impl DeviceBuilder {
    pub fn new(physical_device: PhysicalDevice, instance: Arc<Instance>) -> Self {
        Self {
            physical_device,
            instance,
        }
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(self) -> Result<Arc<Device>> {
        let physical_device = self.physical_device;
        let families = resolve_queue_families(
            &physical_device.queue_families,
            &physical_device.present_support,
        );

        let unique_families: BTreeSet<u32> = [
            families.graphics,
            families.present,
            families.compute,
            families.transfer,
        ]
        .into_iter()
        .flatten()
        .collect();

        let priority = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priority)
            })
            .collect();

        let extension_ptrs: Vec<*const c_char> = physical_device
            .extensions_to_enable
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let device_version = physical_device.api_version();
        let mut features_1_2 = physical_device.features_1_2;
        let mut features_1_3 = physical_device.features_1_3;
        let mut features2 =
            vk::PhysicalDeviceFeatures2::default().features(physical_device.features);
        if device_version >= Version::V1_2 {
            features2 = features2.push_next(&mut features_1_2);
        }
        if device_version >= Version::V1_3 {
            features2 = features2.push_next(&mut features_1_3);
        }

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .push_next(&mut features2);

        // SAFETY: the create info only references locals that outlive the call.
        let device = unsafe {
            self.instance.instance.create_device(
                physical_device.physical_device,
                &device_create_info,
                self.instance.allocation_callbacks.as_ref(),
            )
        }?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!(
            name = %physical_device.name,
            ?families,
            "Created logical device"
        );

        Ok(Arc::new(Device {
            device,
            physical_device,
            families,
            allocation_callbacks: self.instance.allocation_callbacks,
        }))
    }
}

pub struct Device {
    pub(crate) device: ash::Device,
    pub(crate) physical_device: PhysicalDevice,
    families: QueueFamilies,
    pub(crate) allocation_callbacks: Option<vk::AllocationCallbacks<'static>>,
}

impl Device {
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    pub fn get_queue_index(&self, queue_type: QueueType) -> Result<u32> {
        let (family, error) = match queue_type {
            QueueType::Present => (self.families.present, QueueError::PresentUnavailable),
            QueueType::Graphics => (self.families.graphics, QueueError::GraphicsUnavailable),
            QueueType::Compute => (self.families.compute, QueueError::ComputeUnavailable),
            QueueType::Transfer => (self.families.transfer, QueueError::TransferUnavailable),
        };
        family.ok_or_else(|| error.into())
    }

    pub fn get_queue(&self, queue_type: QueueType) -> Result<(u32, vk::Queue)> {
        let family = self.get_queue_index(queue_type)?;
        // SAFETY: the family was created with one queue at index 0.
        let queue = unsafe { self.device.get_device_queue(family, 0) };
        Ok((family, queue))
    }

    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: the device is live.
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    pub fn destroy(&self) {
        // SAFETY: callers destroy device-owned objects first.
        unsafe {
            self.device
                .destroy_device(self.allocation_callbacks.as_ref());
        }
    }
}

impl AsRef<ash::Device> for Device {
    fn as_ref(&self) -> &ash::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn discrete_gpu_families_resolve_to_specialized_queues() {
        // Graphics + async compute + dedicated transfer, as on most desktop GPUs.
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let resolved = resolve_queue_families(&families, &[true, false, false]);
        assert_eq!(
            resolved,
            QueueFamilies {
                graphics: Some(0),
                present: Some(0),
                compute: Some(1),
                transfer: Some(2),
            }
        );
    }

    #[test]
    fn single_family_devices_share_one_queue() {
        let families =
            [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let resolved = resolve_queue_families(&families, &[true]);
        assert_eq!(resolved.graphics, Some(0));
        assert_eq!(resolved.compute, Some(0));
        assert_eq!(resolved.transfer, Some(0));
    }

    #[test]
    fn transfer_falls_back_to_graphics_without_a_transfer_flag() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let resolved = resolve_queue_families(&families, &[false]);
        assert_eq!(resolved.transfer, Some(0));
        assert_eq!(resolved.present, None);
    }

    #[test]
    fn compute_only_device_has_no_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let resolved = resolve_queue_families(&families, &[false]);
        assert_eq!(resolved.graphics, None);
        assert_eq!(resolved.compute, Some(0));
    }

    #[test]
    fn dedicated_compute_requires_no_graphics_or_transfer() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(
            family_matching(
                &families,
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            ),
            None
        );
        assert_eq!(
            family_matching(&families, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS),
            Some(1)
        );
    }

    #[test]
    fn requested_features_must_be_supported() {
        let requested = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
        let unsupported = vk::PhysicalDeviceVulkan13Features::default();
        let supported = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);

        assert!(any_feature_1_3_requested(&requested));
        assert!(!features_1_3_satisfied(&requested, &unsupported));
        assert!(features_1_3_satisfied(&requested, &supported));
        assert!(!any_feature_1_3_requested(
            &vk::PhysicalDeviceVulkan13Features::default()
        ));
    }

    #[test]
    fn extra_supported_features_do_not_matter() {
        let requested = vk::PhysicalDeviceFeatures::default();
        let supported = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            ..Default::default()
        };
        assert!(!any_base_feature_requested(&requested));
        assert!(base_features_satisfied(&requested, &supported));
    }

    #[test]
    fn device_local_bytes_ignores_host_heaps() {
        let mut memory = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 2,
            ..Default::default()
        };
        memory.memory_heaps[0] = vk::MemoryHeap {
            size: 8 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory.memory_heaps[1] = vk::MemoryHeap {
            size: 16 << 30,
            flags: vk::MemoryHeapFlags::empty(),
        };
        assert_eq!(device_local_bytes(&memory), 8 << 30);
    }
}
