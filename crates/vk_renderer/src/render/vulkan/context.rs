//! Vulkan instance, device selection and logical device management
//!
//! [`VulkanContext`] owns the instance/surface/device trio and is the root of
//! the backend's resource lifetime tree: every other wrapper borrows its
//! device handle. Debug builds enable the Khronos validation layer and route
//! messenger output through `log`.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

use super::window::Window;
use super::{VulkanError, VulkanResult};

/// Vulkan instance wrapper with optional debug messenger
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance with the extensions the window requires
    pub fn new(window: &Window, app_name: &str) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to load Vulkan: {e:?}"))
        })?;

        let app_name_cstr = CString::new(app_name).map_err(|_| {
            VulkanError::InitializationFailed("application name contains NUL".to_string())
        })?;
        let engine_name_cstr = CString::new("vk_renderer").map_err(|_| {
            VulkanError::InitializationFailed("engine name contains NUL".to_string())
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to get required extensions: {e}"))
        })?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .filter_map(|ext| CString::new(ext.as_str()).ok())
            .collect();

        #[allow(unused_mut)] // debug builds append the debug-utils extension
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        extensions.push(DebugUtils::name().as_ptr());

        let layer_names = if cfg!(debug_assertions) {
            vec![CString::new("VK_LAYER_KHRONOS_validation").map_err(|_| {
                VulkanError::InitializationFailed("invalid layer name".to_string())
            })?]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        };

        log::info!("Vulkan instance created ({} extensions)", extensions.len());

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Validation layer callback routed through the `log` facade
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Queue family indices for rendering, presentation and compute. The three
/// may collapse onto fewer physical families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    pub compute: u32,
}

impl QueueFamilyIndices {
    /// Find the first family satisfying each role: graphics-capable,
    /// compute-capable, and able to present to the surface.
    ///
    /// `present_support` is queried per family index so the search stays
    /// independent of any live surface, which keeps it unit-testable.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut present_support: impl FnMut(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Self> {
        let mut graphics = None;
        let mut present = None;
        let mut compute = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }

            if family.queue_flags.contains(vk::QueueFlags::COMPUTE) && compute.is_none() {
                compute = Some(index);
            }

            if present.is_none() && present_support(index)? {
                present = Some(index);
            }

            if graphics.is_some() && present.is_some() && compute.is_some() {
                break;
            }
        }

        match (graphics, present, compute) {
            (Some(graphics), Some(present), Some(compute)) => Ok(Self {
                graphics,
                present,
                compute,
            }),
            _ => Err(VulkanError::NoSuitableDevice),
        }
    }

    /// Swapchain images need concurrent sharing when the rendering and
    /// presenting families differ
    pub fn are_separate(&self) -> bool {
        self.graphics != self.present
    }
}

/// Check a device extension list for a required extension by name
pub fn supports_extension(extensions: &[vk::ExtensionProperties], required: &CStr) -> bool {
    extensions.iter().any(|available| {
        let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
        name == required
    })
}

/// Pick a memory type index satisfying both the resource's type filter and
/// the requested property flags
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        let type_supported = type_filter & (1 << i) != 0;
        let props_supported = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);
        if type_supported && props_supported {
            return Ok(i);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

/// Return the first candidate format whose properties (as reported by
/// `query`) contain the requested features for the given tiling
pub fn find_supported_format_with(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    query: impl Fn(vk::Format) -> vk::FormatProperties,
) -> VulkanResult<vk::Format> {
    for &format in candidates {
        let props = query(format);
        let supported = match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        };
        if supported {
            return Ok(format);
        }
    }
    Err(VulkanError::NoSupportedFormat)
}

/// Selected physical device plus the properties the renderer consults later
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heap and type layout
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and presentation
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device that satisfies the renderer's
    /// requirements: graphics + present queues, the swapchain extension,
    /// anisotropic filtering, and at least one surface format and present
    /// mode.
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!("Selected GPU: {}", unsafe {
                        CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(VulkanError::Api(result)) => return Err(VulkanError::Api(result)),
                Err(_) => continue,
            }
        }

        Err(VulkanError::NoSuitableDevice)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = QueueFamilyIndices::find(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(VulkanError::Api)
        })?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        if !supports_extension(&extensions, SwapchainLoader::name()) {
            return Err(VulkanError::NoSuitableDevice);
        }

        if features.sampler_anisotropy != vk::TRUE {
            return Err(VulkanError::NoSuitableDevice);
        }

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Err(VulkanError::NoSuitableDevice);
        }

        Ok(Self {
            device,
            properties,
            memory_properties,
            queue_families,
        })
    }

    /// Maximum sampler anisotropy the device supports
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Compute operations queue
    pub compute_queue: vk::Queue,
    /// Queue family indices the device was created with
    pub queue_families: QueueFamilyIndices,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per unique family
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: BTreeSet<u32> = [
            physical.queue_families.graphics,
            physical.queue_families.present,
            physical.queue_families.compute,
        ]
        .into_iter()
        .collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical.queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.queue_families.present, 0) };
        let compute_queue = unsafe { device.get_device_queue(physical.queue_families.compute, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::info!(
            "Logical device created (graphics family {}, present family {}, compute family {})",
            physical.queue_families.graphics,
            physical.queue_families.present,
            physical.queue_families.compute
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            compute_queue,
            queue_families: physical.queue_families,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns the instance, surface and device
///
/// Field order matters: the logical device must drop before the instance,
/// and the surface is destroyed explicitly in `Drop` while the instance is
/// still alive.
pub struct VulkanContext {
    /// Vulkan surface for presentation
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Logical device and queues
    pub device: LogicalDevice,
    /// Instance wrapper (dropped last)
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Build the full context against a window's surface
    pub fn new(window: &mut Window, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name)?;

        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| {
                VulkanError::InitializationFailed(format!("surface creation failed: {e}"))
            })?;
        let surface_loader = Surface::new(&instance.entry, &instance.instance);

        let physical_device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)?;

        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// Raw device handle clone for resource wrappers
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    pub fn compute_queue(&self) -> vk::Queue {
        self.device.compute_queue
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.device.queue_families
    }

    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Find a memory type on the selected device
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        find_memory_type(
            &self.physical_device.memory_properties,
            type_filter,
            properties,
        )
    }

    /// Depth attachment format: the first depth format the device supports
    /// with optimal tiling
    pub fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        find_supported_format_with(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| unsafe {
                self.instance
                    .instance
                    .get_physical_device_format_properties(self.physical_device.device, format)
            },
        )
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        let _ = self.wait_idle();
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
        log::info!("Vulkan context destroyed");
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
    fn queue_search_picks_first_matching_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        // Only family 2 can present
        let indices =
            QueueFamilyIndices::find(&families, |index| Ok(index == 2)).expect("families found");
        assert_eq!(indices.graphics, 1);
        assert_eq!(indices.present, 2);
        assert_eq!(indices.compute, 1);
        assert!(indices.are_separate());
    }

    #[test]
    fn queue_search_allows_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::find(&families, |_| Ok(true)).expect("families found");
        assert_eq!(indices.graphics, indices.present);
        assert_eq!(indices.graphics, indices.compute);
        assert!(!indices.are_separate());
    }

    #[test]
    fn queue_search_fails_without_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let result = QueueFamilyIndices::find(&families, |_| Ok(false));
        assert!(matches!(result, Err(VulkanError::NoSuitableDevice)));
    }

    #[test]
    fn queue_search_fails_without_compute_support() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = QueueFamilyIndices::find(&families, |_| Ok(true));
        assert!(matches!(result, Err(VulkanError::NoSuitableDevice)));
    }

    fn memory_properties(type_flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: type_flags.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in type_flags.iter().enumerate() {
            props.memory_types[i].property_flags = flags;
        }
        props
    }

    #[test]
    fn memory_type_respects_filter_and_properties() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        // Resource only allows types 1 and 3
        let filter = 0b1010;
        let index = find_memory_type(
            &props,
            filter,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .expect("memory type found");
        assert_eq!(index, 3);
    }

    #[test]
    fn memory_type_missing_yields_error() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn format_search_honors_tiling_and_order() {
        let query = |format: vk::Format| {
            let mut props = vk::FormatProperties::default();
            if format == vk::Format::D24_UNORM_S8_UINT {
                props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            // D32 only supported with linear tiling, which should not match
            if format == vk::Format::D32_SFLOAT {
                props.linear_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            props
        };
        let format = find_supported_format_with(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            query,
        )
        .expect("format found");
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn format_search_exhausted_yields_error() {
        let result = find_supported_format_with(
            &[vk::Format::D32_SFLOAT],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties::default(),
        );
        assert!(matches!(result, Err(VulkanError::NoSupportedFormat)));
    }

    #[test]
    fn extension_lookup_matches_by_name() {
        let mut ext = vk::ExtensionProperties::default();
        let name = b"VK_KHR_swapchain\0";
        for (i, &b) in name.iter().enumerate() {
            ext.extension_name[i] = b as std::os::raw::c_char;
        }
        assert!(supports_extension(&[ext], SwapchainLoader::name()));
        assert!(!supports_extension(
            &[],
            SwapchainLoader::name()
        ));
    }
}
