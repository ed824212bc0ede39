//! Vulkan instance, device selection and logical device
//!
//! Brings up everything the backend needs before the first swapchain can
//! be built: the instance (with optional validation), the window surface,
//! a scored physical device and a logical device with graphics and
//! present queues.

use std::collections::HashSet;
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use super::window::Window;
use crate::config::PresentConfig;
use crate::render::frame::{PresentError, PresentResult};

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Score bonus for a discrete GPU
pub const DISCRETE_GPU_BONUS: u32 = 1000;

/// Vulkan instance with optional validation
pub struct VulkanInstance {
    /// Loaded Vulkan entry points
    pub entry: Entry,
    /// The instance
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance with the extensions GLFW needs
    ///
    /// If validation is requested but the layer is not installed, a
    /// warning is logged and the instance is created without it.
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> PresentResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            PresentError::InitializationFailed(format!("Failed to load Vulkan: {e}"))
        })?;

        let app_name_cstr = CString::new(app_name).map_err(|_| {
            PresentError::InitializationFailed("application name contains NUL".to_string())
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| PresentError::InitializationFailed(e.to_string()))?;
        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                PresentError::InitializationFailed("bad extension name from GLFW".to_string())
            })?;
        let mut extensions: Vec<*const std::os::raw::c_char> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!(
                "Validation requested but {} is not installed",
                VALIDATION_LAYER.to_string_lossy()
            );
        }

        let mut layer_names = Vec::new();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
            layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(PresentError::api("vkCreateInstance"))?
        };

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance for \"{app_name}\" (validation {})",
            if validation { "on" } else { "off" }
        );
        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    fn validation_layer_available(entry: &Entry) -> PresentResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(PresentError::api("vkEnumerateInstanceLayerProperties"))?;
        Ok(layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    fn setup_debug_messenger(
        debug_utils: &DebugUtils,
    ) -> PresentResult<vk::DebugUtilsMessengerEXT> {
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
                .map_err(PresentError::api("vkCreateDebugUtilsMessengerEXT"))
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug_utils {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Graphics and present queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for submission
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick families from `(flags, can_present)` per family
    ///
    /// A single family that does both wins over the first graphics family
    /// paired with the first present family.
    pub fn pick(families: &[(vk::QueueFlags, bool)]) -> Option<Self> {
        let index = |i: usize| u32::try_from(i).ok();

        if let Some(shared) = families
            .iter()
            .position(|(flags, present)| flags.contains(vk::QueueFlags::GRAPHICS) && *present)
        {
            let shared = index(shared)?;
            return Some(Self {
                graphics: shared,
                present: shared,
            });
        }

        let graphics = families
            .iter()
            .position(|(flags, _)| flags.contains(vk::QueueFlags::GRAPHICS))?;
        let present = families.iter().position(|(_, present)| *present)?;
        Some(Self {
            graphics: index(graphics)?,
            present: index(present)?,
        })
    }

    /// Whether graphics and present use different families
    pub fn is_split(self) -> bool {
        self.graphics != self.present
    }

    /// Distinct families, for queue creation and concurrent sharing
    pub fn unique(self) -> Vec<u32> {
        if self.is_split() {
            vec![self.graphics, self.present]
        } else {
            vec![self.graphics]
        }
    }
}

/// Rank a device that passed the hard requirements
///
/// Discrete GPUs get a flat bonus; the largest supported 2D image size
/// breaks ties between devices of the same kind.
pub fn device_score(properties: &vk::PhysicalDeviceProperties) -> u32 {
    let discrete = if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        DISCRETE_GPU_BONUS
    } else {
        0
    };
    discrete.saturating_add(properties.limits.max_image_dimension2_d)
}

/// The selected physical device
pub struct PhysicalDeviceInfo {
    /// Device handle
    pub device: vk::PhysicalDevice,
    /// Device properties
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family selection
    pub queue_families: QueueFamilyIndices,
    /// Score it won with
    pub score: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the highest scoring device that can render to `surface`
    ///
    /// Ties keep the first enumerated device.
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> PresentResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(PresentError::api("vkEnumeratePhysicalDevices"))?
        };
        if devices.is_empty() {
            return Err(PresentError::InitializationFailed(
                "No GPUs with Vulkan support".to_string(),
            ));
        }

        let mut best: Option<Self> = None;
        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader)? {
                Some(candidate) => {
                    log::info!("Device {} | score: {}", candidate.name(), candidate.score);
                    if best.as_ref().map_or(true, |best| candidate.score > best.score) {
                        best = Some(candidate);
                    }
                }
                None => {
                    let properties = unsafe { instance.get_physical_device_properties(device) };
                    log::info!("Device {} does not meet requirements", device_name(&properties));
                }
            }
        }

        let selected = best.ok_or_else(|| {
            PresentError::InitializationFailed(
                "All devices failed to meet requirements".to_string(),
            )
        })?;
        log::info!("Selected GPU: {}", selected.name());
        Ok(selected)
    }

    /// Check hard requirements; `None` means the device is unusable
    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> PresentResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        if features.geometry_shader == vk::FALSE {
            return Ok(None);
        }

        let family_properties =
            unsafe { instance.get_physical_device_queue_family_properties(device) };
        let mut families = Vec::with_capacity(family_properties.len());
        for (index, family) in family_properties.iter().enumerate() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfaceSupportKHR"))?
            };
            families.push((family.queue_flags, present_support));
        }
        let Some(queue_families) = QueueFamilyIndices::pick(&families) else {
            return Ok(None);
        };

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(PresentError::api("vkEnumerateDeviceExtensionProperties"))?
        };
        let has_swapchain = extensions.iter().any(|available| {
            (unsafe { CStr::from_ptr(available.extension_name.as_ptr()) }) == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        let (formats, modes) = unsafe {
            (
                surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
                surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
            )
        };
        if formats.is_empty() || modes.is_empty() {
            return Ok(None);
        }

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        Ok(Some(Self {
            device,
            properties,
            memory_properties,
            queue_families,
            score: device_score(&properties),
        }))
    }

    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        device_name(&self.properties)
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Logical device with its queues
pub struct LogicalDevice {
    /// Device handle and function table
    pub device: Device,
    /// Queue for command submission
    pub graphics_queue: vk::Queue,
    /// Queue for presentation
    pub present_queue: vk::Queue,
    /// Swapchain extension functions
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> PresentResult<Self> {
        let families = physical_device.queue_families;
        let unique_families: HashSet<u32> = families.unique().into_iter().collect();
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
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(PresentError::api("vkCreateDevice"))?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
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

/// Everything that lives as long as the window: instance, surface, device
///
/// Fields drop in declaration order, so the device goes before the
/// instance; the surface is destroyed explicitly in [`Drop`].
pub struct VulkanContext {
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    physical_device: PhysicalDeviceInfo,
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Bring up Vulkan for `window`
    pub fn new(window: &mut Window, config: &PresentConfig) -> PresentResult<Self> {
        let instance =
            VulkanInstance::new(window, &config.application_name, config.validation_enabled())?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| PresentError::InitializationFailed(format!("Surface creation: {e}")))?;

        let device =
            PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)
                .and_then(|physical_device| {
                    LogicalDevice::new(&instance.instance, &physical_device)
                        .map(|device| (physical_device, device))
                });
        let (physical_device, device) = match device {
            Ok(pair) => pair,
            Err(err) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(err);
            }
        };

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    /// The instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// The presentation surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension functions
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// The selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// The logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Swapchain extension functions
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Queue for command submission
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Queue for presentation
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Queue family selection
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
