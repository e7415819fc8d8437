//! Vulkan context management
//!
//! The [`Context`] owns every device-level Vulkan object the rest of the framework
//! builds on: instance, debug messenger, surface, physical/logical device, queues,
//! the VMA allocator and a command pool for one-shot transfer work.
//!
//! Exactly one context may be alive at a time. It is registered as the current
//! context on creation and resources created later look it up through [`current`]
//! or receive an `Arc<Context>` explicitly. Every resource keeps its `Arc` so the
//! context always outlives them.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::device::{LogicalDevice, PhysicalDeviceInfo};
use super::{VulkanError, VulkanResult};
use crate::config::RendererConfig;
use crate::window::Window;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &str = "vulkan_framework";

static CURRENT: LiveSlot<Context> = LiveSlot::new();

/// Process-wide slot that holds at most one live value
///
/// The slot only keeps a `Weak`, so the value goes away with its last `Arc`
/// and the slot frees up again.
pub(crate) struct LiveSlot<T> {
    slot: Mutex<Weak<T>>,
}

impl<T> LiveSlot<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slot: Mutex::new(Weak::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Weak<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live value, from any thread
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.lock().upgrade()
    }

    /// Build and register a value unless one is alive
    ///
    /// The lock is held across `build`, so concurrent callers cannot both succeed.
    pub(crate) fn create_with<F>(&self, build: F) -> VulkanResult<Arc<T>>
    where
        F: FnOnce() -> VulkanResult<T>,
    {
        let mut slot = self.lock();
        if slot.upgrade().is_some() {
            return Err(VulkanError::InvalidOperation {
                reason: "a Vulkan context already exists".to_string(),
            });
        }
        let value = Arc::new(build()?);
        *slot = Arc::downgrade(&value);
        Ok(value)
    }
}

/// The live context, if one has been created and not yet dropped
pub fn current() -> Option<Arc<Context>> {
    CURRENT.get()
}

/// Like [`current`] but reports a missing context as an error
pub fn require_current() -> VulkanResult<Arc<Context>> {
    current().ok_or_else(|| VulkanError::InvalidOperation {
        reason: "no Vulkan context is alive".to_string(),
    })
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, optionally with validation layers
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {}", e)))?;

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring(ENGINE_NAME)?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let extension_names = required_extensions
            .iter()
            .map(|name| to_cstring(name))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut extensions: Vec<*const std::os::raw::c_char> =
            extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let validation = config.validation_enabled() && Self::validation_layer_available(&entry);
        if config.validation_enabled() && !validation {
            log::warn!("{} requested but not installed; continuing without it", VALIDATION_LAYER);
        }

        let layer_names = if validation {
            vec![to_cstring(VALIDATION_LAYER)?]
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<*const std::os::raw::c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        log::debug!("Instance extensions: {:?}", required_extensions);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!("Vulkan instance created (validation: {})", validation);

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name.to_bytes() == VALIDATION_LAYER.as_bytes()
                })
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        Ok(messenger)
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Routes validation layer output into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

fn to_cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value)
        .map_err(|_| VulkanError::InitializationFailed(format!("'{}' contains a NUL byte", value)))
}

/// Process-wide Vulkan state shared by every framework object
///
/// Fields are destroyed explicitly in [`Drop`]: transfer pool, allocator, device,
/// surface, then the instance.
pub struct Context {
    allocator: ManuallyDrop<vk_mem::Allocator>,
    transfer_pool: Mutex<vk::CommandPool>,
    physical_device: PhysicalDeviceInfo,
    device: LogicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: SurfaceLoader,
    instance: VulkanInstance,
}

impl Context {
    /// Bring up Vulkan for `window` and register the result as the current context
    ///
    /// Fails if another context is still alive.
    pub fn create(window: &mut Window, config: &RendererConfig) -> VulkanResult<Arc<Self>> {
        let context = CURRENT.create_with(|| Self::bring_up(window, config))?;
        log::info!("Vulkan context ready on {}", context.physical_device.name());
        Ok(context)
    }

    fn bring_up(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;
        let surface_loader = SurfaceLoader::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        // From here on partial failures must release what was already created.
        let physical_device = match PhysicalDeviceInfo::select(&instance.instance, surface, &surface_loader) {
            Ok(info) => info,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let allocator = match Self::create_allocator(&instance.instance, &device.device, physical_device.device) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.device.destroy_device(None);
                    surface_loader.destroy_surface(surface, None);
                }
                return Err(e);
            }
        };

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let transfer_pool = match unsafe { device.device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                drop(allocator);
                unsafe {
                    device.device.destroy_device(None);
                    surface_loader.destroy_surface(surface, None);
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            allocator: ManuallyDrop::new(allocator),
            transfer_pool: Mutex::new(transfer_pool),
            physical_device,
            device,
            surface,
            surface_loader,
            instance,
        })
    }

    fn create_allocator(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<vk_mem::Allocator> {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, device, physical_device);
        #[allow(unused_unsafe)]
        let allocator = unsafe { vk_mem::Allocator::new(create_info) }.map_err(VulkanError::Allocation)?;
        log::debug!("VMA allocator created");
        Ok(allocator)
    }

    /// Record and submit a one-time command buffer on the graphics queue, then wait for it
    pub fn submit_one_shot<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let device = &self.device.device;
        let pool = self
            .transfer_pool
            .lock()
            .map_err(|_| VulkanError::InvalidOperation {
                reason: "transfer command pool lock poisoned".to_string(),
            })?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info)? }[0];

        let result = (|| -> VulkanResult<()> {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe { device.begin_command_buffer(command_buffer, &begin_info)? };
            record(device, command_buffer);
            unsafe { device.end_command_buffer(command_buffer)? };

            let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None)? };
            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
            let submitted = unsafe {
                device
                    .queue_submit(self.device.graphics_queue, &[submit_info], fence)
                    .and_then(|_| device.wait_for_fences(&[fence], true, u64::MAX))
            };
            unsafe { device.destroy_fence(fence, None) };
            submitted.map_err(VulkanError::Api)
        })();

        unsafe { device.free_command_buffers(*pool, &[command_buffer]) };
        result
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Presentation queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Graphics queue family index
    pub fn graphics_family(&self) -> u32 {
        self.device.graphics_family
    }

    /// Present queue family index
    pub fn present_family(&self) -> u32 {
        self.device.present_family
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &SurfaceLoader {
        &self.surface_loader
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// VMA allocator
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan context");
        unsafe {
            let _ = self.device.device.device_wait_idle();

            if let Ok(pool) = self.transfer_pool.get_mut() {
                self.device.device.destroy_command_pool(*pool, None);
            }

            ManuallyDrop::drop(&mut self.allocator);
            self.device.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // `instance` drops after this body and tears down the messenger and instance.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_slot_is_shared_across_threads() {
        static SLOT: LiveSlot<String> = LiveSlot::new();

        let first = thread::spawn(|| SLOT.create_with(|| Ok("first".to_string())))
            .join()
            .unwrap()
            .unwrap();

        let (seen, second) = thread::spawn(|| (SLOT.get(), SLOT.create_with(|| Ok("second".to_string()))))
            .join()
            .unwrap();
        assert_eq!(seen.as_deref().map(String::as_str), Some("first"));
        assert!(matches!(second, Err(VulkanError::InvalidOperation { .. })));

        drop(seen);
        drop(first);
        assert!(SLOT.get().is_none());
        let third = SLOT.create_with(|| Ok("third".to_string())).unwrap();
        assert_eq!(third.as_str(), "third");
    }

    #[test]
    fn test_failed_build_leaves_slot_free() {
        static SLOT: LiveSlot<u32> = LiveSlot::new();

        let failed = SLOT.create_with(|| Err(VulkanError::InitializationFailed("no device".to_string())));
        assert!(failed.is_err());
        assert!(SLOT.get().is_none());
        assert!(SLOT.create_with(|| Ok(7)).is_ok());
    }
}
