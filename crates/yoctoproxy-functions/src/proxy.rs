/*!
 * Proxy base.
 *
 * A proxy exists independently of its hardware: it is created by name,
 * possibly before any matching device is reachable, and binds to the
 * hardware function when one shows up. While bound it forwards calls to the
 * library; in every state it answers cached property reads without a device
 * round trip.
 *
 * Enumerations are exposed with a leading `Invalid` variant. The library
 * encodes "no value" as `-1` and valid values from `0`; proxies shift
 * everything by one so that `0` always means invalid.
 */
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use yoctoproxy_core::{error::Error as CoreError, event::SharedEventBus, types::Value};

use crate::hardware::{
    invalid, is_valid_logical_name, FunctionClass, FunctionHandle, HardwareError,
    HardwareFunction, HwResult,
};
use crate::manager::ProxyManager;

/// Error type for proxy operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The proxy has no hardware reference
    #[error("No {class} connected")]
    NotConnected {
        /// Class of the proxy
        class: FunctionClass,
    },

    /// A function of another class was offered to the proxy
    #[error("Cannot link a {actual} function to a {expected} proxy")]
    ClassMismatch {
        /// Class of the proxy
        expected: FunctionClass,
        /// Class of the offered function
        actual: FunctionClass,
    },

    /// The library rejected the call
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Conversions of library sentinels to proxy conventions
pub mod sentinel {
    use super::invalid;

    /// Library invalid double becomes NaN
    pub fn double(raw: f64) -> f64 {
        if raw == invalid::DOUBLE {
            f64::NAN
        } else {
            raw
        }
    }
}

/// Values that can live in a proxy cache
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Whether both values are the same for change detection
    fn same(&self, other: &Self) -> bool;

    /// Whether the value is the "no value" marker of its type
    fn is_invalid(&self) -> bool;

    /// Value carried by change events
    fn to_value(&self) -> Value;
}

impl CacheValue for f64 {
    fn same(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }

    fn is_invalid(&self) -> bool {
        self.is_nan()
    }

    fn to_value(&self) -> Value {
        if self.is_nan() {
            Value::Null
        } else {
            Value::Float(*self)
        }
    }
}

impl CacheValue for i32 {
    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_invalid(&self) -> bool {
        *self == invalid::INT
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl CacheValue for i64 {
    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_invalid(&self) -> bool {
        *self == invalid::LONG
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl CacheValue for String {
    fn same(&self, other: &Self) -> bool {
        self == other
    }

    fn is_invalid(&self) -> bool {
        self == invalid::STRING
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

/// Declare a proxy enumeration
///
/// Each variant is listed with its library code and library name. A leading
/// `Invalid` variant is added; proxy codes are library codes plus one.
macro_rules! proxy_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $lib:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        $vis enum $name {
            /// No valid value
            #[default]
            Invalid,
            $( #[doc = concat!("`", $label, "`")] $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, `Invalid` first
            pub const VARIANTS: &'static [$name] = &[$name::Invalid, $($name::$variant),+];

            /// Decode a library value; unknown codes are invalid
            pub fn from_library(raw: i32) -> Self {
                match raw {
                    $( $lib => $name::$variant, )+
                    _ => $name::Invalid,
                }
            }

            /// Library encoding, `-1` for `Invalid`
            pub fn to_library(self) -> i32 {
                match self {
                    $name::Invalid => $crate::hardware::invalid::ENUM,
                    $( $name::$variant => $lib, )+
                }
            }

            /// Proxy encoding: `0` for `Invalid`, library value plus one otherwise
            pub fn code(self) -> i32 {
                self.to_library() + 1
            }

            /// Decode a proxy code
            pub fn from_code(code: i32) -> Self {
                code.checked_sub(1).map_or($name::Invalid, Self::from_library)
            }

            /// Library name of the value
            pub fn name(self) -> &'static str {
                match self {
                    $name::Invalid => "INVALID",
                    $( $name::$variant => $label, )+
                }
            }

            /// Decode a library name; unknown names are invalid
            pub fn from_name(name: &str) -> Self {
                Self::VARIANTS
                    .iter()
                    .copied()
                    .find(|v| v.name() == name)
                    .unwrap_or_default()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl From<$name> for ::yoctoproxy_core::types::Value {
            fn from(value: $name) -> Self {
                ::yoctoproxy_core::types::Value::Integer(i64::from(value.code()))
            }
        }

        impl $crate::proxy::CacheValue for $name {
            fn same(&self, other: &Self) -> bool {
                self == other
            }

            fn is_invalid(&self) -> bool {
                *self == $name::Invalid
            }

            fn to_value(&self) -> ::yoctoproxy_core::types::Value {
                (*self).into()
            }
        }
    };
}

pub(crate) use proxy_enum;

proxy_enum! {
    /// Generic on/off switch used by several functions
    pub enum OnOff {
        Off = 0 => "OFF",
        On = 1 => "ON",
    }
}

/// Notification published by proxies on the shared event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProxyEvent {
    /// The proxy got a (new) hardware reference
    Linked {
        /// Proxy class
        class: FunctionClass,
        /// Name the proxy was created with
        instantiation_name: String,
        /// Hardware id of the bound function
        hardware_id: String,
        /// Time of the event
        timestamp: DateTime<Utc>,
    },
    /// The bound function became reachable
    Arrival {
        /// Proxy class
        class: FunctionClass,
        /// Hardware id of the bound function
        hardware_id: String,
        /// Time of the event
        timestamp: DateTime<Utc>,
    },
    /// The bound function went away
    Removal {
        /// Proxy class
        class: FunctionClass,
        /// Hardware id of the bound function
        hardware_id: String,
        /// Time of the event
        timestamp: DateTime<Utc>,
    },
    /// A cached property changed
    PropertyChanged {
        /// Proxy class
        class: FunctionClass,
        /// Hardware id of the bound function
        hardware_id: String,
        /// Property name
        property: String,
        /// New value, enums in proxy encoding
        value: Value,
        /// Time of the event
        timestamp: DateTime<Utc>,
    },
}

impl ProxyEvent {
    /// Hardware id the event is about
    pub fn hardware_id(&self) -> &str {
        match self {
            ProxyEvent::Linked { hardware_id, .. }
            | ProxyEvent::Arrival { hardware_id, .. }
            | ProxyEvent::Removal { hardware_id, .. }
            | ProxyEvent::PropertyChanged { hardware_id, .. } => hardware_id,
        }
    }

    /// Serialize the event as JSON
    pub fn to_json(&self) -> std::result::Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

struct Binding<H: ?Sized> {
    hardware: Option<Arc<H>>,
    instantiation_name: String,
    hardware_id: String,
    online: bool,
    logical_name: String,
    advertised_value: String,
}

/// State shared by every proxy: hardware binding plus a typed cache
pub struct ProxyBase<H: ?Sized, C> {
    class: FunctionClass,
    binding: RwLock<Binding<H>>,
    cache: RwLock<C>,
    events: SharedEventBus,
    owner: Weak<dyn ProxyObject>,
}

impl<H: ?Sized, C> fmt::Debug for ProxyBase<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ProxyBase")
            .field("class", &self.class)
            .field("instantiation_name", &binding.instantiation_name)
            .field("hardware_id", &binding.hardware_id)
            .field("bound", &binding.hardware.is_some())
            .field("online", &binding.online)
            .finish()
    }
}

impl<H, C> ProxyBase<H, C>
where
    H: ?Sized + HardwareFunction,
    C: Default,
{
    /// Create an unbound proxy state
    pub fn new(
        class: FunctionClass,
        instantiation_name: &str,
        events: SharedEventBus,
        owner: Weak<dyn ProxyObject>,
    ) -> Self {
        Self {
            class,
            binding: RwLock::new(Binding {
                hardware: None,
                instantiation_name: instantiation_name.to_string(),
                hardware_id: String::new(),
                online: false,
                logical_name: String::new(),
                advertised_value: String::new(),
            }),
            cache: RwLock::new(C::default()),
            events,
            owner,
        }
    }
}

impl<H, C> ProxyBase<H, C>
where
    H: ?Sized + HardwareFunction,
{
    /// Proxy class
    pub fn class(&self) -> FunctionClass {
        self.class
    }

    /// Current hardware reference
    pub fn hardware(&self) -> Option<Arc<H>> {
        self.binding_read().hardware.clone()
    }

    /// Whether a hardware reference is held
    pub fn is_bound(&self) -> bool {
        self.binding_read().hardware.is_some()
    }

    /// Name the proxy was created with
    pub fn instantiation_name(&self) -> String {
        self.binding_read().instantiation_name.clone()
    }

    /// Hardware id of the bound function, empty when never bound
    pub fn hardware_id(&self) -> String {
        self.binding_read().hardware_id.clone()
    }

    /// Online flag as of the last arrival or removal
    pub fn online(&self) -> bool {
        self.binding_read().online
    }

    /// Cached logical name
    pub fn logical_name(&self) -> String {
        self.binding_read().logical_name.clone()
    }

    /// Cached advertised value
    pub fn advertised_value(&self) -> String {
        self.binding_read().advertised_value.clone()
    }

    /// Event bus the proxy publishes on
    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    fn binding_read(&self) -> std::sync::RwLockReadGuard<'_, Binding<H>> {
        self.binding.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn binding_write(&self) -> std::sync::RwLockWriteGuard<'_, Binding<H>> {
        self.binding.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn require(&self) -> Result<Arc<H>> {
        self.hardware()
            .ok_or(ProxyError::NotConnected { class: self.class })
    }

    /// Round trip to the hardware
    pub fn read<T>(&self, call: impl FnOnce(&H) -> HwResult<T>) -> Result<T> {
        let hw = self.require()?;
        Ok(call(&hw)?)
    }

    /// Forward a setter; invalid values are dropped without error
    pub fn write<T: CacheValue>(&self, value: T, call: impl FnOnce(&H, T) -> HwResult<()>) -> Result<()> {
        let hw = self.require()?;
        if value.is_invalid() {
            return Ok(());
        }
        Ok(call(&hw, value)?)
    }

    /// Read a cached property
    pub fn cached<T: Clone>(&self, field: impl FnOnce(&C) -> &T) -> T {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        field(&cache).clone()
    }

    /// Update a cached property, publishing a change event when it differs.
    /// Returns whether the value changed.
    pub fn store<T: CacheValue>(&self, property: &str, field: impl FnOnce(&mut C) -> &mut T, value: T) -> bool {
        let changed = {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            let slot = field(&mut cache);
            if slot.same(&value) {
                false
            } else {
                *slot = value.clone();
                true
            }
        };
        if changed {
            self.property_changed(property, value.to_value());
        }
        changed
    }

    /// Cached-property setter: forward and cache the value when bound,
    /// valid and different from the cache
    pub fn apply<T, F>(&self, property: &str, field: F, value: T, call: impl FnOnce(&H, T) -> HwResult<()>) -> Result<()>
    where
        T: CacheValue,
        F: Fn(&mut C) -> &mut T,
    {
        let hw = match self.hardware() {
            Some(hw) => hw,
            None => return Ok(()),
        };
        if value.is_invalid() {
            return Ok(());
        }
        let current = {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            field(&mut cache).clone()
        };
        if current.same(&value) {
            return Ok(());
        }
        call(&hw, value.clone())?;
        self.store(property, field, value);
        Ok(())
    }

    /// Load a property from the hardware into the cache. Library errors keep
    /// the previous value.
    pub fn refresh<T: CacheValue>(&self, property: &str, field: impl FnOnce(&mut C) -> &mut T, load: impl FnOnce(&H) -> HwResult<T>) {
        let hw = match self.hardware() {
            Some(hw) => hw,
            None => return,
        };
        match load(&hw) {
            Ok(value) => {
                self.store(property, field, value);
            }
            Err(e) => {
                debug!(class = %self.class, property, "Keeping cached value: {}", e);
            }
        }
    }

    pub(crate) fn emit(&self, event: ProxyEvent) {
        if let Err(e) = self.events.publish(event) {
            warn!(class = %self.class, "Failed to publish proxy event: {}", e);
        }
    }

    fn property_changed(&self, property: &str, value: Value) {
        self.emit(ProxyEvent::PropertyChanged {
            class: self.class,
            hardware_id: self.hardware_id(),
            property: property.to_string(),
            value,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn rename(&self, name: &str) {
        self.binding_write().instantiation_name = name.to_string();
    }

    /// Swap the hardware reference, returning the previous one
    fn bind(&self, hardware: Arc<H>, hardware_id: String) -> Option<Arc<H>> {
        let mut binding = self.binding_write();
        binding.hardware_id = hardware_id;
        binding.online = false;
        binding.hardware.replace(hardware)
    }

    fn unbind(&self) -> Option<Arc<H>> {
        let mut binding = self.binding_write();
        binding.online = false;
        binding.hardware.take()
    }

    fn set_online(&self, online: bool) {
        self.binding_write().online = online;
    }

    fn set_logical_name(&self, name: String) {
        let changed = {
            let mut binding = self.binding_write();
            if binding.logical_name == name {
                false
            } else {
                binding.logical_name = name.clone();
                true
            }
        };
        if changed {
            self.property_changed("logical_name", Value::String(name));
        }
    }

    fn set_advertised_value(&self, value: &str) {
        let changed = {
            let mut binding = self.binding_write();
            if binding.advertised_value == value {
                false
            } else {
                binding.advertised_value = value.to_string();
                true
            }
        };
        if changed {
            self.property_changed("advertised_value", Value::from(value));
        }
    }

    /// Register callbacks that reach the owning proxy through a weak reference
    fn init(&self, hw: &H) {
        let owner = self.owner.clone();
        hw.register_value_callback(Some(Arc::new(move |value: &str| {
            if let Some(proxy) = owner.upgrade() {
                proxy.value_change_callback(value);
            }
        })));
        let owner = self.owner.clone();
        hw.register_config_change_callback(Some(Arc::new(move || {
            if let Some(proxy) = owner.upgrade() {
                proxy.module_config_has_changed();
            }
        })));
    }

    fn reload_identity(&self) {
        let hw = match self.hardware() {
            Some(hw) => hw,
            None => return,
        };
        match hw.get_logical_name() {
            Ok(name) => self.set_logical_name(name),
            Err(e) => debug!(class = %self.class, "Keeping cached logical name: {}", e),
        }
        match hw.get_advertised_value() {
            Ok(value) => self.set_advertised_value(&value),
            Err(e) => debug!(class = %self.class, "Keeping cached advertised value: {}", e),
        }
    }
}

/// Typed proxy of one function class
pub trait FunctionProxy: Sized + Send + Sync + 'static {
    /// Function class served by the proxy
    const CLASS: FunctionClass;

    /// Hardware trait of the class
    type Hardware: ?Sized + HardwareFunction;

    /// Cached properties
    type Cache: Default + Send + Sync + 'static;

    /// Wrap a proxy state
    fn new(base: ProxyBase<Self::Hardware, Self::Cache>) -> Self;

    /// Proxy state
    fn base(&self) -> &ProxyBase<Self::Hardware, Self::Cache>;

    /// Extract the typed hardware reference from a handle of the right class
    fn select(handle: &FunctionHandle) -> Option<Arc<Self::Hardware>>;

    /// Reload configuration attributes after an arrival or a module
    /// configuration change
    fn refresh_config(&self) {}

    /// Reload measured attributes after an arrival
    fn refresh_cache(&self) {}

    /// Update the cache from a pushed advertised value
    fn parse_advertised(&self, _value: &str) {}

    /// Create an unbound proxy
    fn create(name: &str, events: SharedEventBus) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let owner: Weak<dyn ProxyObject> = weak.clone();
            Self::new(ProxyBase::new(Self::CLASS, name, events, owner))
        })
    }

    /// Registry lookup, see [`ProxyManager::find`]
    fn find(manager: &ProxyManager, name: &str) -> Arc<Self> {
        manager.find::<Self>(name)
    }

    /// Hardware ids of every function of the class
    fn similar_functions(manager: &ProxyManager) -> Vec<String> {
        manager.similar_functions(Self::CLASS)
    }

    /// Read the logical name from the device
    fn get_logical_name(&self) -> Result<String> {
        self.base().read(|hw| hw.get_logical_name())
    }

    /// Change the logical name on the device
    fn set_logical_name(&self, name: &str) -> Result<()> {
        if !is_valid_logical_name(name) {
            return Err(HardwareError::InvalidArgument(format!("Invalid logical name: {}", name)).into());
        }
        self.base().read(|hw| hw.set_logical_name(name))
    }

    /// Cached logical name
    fn logical_name(&self) -> String {
        self.base().logical_name()
    }

    /// Cached logical name setter
    fn apply_logical_name(&self, name: &str) -> Result<()> {
        let base = self.base();
        let hw = match base.hardware() {
            Some(hw) => hw,
            None => return Ok(()),
        };
        if !is_valid_logical_name(name) || base.logical_name() == name {
            return Ok(());
        }
        hw.set_logical_name(name)?;
        base.set_logical_name(name.to_string());
        Ok(())
    }

    /// Read the advertised value from the device
    fn get_advertised_value(&self) -> Result<String> {
        self.base().read(|hw| hw.get_advertised_value())
    }

    /// Cached advertised value
    fn advertised_value(&self) -> String {
        self.base().advertised_value()
    }

    /// Function id of the bound function
    fn get_function_id(&self) -> Result<String> {
        self.base().read(|hw| Ok(hw.function_id()))
    }

    /// Serial number of the module hosting the bound function
    fn get_serial_number(&self) -> Result<String> {
        self.base().read(|hw| Ok(hw.serial_number()))
    }

    /// `module.function` name of the bound function
    fn get_friendly_name(&self) -> Result<String> {
        self.base().read(|hw| hw.get_friendly_name())
    }
}

/// Class-independent view of a proxy, as held by the manager and by
/// hardware callbacks
pub trait ProxyObject: Send + Sync {
    /// Function class
    fn class(&self) -> FunctionClass;

    /// Name the proxy was created with
    fn instantiation_name(&self) -> String;

    /// Hardware id of the bound function, empty when never bound
    fn hardware_id(&self) -> String;

    /// Whether a hardware reference is held
    fn is_bound(&self) -> bool;

    /// Whether the bound function is reachable right now
    fn is_online(&self) -> bool;

    /// Change the instantiation name of a placeholder
    fn rename(&self, name: &str);

    /// Bind to `handle`. Returns `false` when already bound to it.
    fn link_to_hardware(&self, handle: &FunctionHandle) -> Result<bool>;

    /// The bound function became reachable
    fn function_arrival(&self);

    /// The bound function went away
    fn function_removal(&self);

    /// The configuration of the hosting module changed
    fn module_config_has_changed(&self);

    /// The device pushed a new advertised value
    fn value_change_callback(&self, value: &str);

    /// Drop callbacks and the hardware reference
    fn unlink(&self);

    /// Upcast for downcasting to the concrete proxy type
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<P: FunctionProxy> ProxyObject for P {
    fn class(&self) -> FunctionClass {
        P::CLASS
    }

    fn instantiation_name(&self) -> String {
        self.base().instantiation_name()
    }

    fn hardware_id(&self) -> String {
        self.base().hardware_id()
    }

    fn is_bound(&self) -> bool {
        self.base().is_bound()
    }

    fn is_online(&self) -> bool {
        match self.base().hardware() {
            Some(hw) => hw.is_online(),
            None => false,
        }
    }

    fn rename(&self, name: &str) {
        self.base().rename(name);
    }

    fn link_to_hardware(&self, handle: &FunctionHandle) -> Result<bool> {
        let base = self.base();
        let hw = P::select(handle).ok_or(ProxyError::ClassMismatch {
            expected: P::CLASS,
            actual: handle.class(),
        })?;
        let hardware_id = handle.hardware_id();
        if base.is_bound() && base.hardware_id() == hardware_id {
            return Ok(false);
        }

        if let Some(previous) = base.bind(hw.clone(), hardware_id.clone()) {
            debug!(class = %P::CLASS, from = %previous.hardware_id(), to = %hardware_id, "Rebinding proxy");
            previous.register_value_callback(None);
            previous.register_config_change_callback(None);
        } else {
            debug!(class = %P::CLASS, hardware_id = %hardware_id, "Binding proxy");
        }

        base.init(&hw);
        base.emit(ProxyEvent::Linked {
            class: P::CLASS,
            instantiation_name: base.instantiation_name(),
            hardware_id,
            timestamp: Utc::now(),
        });

        if hw.is_online() {
            self.function_arrival();
        }
        Ok(true)
    }

    fn function_arrival(&self) {
        let base = self.base();
        if !base.is_bound() {
            return;
        }
        base.set_online(true);
        base.reload_identity();
        self.refresh_config();
        self.refresh_cache();
        info!(class = %P::CLASS, hardware_id = %base.hardware_id(), "Function arrival");
        base.emit(ProxyEvent::Arrival {
            class: P::CLASS,
            hardware_id: base.hardware_id(),
            timestamp: Utc::now(),
        });
    }

    fn function_removal(&self) {
        let base = self.base();
        base.set_online(false);
        info!(class = %P::CLASS, hardware_id = %base.hardware_id(), "Function removal");
        base.emit(ProxyEvent::Removal {
            class: P::CLASS,
            hardware_id: base.hardware_id(),
            timestamp: Utc::now(),
        });
    }

    fn module_config_has_changed(&self) {
        let base = self.base();
        if let Some(hw) = base.hardware() {
            match hw.get_logical_name() {
                Ok(name) => base.set_logical_name(name),
                Err(e) => debug!(class = %P::CLASS, "Keeping cached logical name: {}", e),
            }
        }
        self.refresh_config();
    }

    fn value_change_callback(&self, value: &str) {
        self.base().set_advertised_value(value);
        self.parse_advertised(value);
    }

    fn unlink(&self) {
        if let Some(previous) = self.base().unbind() {
            debug!(class = %P::CLASS, hardware_id = %previous.hardware_id(), "Unlinking proxy");
            previous.register_value_callback(None);
            previous.register_config_change_callback(None);
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::motor::{MotorProxy, MotorStatus};
    use crate::hardware::HardwareLibrary;
    use crate::sim::{SimModule, SimulatedLibrary};

    proxy_enum! {
        enum Speed {
            Slow = 0 => "SLOW",
            Fast = 1 => "FAST",
        }
    }

    fn motor_module() -> SimModule {
        SimModule::new("MOTORCTL-00001").with_function(FunctionClass::Motor, "motor")
    }

    fn bound_motor() -> (Arc<SimulatedLibrary>, Arc<MotorProxy>) {
        let library = Arc::new(SimulatedLibrary::new());
        library.plug(motor_module());
        let proxy = MotorProxy::create("motor", SharedEventBus::new());
        let handle = library
            .find_function(FunctionClass::Motor, "motor")
            .expect("motor is plugged");
        assert!(proxy.link_to_hardware(&handle).unwrap());
        (library, proxy)
    }

    #[test]
    fn test_enum_remapping() {
        assert_eq!(Speed::from_library(-1), Speed::Invalid);
        assert_eq!(Speed::from_library(0), Speed::Slow);
        assert_eq!(Speed::from_library(7), Speed::Invalid);
        assert_eq!(Speed::Fast.code(), 2);
        assert_eq!(Speed::Invalid.code(), 0);
        assert_eq!(Speed::Invalid.to_library(), -1);
        assert_eq!(Speed::from_code(1), Speed::Slow);
        assert_eq!(Speed::from_code(0), Speed::Invalid);
        assert_eq!(Speed::from_code(i32::MIN), Speed::Invalid);
        assert_eq!(Speed::from_name("FAST"), Speed::Fast);
        assert_eq!(Speed::from_name("bogus"), Speed::Invalid);
        assert_eq!(Speed::VARIANTS.len(), 3);
        assert_eq!(Value::from(Speed::Fast), Value::Integer(2));
    }

    #[test]
    fn test_cache_value_invalid_markers() {
        assert!(f64::NAN.is_invalid());
        assert!(f64::NAN.same(&f64::NAN));
        assert!(!1.5f64.is_invalid());
        assert!(invalid::INT.is_invalid());
        assert!(invalid::LONG.is_invalid());
        assert!(invalid::STRING.to_string().is_invalid());
        assert!(OnOff::Invalid.is_invalid());
        assert!(sentinel::double(invalid::DOUBLE).is_nan());
        assert_eq!(sentinel::double(3.0), 3.0);
    }

    #[test]
    fn test_unbound_proxy_behaviour() {
        let proxy = MotorProxy::create("nowhere", SharedEventBus::new());
        assert!(!proxy.is_bound());
        assert!(!proxy.is_online());
        assert_eq!(proxy.hardware_id(), "");

        let err = proxy.get_motor_status().unwrap_err();
        assert_eq!(err.to_string(), "No Motor connected");
        assert!(matches!(
            proxy.set_driving_force(10.0),
            Err(ProxyError::NotConnected { class: FunctionClass::Motor })
        ));

        // cached setters are silent without hardware
        assert!(proxy.apply_driving_force(10.0).is_ok());
        assert!(proxy.driving_force().is_nan());
        assert_eq!(proxy.motor_status(), MotorStatus::Invalid);
    }

    #[test]
    fn test_link_registers_callbacks_and_arrival() {
        let (library, proxy) = bound_motor();
        assert!(proxy.is_online());
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");
        assert_eq!(proxy.motor_status(), MotorStatus::Idle);

        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        hw.push_value("FORWD");
        assert_eq!(proxy.advertised_value(), "FORWD");
        assert_eq!(proxy.motor_status(), MotorStatus::Forwd);
    }

    #[test]
    fn test_link_same_hardware_is_noop() {
        let (library, proxy) = bound_motor();
        let handle = library
            .find_function(FunctionClass::Motor, "MOTORCTL-00001.motor")
            .unwrap();
        assert!(!proxy.link_to_hardware(&handle).unwrap());
    }

    #[test]
    fn test_link_rejects_other_class() {
        let library = SimulatedLibrary::new();
        library.plug(SimModule::new("RELAY-00001").with_function(FunctionClass::Watchdog, "watchdog1"));
        let proxy = MotorProxy::create("", SharedEventBus::new());
        let handle = library.find_function(FunctionClass::Watchdog, "watchdog1").unwrap();
        assert!(matches!(
            proxy.link_to_hardware(&handle),
            Err(ProxyError::ClassMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_skips_invalid_and_unchanged() {
        let (library, proxy) = bound_motor();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();

        proxy.apply_driving_force(25.0).unwrap();
        proxy.apply_driving_force(25.0).unwrap();
        proxy.apply_driving_force(f64::NAN).unwrap();

        let writes: Vec<_> = hw
            .journal()
            .into_iter()
            .filter(|line| line.starts_with("set_driving_force"))
            .collect();
        assert_eq!(writes, vec!["set_driving_force(25)".to_string()]);
        assert_eq!(proxy.driving_force(), 25.0);
    }

    #[test]
    fn test_refresh_keeps_value_on_error() {
        let (library, proxy) = bound_motor();
        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        proxy.apply_frequency(20000.0).unwrap();

        hw.set_failure(Some(HardwareError::Io("link down".into())));
        proxy.refresh_config();
        assert_eq!(proxy.frequency(), 20000.0);
        hw.set_failure(None);
    }

    #[test]
    fn test_removal_keeps_binding() {
        let (library, proxy) = bound_motor();
        library.unplug("MOTORCTL-00001");
        proxy.function_removal();
        assert!(proxy.is_bound());
        assert!(!proxy.is_online());
        assert_eq!(proxy.hardware_id(), "MOTORCTL-00001.motor");
    }

    #[test]
    fn test_unlink_drops_callbacks() {
        let (library, proxy) = bound_motor();
        proxy.unlink();
        assert!(!proxy.is_bound());

        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        hw.push_value("BRAKE");
        assert_eq!(proxy.motor_status(), MotorStatus::Idle);
    }

    #[test]
    fn test_logical_name_validation() {
        let (_library, proxy) = bound_motor();
        assert!(proxy.set_logical_name("bad name").is_err());
        proxy.apply_logical_name("leftWheel").unwrap();
        assert_eq!(proxy.logical_name(), "leftWheel");
        assert_eq!(proxy.get_logical_name().unwrap(), "leftWheel");
    }

    #[test]
    fn test_external_rename_reloads_logical_name() {
        let (library, proxy) = bound_motor();
        assert_eq!(proxy.logical_name(), "");

        let hw = library.function("MOTORCTL-00001.motor").unwrap();
        hw.set_logical_name("rightWheel").unwrap();
        assert_eq!(proxy.logical_name(), "rightWheel");

        // offline, the cached name is kept
        library.unplug("MOTORCTL-00001");
        proxy.module_config_has_changed();
        assert_eq!(proxy.logical_name(), "rightWheel");
    }

    #[tokio::test]
    async fn test_property_change_events() {
        let events = SharedEventBus::new();
        let mut rx = events.subscribe::<ProxyEvent>().unwrap();

        let library = SimulatedLibrary::new();
        library.plug(motor_module());
        let proxy = MotorProxy::create("motor", events);
        let handle = library.find_function(FunctionClass::Motor, "motor").unwrap();
        proxy.link_to_hardware(&handle).unwrap();

        let mut saw_linked = false;
        let mut saw_arrival = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProxyEvent::Linked { .. } => saw_linked = true,
                ProxyEvent::Arrival { hardware_id, .. } => {
                    assert_eq!(hardware_id, "MOTORCTL-00001.motor");
                    saw_arrival = true;
                }
                _ => {}
            }
        }
        assert!(saw_linked && saw_arrival);

        proxy.apply_driving_force(40.0).unwrap();
        let event = rx.recv().await.unwrap();
        match &event {
            ProxyEvent::PropertyChanged { property, value, .. } => {
                assert_eq!(property, "driving_force");
                assert_eq!(value, &Value::Float(40.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(event.to_json().unwrap().contains("driving_force"));
    }
}
