//! Process-wide diagnostic sink.
//!
//! Messages are formatted by the `log_info!`, `log_warning!` and `log_error!`
//! macros and handed to the single active [`Device`]. The default device
//! forwards everything to `tracing`, so host applications only have to install
//! a subscriber.

use std::cell::Cell;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Info,
    Warning,
    Error,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Info => "info",
            Category::Warning => "warning",
            Category::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output end of the logger.
pub trait Device: Send {
    fn write_message(&mut self, category: Category, message: &str);
}

/// Default device: one `tracing` event per message.
#[derive(Debug, Default)]
pub struct TracingDevice;

impl Device for TracingDevice {
    fn write_message(&mut self, category: Category, message: &str) {
        match category {
            Category::Info => tracing::info!(target: "mocap::diagnostics", "{message}"),
            Category::Warning => tracing::warn!(target: "mocap::diagnostics", "{message}"),
            Category::Error => tracing::error!(target: "mocap::diagnostics", "{message}"),
        }
    }
}

/// Discards every message. Installed by [`shutdown`].
#[derive(Debug, Default)]
pub struct NullDevice;

impl Device for NullDevice {
    fn write_message(&mut self, _category: Category, _message: &str) {}
}

struct Logger {
    device: Box<dyn Device>,
    muted: bool,
}

static LOGGER: Lazy<Mutex<Logger>> = Lazy::new(|| {
    Mutex::new(Logger {
        device: Box::new(TracingDevice),
        muted: false,
    })
});

fn logger() -> MutexGuard<'static, Logger> {
    LOGGER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs `device` and releases the previously active one.
pub fn set_device(device: Box<dyn Device>) {
    let previous = std::mem::replace(&mut logger().device, device);
    // Dropped outside the lock so a device may log from its destructor.
    drop(previous);
}

pub fn mute(muted: bool) {
    logger().muted = muted;
}

pub fn is_muted() -> bool {
    logger().muted
}

/// Releases the active device. Later messages are discarded until
/// [`set_device`] is called again.
pub fn shutdown() {
    set_device(Box::new(NullDevice));
}

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside [`Device::write_message`] until dropped.
struct Delivery;

impl Delivery {
    fn start() -> Self {
        DELIVERING.with(|flag| flag.set(true));
        Delivery
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(false));
    }
}

/// Hands a formatted message to the active device.
///
/// Messages logged by the device itself while it writes go straight to
/// `tracing`; devices must not call [`set_device`] from `write_message`.
pub fn write(category: Category, args: fmt::Arguments<'_>) {
    if DELIVERING.with(Cell::get) {
        TracingDevice.write_message(category, &args.to_string());
        return;
    }
    let mut logger = logger();
    if logger.muted {
        return;
    }
    let message = args.to_string();
    let _delivery = Delivery::start();
    logger.device.write_message(category, &message);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::diagnostics::write($crate::diagnostics::Category::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::diagnostics::write($crate::diagnostics::Category::Warning, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::diagnostics::write($crate::diagnostics::Category::Error, format_args!($($arg)*))
    };
}
