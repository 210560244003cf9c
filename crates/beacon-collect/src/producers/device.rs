//! Device section: what kind of machine the agent runs on.

use beacon_core::Section;
use console::Term;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::producer::Collector;

/// Collects the `device` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCollector;

impl Collector for DeviceCollector {
    fn name(&self) -> &str {
        "device"
    }

    fn collect(&self) -> BoxFuture<'_, Section> {
        Box::pin(async {
            let os = std::env::consts::OS;
            let display = has_display(os, |key| std::env::var_os(key).is_some());
            let terminal = Term::stdout()
                .size_checked()
                .map(|(rows, columns)| json!({"columns": columns, "rows": rows}))
                .unwrap_or(Value::Null);

            Section::Available(json!({
                "os": os,
                "arch": std::env::consts::ARCH,
                "type": device_type(os, display),
                "display": display,
                "terminal": terminal,
            }))
        })
    }
}

/// Whether a graphical session is reachable.
///
/// Unix-like desktops advertise one through `DISPLAY` or `WAYLAND_DISPLAY`;
/// macOS and Windows always have one.
pub fn has_display(os: &str, is_set: impl Fn(&str) -> bool) -> bool {
    match os {
        "macos" | "windows" | "ios" | "android" => true,
        _ => is_set("DISPLAY") || is_set("WAYLAND_DISPLAY"),
    }
}

/// Classifies the device as `mobile`, `server` or `desktop`.
pub fn device_type(os: &str, display: bool) -> &'static str {
    match os {
        "android" | "ios" => "mobile",
        _ if !display => "server",
        _ => "desktop",
    }
}
