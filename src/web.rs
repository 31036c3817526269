//! Browser bindings
//!
//! Exposes the settings to the page's JavaScript and adapts a plain JS app
//! object to [`HostApp`] by calling its methods by name.

use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::error::HostError;
use crate::host::{GistCredentials, HostApp, Workspace};
use crate::observable::SubscriptionId;
use crate::settings::{Settings, SettingsPatch};
use crate::storage::{StorageAdapter, StorageMode};

/// Install the panic hook and console logger
#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();
    // Already initialised if the page calls this twice
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Whether an embedding host owns the settings
#[wasm_bindgen(js_name = detectHostManaged)]
pub fn detect_host_managed() -> bool {
    StorageMode::detect().is_host_managed()
}

#[wasm_bindgen]
pub struct WebSettings {
    settings: Settings,
}

#[wasm_bindgen]
impl WebSettings {
    /// Load settings; `hostManaged` defaults to probing for the host
    #[wasm_bindgen(constructor)]
    pub fn new(host_managed: Option<bool>) -> WebSettings {
        let mode = host_managed
            .map(StorageMode::from_host_managed)
            .unwrap_or_else(StorageMode::detect);
        let storage = Rc::new(StorageAdapter::new(mode));
        WebSettings {
            settings: Settings::load(storage),
        }
    }

    #[wasm_bindgen(js_name = hostManaged)]
    pub fn host_managed(&self) -> bool {
        self.settings.storage().mode().is_host_managed()
    }

    /// Current values as JSON
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.settings.snapshot()).map_err(to_js_error)
    }

    /// Assign the fields present in a JSON object; others are left alone
    pub fn update(&mut self, json: &str) -> Result<u32, JsValue> {
        let patch: SettingsPatch = serde_json::from_str(json).map_err(to_js_error)?;
        Ok(self.settings.update(patch) as u32)
    }

    /// Current value of one setting
    pub fn get(&self, key: &str) -> Result<JsValue, JsValue> {
        let value = self.settings.get_value(key).map_err(to_js_error)?;
        json_to_js(&value)
    }

    /// Assign one setting; returns `true` if it changed
    pub fn set(&mut self, key: &str, value: JsValue) -> Result<bool, JsValue> {
        let value = js_to_json(&value)?;
        self.settings.set_value(key, value).map_err(to_js_error)
    }

    /// Call `callback(newValue)` whenever `key` changes
    ///
    /// The callback must not call back into this object.
    pub fn subscribe(&mut self, key: &str, callback: Function) -> Result<u64, JsValue> {
        let id = self
            .settings
            .subscribe_value(key, move |value| {
                let result = json_to_js(value).and_then(|v| callback.call1(&JsValue::NULL, &v));
                if let Err(e) = result {
                    log::warn!("Setting listener failed: {}", describe(&e));
                }
            })
            .map_err(to_js_error)?;
        Ok(id.as_raw())
    }

    pub fn unsubscribe(&mut self, key: &str, id: u64) -> bool {
        self.settings
            .unsubscribe_value(key, SubscriptionId::from_raw(id))
    }

    /// Push the current values into `app`
    pub fn apply(&self, app: JsValue) -> Result<(), JsValue> {
        let mut host = JsHost::new(app);
        self.settings.apply(&mut host).map_err(to_js_error)
    }
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn json_to_js(value: &serde_json::Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(to_js_error)?;
    js_sys::JSON::parse(&text)
}

fn js_to_json(value: &JsValue) -> Result<serde_json::Value, JsValue> {
    // `undefined` has no JSON form
    if value.is_undefined() {
        return Ok(serde_json::Value::Null);
    }
    let text: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&text).map_err(to_js_error)
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", err))
}

/// Call `target[method](...args)`
fn call_method(
    target: &JsValue,
    setter: &'static str,
    method: &str,
    args: &Array,
) -> Result<(), HostError> {
    let func = Reflect::get(target, &JsValue::from_str(method))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or(HostError::Unsupported(setter))?;

    func.apply(target, args)
        .map(|_| ())
        .map_err(|e| HostError::Failed {
            setter,
            message: describe(&e),
        })
}

fn nullable(value: Option<&str>) -> JsValue {
    value.map(JsValue::from_str).unwrap_or(JsValue::NULL)
}

struct JsWorkspace(JsValue);

impl Workspace for JsWorkspace {
    fn set_throttle(&mut self, ms: u32) -> Result<(), HostError> {
        call_method(
            &self.0,
            "workspace.setThrottle",
            "setThrottle",
            &Array::of1(&JsValue::from(ms)),
        )
    }
}

/// A JS app object acting as the host
struct JsHost {
    app: JsValue,
    workspace: Option<JsWorkspace>,
}

impl JsHost {
    fn new(app: JsValue) -> Self {
        let workspace = Reflect::get(&app, &JsValue::from_str("workspace"))
            .ok()
            .filter(|w| w.is_object())
            .map(JsWorkspace);
        Self { app, workspace }
    }

    fn call(&self, setter: &'static str, args: &Array) -> Result<(), HostError> {
        call_method(&self.app, setter, setter, args)
    }
}

impl HostApp for JsHost {
    fn set_theme(&mut self, name: &str) -> Result<(), HostError> {
        self.call("setTheme", &Array::of1(&JsValue::from_str(name)))
    }

    fn set_language(&mut self, code: &str) -> Result<(), HostError> {
        self.call("setLanguage", &Array::of1(&JsValue::from_str(code)))
    }

    fn toggle_night_mode(&mut self) -> Result<(), HostError> {
        self.call("toggleNightMode", &Array::new())
    }

    fn set_markup_language(&mut self, name: &str) -> Result<(), HostError> {
        self.call("setMarkupLanguage", &Array::of1(&JsValue::from_str(name)))
    }

    fn set_gist_credentials(&mut self, credentials: GistCredentials) -> Result<(), HostError> {
        let arg = Object::new();
        for (field, value) in [("token", &credentials.token), ("file", &credentials.file)] {
            Reflect::set(&arg, &JsValue::from_str(field), &nullable(value.as_deref())).map_err(
                |e| HostError::Failed {
                    setter: "setGistCredentials",
                    message: describe(&e),
                },
            )?;
        }
        self.call("setGistCredentials", &Array::of1(&arg))
    }

    fn workspace_mut(&mut self) -> Option<&mut dyn Workspace> {
        self.workspace.as_mut().map(|w| w as &mut dyn Workspace)
    }
}
