// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mobile client fingerprint sent with every routed cloud request.

use serde::Serialize;
use uuid::Uuid;

const APP_ID: &str = "__UNI__55F5E7F";
const APP_NAME: &str = "BrightEMS";
const APP_VERSION: &str = "1.2.3";
const APP_VERSION_CODE: u32 = 123;
const DEVICE_BRAND: &str = "Samsung";
const DEVICE_MODEL: &str = "SM-A426B";
const OS_VERSION: u32 = 10;
const BROWSER_VERSION: &str = "130.0.6723.86";
const LOCALE: &str = "en";

/// User agent of the emulated mobile client.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; SM-A426B) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/87.0.4280.86 Mobile Safari/537.36";

/// The `clientInfo` block identifying the emulated Android app.
///
/// Everything except the device id is fixed. The device id is generated
/// once per instance and stays constant for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    #[serde(rename = "PLATFORM")]
    platform: &'static str,
    #[serde(rename = "OS")]
    os: &'static str,
    #[serde(rename = "APPID")]
    app_id_upper: &'static str,
    #[serde(rename = "DEVICEID")]
    device_id_upper: String,
    channel: &'static str,
    scene: u32,
    #[serde(rename = "appId")]
    app_id: &'static str,
    #[serde(rename = "appLanguage")]
    app_language: &'static str,
    #[serde(rename = "appName")]
    app_name: &'static str,
    #[serde(rename = "appVersion")]
    app_version: &'static str,
    #[serde(rename = "appVersionCode")]
    app_version_code: u32,
    #[serde(rename = "appWgtVersion")]
    app_wgt_version: &'static str,
    #[serde(rename = "browserName")]
    browser_name: &'static str,
    #[serde(rename = "browserVersion")]
    browser_version: &'static str,
    #[serde(rename = "deviceBrand")]
    device_brand: &'static str,
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "deviceModel")]
    device_model: &'static str,
    #[serde(rename = "deviceType")]
    device_type: &'static str,
    #[serde(rename = "osName")]
    os_name: &'static str,
    #[serde(rename = "osVersion")]
    os_version: u32,
    #[serde(rename = "romName")]
    rom_name: &'static str,
    #[serde(rename = "romVersion")]
    rom_version: u32,
    ua: &'static str,
    #[serde(rename = "uniPlatform")]
    uni_platform: &'static str,
    #[serde(rename = "uniRuntimeVersion")]
    uni_runtime_version: &'static str,
    locale: &'static str,
    #[serde(rename = "LOCALE")]
    locale_upper: &'static str,
}

impl ClientInfo {
    /// Creates a fingerprint with a freshly generated device id.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_device_id(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Creates a fingerprint with the given device id.
    #[must_use]
    pub fn with_device_id(device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            platform: "app",
            os: "android",
            app_id_upper: APP_ID,
            device_id_upper: device_id.clone(),
            channel: "google",
            scene: 1001,
            app_id: APP_ID,
            app_language: LOCALE,
            app_name: APP_NAME,
            app_version: APP_VERSION,
            app_version_code: APP_VERSION_CODE,
            app_wgt_version: APP_VERSION,
            browser_name: "chrome",
            browser_version: BROWSER_VERSION,
            device_brand: DEVICE_BRAND,
            device_id,
            device_model: DEVICE_MODEL,
            device_type: "phone",
            os_name: "android",
            os_version: OS_VERSION,
            rom_name: "Android",
            rom_version: OS_VERSION,
            ua: USER_AGENT,
            uni_platform: "app",
            uni_runtime_version: "4.24",
            locale: LOCALE,
            locale_upper: LOCALE,
        }
    }

    /// Returns the emulated device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_device_id_is_upper_hex() {
        let info = ClientInfo::generate();

        assert_eq!(info.device_id().len(), 32);
        assert!(
            info.device_id()
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn serializes_vendor_field_names() {
        let info = ClientInfo::with_device_id("ABC");
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["PLATFORM"], "app");
        assert_eq!(value["DEVICEID"], "ABC");
        assert_eq!(value["deviceId"], "ABC");
        assert_eq!(value["deviceModel"], "SM-A426B");
        assert_eq!(value["appVersionCode"], 123);
        assert_eq!(value["LOCALE"], "en");
    }
}
