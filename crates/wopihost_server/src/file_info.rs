//! JSON bodies of WOPI responses.

// Field names mirror the WOPI JSON keys.
#![allow(missing_docs)]

use crate::config::ServerConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use wopihost_core::Document;

/// Format of `LastModifiedTime`: ISO 8601 with microseconds and offset.
const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// The CheckFileInfo response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckFileInfo {
    pub base_file_name: String,
    pub owner_id: String,
    pub size: u64,
    pub user_id: String,
    pub version: String,
    pub read_only: bool,
    pub user_can_write: bool,
    pub user_can_not_write_relative: bool,
    pub supports_locks: bool,
    pub supports_get_lock: bool,
    pub supports_extended_lock_length: bool,
    pub supports_update: bool,
    pub supports_rename: bool,
    pub supports_delete_file: bool,
    pub supports_user_info: bool,
    pub user_friendly_name: String,
    pub last_modified_time: String,
    pub disable_print: bool,
    pub allow_external_marketplace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_sharing_url: Option<String>,
    #[serde(rename = "SHA256")]
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<String>,
}

impl CheckFileInfo {
    /// Describes `document` for the configured user.
    pub fn new(document: &Document, config: &ServerConfig, share_url: Option<String>) -> Self {
        Self {
            base_file_name: document.basename(),
            owner_id: document.owner.clone(),
            size: document.size,
            user_id: config.user_id.clone(),
            version: document.item_version(),
            read_only: config.read_only,
            user_can_write: !config.read_only,
            user_can_not_write_relative: config.read_only || config.user_can_not_write_relative,
            supports_locks: true,
            supports_get_lock: true,
            supports_extended_lock_length: true,
            supports_update: true,
            supports_rename: true,
            supports_delete_file: true,
            supports_user_info: true,
            user_friendly_name: config.user_friendly_name.clone(),
            last_modified_time: document
                .last_modified
                .format(LAST_MODIFIED_FORMAT)
                .to_string(),
            disable_print: config.disable_print,
            allow_external_marketplace: config.allow_external_marketplace,
            download_url: share_url.clone(),
            file_sharing_url: share_url,
            sha256: STANDARD.encode(document.sha256),
            user_info: document.user_info.clone(),
        }
    }
}

/// The PutRelativeFile response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRelativeFileInfo {
    pub name: String,
    pub url: String,
}

/// The RenameFile response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenameFileInfo {
    pub name: String,
}

/// The GetShareUrl response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShareUrlInfo {
    pub share_url: String,
}
