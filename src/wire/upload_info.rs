// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Upload-header construction. File-hash/metadata *computation* is out of
//! scope here; this is the pure formatting step that turns already-computed
//! fields into the NUL-terminated header line an `AABB` upload request
//! carries as its payload.

use std::fmt;

/// Caller-supplied metadata describing a file about to be uploaded over an
/// `AABB` channel. The MD5 digest and size are computed by the file layer;
/// this crate only formats them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadInfo {
    pub upload_type: u8,
    pub name: String,
    pub size: u64,
    pub md5_hex: String,
    pub user_name: String,
    pub user_id: String,
    pub machine_id: String,
}

impl FileUploadInfo {
    /// Replace any byte outside `[A-Za-z0-9._-]` with `_`, then strip
    /// leading dots and collapse `..` — mirrors
    /// `FileUploadInfo.sanitize_filename`.
    pub fn sanitize_filename(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        cleaned.trim_start_matches('.').replace("..", ".")
    }

    /// Render the `"type,name,size,md5,user,uid,machine\0"` header line
    /// sent as the payload of the upload-initiation `AABB` request.
    pub fn to_header_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "{},{},{},{},{},{},{}",
            self.upload_type,
            self.name,
            self.size,
            self.md5_hex,
            self.user_name,
            self.user_id,
            self.machine_id
        )
        .into_bytes();
        out.push(0);
        out
    }
}

impl fmt::Display for FileUploadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.upload_type,
            self.name,
            self.size,
            self.md5_hex,
            self.user_name,
            self.user_id,
            self.machine_id
        )
    }
}
