//! Path translation between the host path grammar and the Linux
//! compatibility layer's grammar.

use serde::{Deserialize, Serialize};

/// Direction of a path translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathDirection {
    /// Host grammar to layer grammar (`C:\data` becomes `/mnt/c/data`).
    HostToLayer,
    /// Layer grammar back to host grammar (`/mnt/c/data` becomes `C:\data`).
    LayerToHost,
}

/// Converts a host drive-letter path to the layer's mount-point grammar.
///
/// Idempotent: a path that already lacks a drive prefix only has its
/// separators normalized, so translating twice equals translating once.
pub(crate) fn host_to_layer(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() > 2
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
        && bytes[0].is_ascii_alphabetic()
    {
        let drive = bytes[0].to_ascii_lowercase() as char;
        let rest = path[2..].replace('\\', "/");
        return format!("/mnt/{drive}{rest}");
    }
    path.replace('\\', "/")
}

/// Converts a layer mount-point path back to the host drive-letter grammar.
///
/// Paths outside the mount-point grammar are returned unchanged, which also
/// makes the conversion idempotent.
pub(crate) fn layer_to_host(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/mnt/") else {
        return path.to_string();
    };
    let mut chars = rest.chars();
    let Some(drive) = chars.next() else {
        return path.to_string();
    };
    if !drive.is_ascii_alphabetic() {
        return path.to_string();
    }
    let remainder = chars.as_str();
    if !remainder.is_empty() && !remainder.starts_with('/') {
        return path.to_string();
    }
    format!(
        "{}:{}",
        drive.to_ascii_uppercase(),
        if remainder.is_empty() {
            "\\".to_string()
        } else {
            remainder.replace('/', "\\")
        }
    )
}
