//! The hardened launch profile shared by every backend.
//!
//! These values are the safety contract of the sandbox, not incidental
//! flags: a read-only rootfs with exactly two mounts, all capabilities
//! dropped except the one that lets the tracer attach, size-capped
//! in-memory scratch space, and an unconfined seccomp profile as the one
//! deliberate exception that keeps ptrace usable inside an otherwise
//! locked-down container. Both launch strategies consume this module so
//! they cannot drift apart.

use std::path::Path;

use egresswatch_common::constants::{CONTAINER_OUTPUT_DIR, CONTAINER_WORK_DIR};
use egresswatch_common::error::{EgressWatchError, Result};

/// Capability set dropped from the container.
pub const DROPPED_CAPABILITIES: &str = "ALL";

/// The single capability retained, required to attach the tracer to the
/// traced process tree.
pub const RETAINED_CAPABILITY: &str = "SYS_PTRACE";

/// Security options applied to the container. `seccomp=unconfined` is the
/// deliberate exception that permits ptrace; `no-new-privileges` holds for
/// everything else.
pub const SECURITY_OPTS: &[&str] = &["seccomp=unconfined", "no-new-privileges"];

/// In-memory scratch mounts for transient files the traced process needs.
/// Size-capped, no-setuid, and (for `/tmp`) no-exec; filling them is a
/// traced-process failure, not a sandbox failure.
pub const TMPFS_MOUNTS: &[(&str, &str)] = &[
    ("/tmp", "rw,noexec,nosuid,size=100m"),
    ("/root/.local", "rw,nosuid,size=100m"),
    ("/root/.cache", "rw,nosuid,size=50m"),
];

/// Builds the two bind mounts of the sandbox: the command's working
/// directory read-only at `/work`, and the host-owned run output
/// directory writable at `/output`.
#[must_use]
pub fn bind_mounts(work_dir: &Path, output_dir: &Path) -> Vec<String> {
    vec![
        format!("{}:{CONTAINER_WORK_DIR}:ro", work_dir.display()),
        format!("{}:{CONTAINER_OUTPUT_DIR}:rw", output_dir.display()),
    ]
}

/// Validates a container image reference before any launch.
///
/// The allowlist covers standard references (`ubuntu:22.04`,
/// `registry.example.com/team/image@sha256:...`) while rejecting anything
/// that could smuggle extra arguments into a subprocess invocation.
///
/// # Errors
///
/// Returns an error if the reference is empty, too long, starts with a
/// separator, or contains a character outside the allowlist.
pub fn validate_image_name(image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(EgressWatchError::Config {
            message: "container image reference is empty".into(),
        });
    }
    if image.len() > 256 {
        return Err(EgressWatchError::Config {
            message: "container image reference exceeds 256 characters".into(),
        });
    }
    if image.starts_with('-') || image.starts_with('.') || image.starts_with(':') {
        return Err(EgressWatchError::Config {
            message: format!("container image reference cannot start with {:?}", &image[..1]),
        });
    }
    for ch in image.chars() {
        if !ch.is_alphanumeric()
            && ch != '-'
            && ch != '.'
            && ch != ':'
            && ch != '/'
            && ch != '_'
            && ch != '@'
        {
            return Err(EgressWatchError::Config {
                message: format!("container image reference contains invalid character {ch:?}"),
            });
        }
    }
    Ok(())
}
