// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! None of these errors abort a frame. The passes log them and keep going with
//! degraded output, so they exist mainly to carry a precise diagnostic to the
//! log.

use std::fmt;

/// An error related to compiling or linking a shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The backend rejected the program. Carries the compiler/linker log.
    LinkFailed {
        /// The label of the program.
        label: String,
        /// The diagnostic text reported by the backend.
        log: String,
    },
    /// An entry point named in the descriptor does not exist in the source.
    InvalidEntryPoint {
        /// The label of the program.
        label: String,
        /// The entry point name that was not found.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LinkFailed { label, log } => {
                write!(f, "Shader program '{label}' failed to link: {log}")
            }
            ShaderError::InvalidEntryPoint { label, entry_point } => {
                write!(
                    f,
                    "Invalid entry point '{entry_point}' for shader program '{label}'"
                )
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource (textures, framebuffers, queries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The handle used to reference a resource is invalid or was destroyed.
    InvalidHandle,
    /// The device could not allocate the resource.
    CreationFailed {
        /// What was being created.
        what: String,
        /// The backend's reason.
        reason: String,
    },
    /// A read-back (query result, stencil contents) could not be completed.
    ReadbackFailed(String),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::CreationFailed { what, reason } => {
                write!(f, "Failed to create {what}: {reason}")
            }
            ResourceError::ReadbackFailed(msg) => write!(f, "GPU read-back failed: {msg}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}
