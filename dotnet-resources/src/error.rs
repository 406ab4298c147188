// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum ResourcesError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("resources container is corrupt: {0}")]
    Format(String),

    #[error("unexpected end of resources data")]
    Truncated,

    #[error("resource name already added: {0}")]
    DuplicateName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource reader is closed")]
    Closed,

    #[error("resource writer has already generated its output")]
    WriterSpent,

    #[error("unable to resolve resource type: {0}")]
    TypeResolution(String),

    #[error("resource is not a string; its type is {0}")]
    NotAString(String),

    #[error("enumerator {0}")]
    EnumeratorState(&'static str),
}

impl From<std::io::Error> for ResourcesError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

impl ResourcesError {
    pub(crate) fn format(message: impl ToString) -> Self {
        Self::Format(message.to_string())
    }

    /// Convert truncation into a format error.
    ///
    /// A container that ends early is a malformed container. Readers apply this
    /// at their public boundary.
    pub(crate) fn into_format(self) -> Self {
        match self {
            Self::Truncated => Self::Format("unexpected end of resources data".to_string()),
            e => e,
        }
    }
}

/// Result type for this crate.
pub type ResourcesResult<T> = std::result::Result<T, ResourcesError>;
