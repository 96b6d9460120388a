// Copyright 2025 Benchwatch Project
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

// ABOUTME: Error types for the Benchwatch analytics service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchwatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("upstream benchmark data incoherent: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchwatchError {
    /// Whether the operation that produced this error is safe to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, BenchwatchError::Transient(_))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        BenchwatchError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        BenchwatchError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BenchwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BenchwatchError::Transient("timeout".into()).is_transient());
        assert!(!BenchwatchError::NotFound("run".into()).is_transient());
        assert!(!BenchwatchError::Fatal("schema missing".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = BenchwatchError::not_found("run 20250101-000000-abc1234");
        assert_eq!(err.to_string(), "not found: run 20250101-000000-abc1234");
    }
}
