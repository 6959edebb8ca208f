// Copyright (C) 2023 Huawei Device Co., Ltd.
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

//! Download request description and validation.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::DownloadError;
use crate::task::files::TEMP_SUFFIX;

/// A validated description of one download.
///
/// Requests are built through [`RequestBuilder`], which rejects malformed
/// input before the engine ever sees it. Two requests with the same id refer
/// to the same task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Unique task id. Derived from the uri when the caller does not supply
    /// one.
    pub id: String,
    /// The http or https uri to fetch.
    pub uri: String,
    /// Final path of the downloaded file.
    pub destination: PathBuf,
    /// Human readable name shown by front ends.
    pub display_name: String,
}

impl DownloadRequest {
    /// Starts building a request.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }
}

/// Builder for [`DownloadRequest`].
pub struct RequestBuilder {
    id: Option<String>,
    uri: String,
    destination: PathBuf,
    display_name: Option<String>,
}

impl RequestBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            id: None,
            uri: String::new(),
            destination: PathBuf::new(),
            display_name: None,
        }
    }

    /// Sets an explicit task id. When absent, the id is derived from the
    /// uri, so re-adding the same uri addresses the same task.
    pub fn id(&mut self, id: &str) -> &mut Self {
        self.id = Some(id.to_string());
        self
    }

    /// Sets the uri to fetch.
    pub fn uri(&mut self, uri: &str) -> &mut Self {
        self.uri = uri.to_string();
        self
    }

    /// Sets the final path of the downloaded file.
    pub fn destination(&mut self, destination: impl AsRef<Path>) -> &mut Self {
        self.destination = destination.as_ref().to_path_buf();
        self
    }

    /// Sets the name shown by front ends. Defaults to the destination file
    /// name.
    pub fn display_name(&mut self, display_name: &str) -> &mut Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    /// Validates the collected fields and produces the request.
    pub fn build(&mut self) -> Result<DownloadRequest, DownloadError> {
        let url = Url::parse(&self.uri)
            .map_err(|e| DownloadError::InvalidRequest(format!("uri: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidRequest(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(DownloadError::InvalidRequest(
                "destination path is empty".to_string(),
            ));
        }
        let file_name = match self.destination.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                return Err(DownloadError::InvalidRequest(format!(
                    "destination {} has no file name",
                    self.destination.display()
                )))
            }
        };
        // The staging suffix is reserved for partial content.
        if file_name.ends_with(TEMP_SUFFIX) {
            return Err(DownloadError::InvalidRequest(format!(
                "destination {} ends with the reserved suffix {}",
                self.destination.display(),
                TEMP_SUFFIX
            )));
        }

        let id = match self.id.as_deref() {
            Some("") => {
                return Err(DownloadError::InvalidRequest(
                    "task id is empty".to_string(),
                ))
            }
            Some(id) => id.to_string(),
            None => format!("{:x}", md5::compute(self.uri.as_bytes())),
        };

        Ok(DownloadRequest {
            id,
            uri: self.uri.clone(),
            destination: self.destination.clone(),
            display_name: self.display_name.clone().unwrap_or(file_name),
        })
    }
}
