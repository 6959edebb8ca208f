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

//! Failure reasons recorded on tasks.

/// Why a task last failed, kept alongside its state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Reason {
    /// No failure has been recorded.
    Default = 0,
    /// The transfer kept failing with I/O errors until its retry budget ran
    /// out.
    IoFailure = 1,
    /// The persisted record for this task could not be decoded.
    StoreCorruption = 2,
}

impl From<u8> for Reason {
    fn from(value: u8) -> Self {
        match value {
            0 => Reason::Default,
            2 => Reason::StoreCorruption,
            _ => Reason::IoFailure,
        }
    }
}

impl Reason {
    pub(crate) fn to_str(self) -> &'static str {
        match self {
            Reason::Default => "",
            Reason::IoFailure => "io error during transfer",
            Reason::StoreCorruption => "task record corrupted",
        }
    }
}
