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

//! Download Engine Implementation.
//!
//! This library embeds a download service into a host application. It keeps a
//! durable catalogue of download tasks, transfers their content over HTTP with
//! bounded concurrency, and publishes progress and state changes to
//! subscribers.

#![allow(
    unreachable_pub,
    clippy::new_without_default,
    unknown_lints,
    stable_features
)]
#![warn(
    missing_docs,
    clippy::redundant_static_lifetimes,
    clippy::enum_variant_names,
    clippy::clone_on_copy,
    clippy::unused_async
)]

#[macro_use]
extern crate log;

mod error;
mod manage;
mod service;
mod task;
mod utils;

pub use error::DownloadError;
pub use service::client::EventStream;
pub use service::{ConnectionState, DownloadClient, DownloadEngine, EngineBuilder};
pub use task::config::{DownloadRequest, RequestBuilder};
pub use task::info::{DownloadInfo, State};
pub use task::notify::Event;
pub use task::reason::Reason;
