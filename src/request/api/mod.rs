// Copyright 2025 jonefeewang@gmail.com
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

mod api_version;
mod fetch;
mod handler;
mod metadata;
mod produce;

// request and response
pub use api_version::{ApiVersionRange, ApiVersionRequest, ApiVersionResponse};
pub use fetch::{FetchRequest, FetchResponse};
pub use metadata::{MetadataRequest, MetadataResponse};
pub use produce::{ProduceRequest, ProduceResponse, ProduceResult};

// api handler
pub use api_version::ApiVersionRequestHandler;
pub use fetch::FetchRequestHandler;
pub use handler::ApiHandler;
pub use metadata::MetadataRequestHandler;
pub use produce::ProduceRequestHandler;
