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

use std::fmt::{Display, Formatter};

/// Lowest version advertised for every supported api.
pub const MIN_API_VERSION: u16 = 0;
/// Highest version advertised for every supported api. Versions are recorded
/// from the request header but never change how a request is handled.
pub const MAX_API_VERSION: u16 = 1;

/// Identifies the type of request carried by a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ApiKey {
    Produce = 0,
    Fetch = 1,
    Metadata = 3,
    ApiVersions = 18,
}

impl ApiKey {
    /// Advertised by ApiVersions, in this order.
    pub const SUPPORTED: [ApiKey; 4] = [
        ApiKey::Produce,
        ApiKey::Fetch,
        ApiKey::Metadata,
        ApiKey::ApiVersions,
    ];

    /// `None` for keys this broker does not serve; the router answers
    /// those with an empty payload.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(ApiKey::Produce),
            1 => Some(ApiKey::Fetch),
            3 => Some(ApiKey::Metadata),
            18 => Some(ApiKey::ApiVersions),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

impl Display for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApiKey::Produce => "Produce",
            ApiKey::Fetch => "Fetch",
            ApiKey::Metadata => "Metadata",
            ApiKey::ApiVersions => "ApiVersions",
        };
        write!(f, "{}({})", name, self.as_u16())
    }
}
