// Copyright (c) 2026 Truthcrawl
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Core protocol: canonical formats, crypto, commitments, stores, verifiers.

pub mod audit;
pub mod batch;
pub mod bundle;
pub mod codec;
pub mod crypto;
pub mod dispute;
pub mod keys;
pub mod merkle;
pub mod profile;
pub mod publish;
pub mod record;
pub mod reputation;
pub mod store;
pub mod timestamp;
