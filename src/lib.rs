// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes-backed peer discovery
//!
//! Lists pods matching a namespace and label selector, keeps a periodically
//! refreshed membership snapshot, and serves both over HTTP so a clustering
//! protocol can bootstrap its initial peer list.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod kubernetes;
pub mod lifecycle;
pub mod membership;
