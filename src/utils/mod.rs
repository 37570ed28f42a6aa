// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Utility modules
//!
//! Common utilities for the genomegenie CLI.

pub mod spinner;

pub use spinner::*;
