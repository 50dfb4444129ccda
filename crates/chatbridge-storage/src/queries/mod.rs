// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over a [`crate::Database`].

pub mod mappings;
pub mod operations;
