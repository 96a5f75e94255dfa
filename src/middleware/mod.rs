// SPDX-License-Identifier: MIT

//! Middleware for authentication and security headers.

pub mod auth;
pub mod security;
