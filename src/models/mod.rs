// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod song;

pub use activity::{Activity, ActivityWithSongs};
pub use credential::{Credential, Provider};
pub use song::Song;
