//! Test doubles for paperflow pipelines.
//!
//! This module provides:
//! - Scripted and gated stages
//! - A scripted remote API
//! - An in-memory audio backend

mod api;
mod audio;
mod mocks;

pub use api::{ApiCall, ApiOutcome, ScriptedApi};
pub use audio::FakeAudioBackend;
pub use mocks::{GatedStage, MockStage};
