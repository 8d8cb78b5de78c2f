//! AquaVoice - feedback collection for water refilling stations
//!
//! This library provides the core functionality for the AquaVoice service.
//! It exposes all modules for testing purposes.

pub mod auth;
pub mod entities;
pub mod errors;
pub mod session;
pub mod settings;
pub mod storage;
pub mod web;
