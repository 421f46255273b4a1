//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate gateway calls into setup and timetable use cases.
//! - Own the in-memory state published to the presentation layer.

pub mod attendance_policy;
pub mod repository;
pub mod setup_service;
pub mod timetable_engine;
