//! Request and Response models for the cache management API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, ScheduleRequest, WarmupRequest};
pub use responses::{
    ClearResponse, HealthResponse, InvalidateResponse, Removed, ScheduleResponse, WarmupResponse,
};
