// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP request and response bodies

use abacus_adapters::StoreStats;
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "Distributed Abacus Microservice";

/// Body of `POST /abacus/number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberInput {
    /// Number to add to the running sum
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    pub new_sum: i64,
    pub added: i64,
    pub timestamp: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumResponse {
    pub sum: i64,
    pub timestamp: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub timestamp: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub node_id: String,
    /// Field name kept from the first release of the health endpoint
    #[serde(rename = "redis_connected")]
    pub store_connected: bool,
    /// -1 when the store is unreachable
    pub current_sum: i64,
    pub stats: StoreStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub node_id: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        }
    }
}

/// Endpoints listed by `GET /`
pub fn endpoints() -> Vec<EndpointInfo> {
    vec![
        EndpointInfo::new("POST", "/abacus/number", "Add a number to the sum"),
        EndpointInfo::new("GET", "/abacus/sum", "Get current sum"),
        EndpointInfo::new("DELETE", "/abacus/sum", "Reset sum to 0"),
        EndpointInfo::new("GET", "/health", "Health check"),
    ]
}

/// Error body for failed requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

/// Current time as RFC 3339 UTC
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
