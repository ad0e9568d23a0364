//! Hard caps. Exceeding any of these is a `LimitExceeded` error, never
//! silent truncation.

use crate::model::Ms;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 256;

pub const MAX_STAFF_PER_TENANT: usize = 10_000;
pub const MAX_SERVICES_PER_TENANT: usize = 10_000;
pub const MAX_APPOINTMENTS_PER_TENANT: usize = 1_000_000;

pub const MAX_NAME_LEN: usize = 256;

/// Timestamps are unix ms; negative values are a client bug.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Default page size for the activity feed.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;
pub const MAX_ACTIVITY_LIMIT: usize = 1000;
