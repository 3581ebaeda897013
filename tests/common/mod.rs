//! Common test utilities for covercat.
//!
//! This module provides shared utilities for the integration tests: catalog
//! fixtures on disk, an HTTP client and float assertions.

pub mod assertions;
pub mod http_client;
pub mod test_data;
