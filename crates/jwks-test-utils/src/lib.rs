//! # JWKS Test Utilities
//!
//! Shared test utilities for the JWKS service.
//!
//! This crate provides:
//! - Deterministic and instrumented key material providers
//! - Server test harness (TestJwksServer for E2E tests)
//! - Key store time manipulation (back-dating and corrupting slots)
//! - Custom assertions (JwksAssertions, TokenAssertions)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jwks_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestJwksServer::spawn(test_config(60)).await?;
//!     let jwks = server.fetch_jwks().await?;
//!     jwks.assert_key_count(1);
//!
//!     expire_slot(server.store(), KeySlot::Current, 60).await?;
//!     server.fetch_jwks().await?.assert_key_count(2);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod rotation_time;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use jwks_service::models::KeySlot;
pub use rotation_time::*;
pub use server_harness::*;
