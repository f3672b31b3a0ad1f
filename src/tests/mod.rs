//! Integration and unit tests for the blog backend.
//!
//! ## Test Modules
//!
//! - **support**: shared app/database setup and request helpers
//! - **tag_api_tests**: `/api/v1/tag` endpoints
//! - **article_api_tests**: `/api/v1/article` endpoints and tag associations
//! - **user_api_tests**: `/api/v1/user` endpoint
//! - **upload_api_tests**: file upload and static serving
//! - **health_api_tests**: health, metrics and version endpoints
//! - **error_tests**: error mapping and response bodies
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema migration and constraints
//! - **data_tests**: the persistence client and its release
//! - **cache_tests**: cache backends
//! - **logging_tests**: log file layout
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test tag_api_tests
//! ```

pub mod support;

pub mod article_api_tests;
pub mod tag_api_tests;
