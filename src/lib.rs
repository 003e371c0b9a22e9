//! Top-level type index for a Java code-intelligence service
//!
//! Two symbol universes are covered:
//! 1. The JDK: a fixed list of modules read from the runtime image,
//!    cached in a zip archive because the walk is slow and rarely changes
//! 2. A classpath: directories and jars given by the caller,
//!    scanned live every time
//!
//! # Basic Usage
//!
//! ```no_run
//! use jdk_type_index::{IndexConfig, IndexCoordinator};
//!
//! let coordinator = IndexCoordinator::new(IndexConfig::from_env());
//!
//! // Cache first, walks the runtime image on a miss
//! let jdk = coordinator.jdk_index();
//! assert!(jdk.contains("java.lang.String"));
//!
//! // Only what these roots contribute
//! let _project = coordinator.classpath_index(["target/classes", "lib/guava.jar"]).unwrap();
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod jdk;
pub mod cache;
pub mod classpath;
pub mod coordinator;
pub mod server;
pub mod cli;

pub use types::*;
pub use error::{CacheError, IndexError, ModuleError};
pub use config::IndexConfig;
pub use coordinator::IndexCoordinator;
pub use cli::*;
