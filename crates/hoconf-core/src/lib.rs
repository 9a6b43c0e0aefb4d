//! hoconf-core: HOCON configuration with a lazy substitution resolver
//!
//! This crate parses HOCON (a JSON superset with unquoted keys, comments,
//! path expressions, object merging, and `${...}` substitutions) and
//! resolves substitutions lazily, with memoization, cycle detection, and
//! optional-reference dropping.
//!
//! # Example
//!
//! ```rust
//! use hoconf_core::{Config, ResolveOptions};
//!
//! let text = r#"
//! db { host = "localhost", port = 5432 }
//! url = "postgres://"${db.host}":"${db.port}
//! "#;
//!
//! let config = Config::parse_str(text).unwrap();
//! let resolved = config.resolve(ResolveOptions::new()).unwrap();
//! assert_eq!(
//!     resolved.get("url").unwrap().as_str(),
//!     Some("postgres://localhost:5432")
//! );
//! ```

pub mod error;
pub mod origin;
pub mod path;
pub mod resolve;
pub mod subst;
pub mod value;

mod config;
mod parser;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use origin::Origin;
pub use path::Path;
pub use resolve::{resolve, resolve_restricted, ResolveOptions};
pub use value::{ConfigObject, ConfigValue, Number, ResolveStatus};
