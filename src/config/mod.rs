//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! with_* constructors / config file (TOML)
//!     → options.rs (ordered ServerOption list, last one wins)
//!     → settings.rs (defaults filled in)
//!     → validation.rs (host:port resolves as a TCP address)
//!     → Settings (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Options are closures over a private record; each sets one field
//! - A failing option aborts the whole build, nothing is kept
//! - The file schema produces the same options the programmatic API does

pub mod loader;
pub mod options;
pub mod schema;
pub mod settings;
pub mod validation;

pub use options::{
    with_host, with_idle_timeout, with_max_header_bytes, with_port, with_read_timeout,
    with_write_timeout, Options, ServerOption,
};
pub use schema::AppConfig;
pub use settings::Settings;
