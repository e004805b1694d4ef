mod loader;
mod types;

pub use loader::{
    default_cert_dir, env_lookup, load_config, load_config_from, pairing_identity_dir,
    resolve_cert_dir,
};
pub use types::*;
