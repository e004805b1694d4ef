mod validator;

pub use validator::{
    MAX_LEVEL, MIN_LEVEL, validate_cert_directory, validate_cert_directory_within,
    validate_device_id, validate_device_level, validate_domain, validate_environment_variable,
    validate_host_ip, validate_level_value,
};
