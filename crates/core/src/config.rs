//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the
//! store and the HTTP layer. Nothing below `main` reads environment variables,
//! which keeps request handling deterministic in tests.

use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_UPLOAD_DIR_NAME, MAX_PAGE_SIZE};
use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    upload_dir: PathBuf,
    default_page_size: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// When `upload_dir` is `None`, uploads live in `<data_dir>/uploads`.
    pub fn new(
        data_dir: PathBuf,
        upload_dir: Option<PathBuf>,
        default_page_size: u32,
    ) -> ClinicResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(ClinicError::InvalidInput("data directory cannot be empty".into()));
        }
        if default_page_size == 0 || default_page_size > MAX_PAGE_SIZE {
            return Err(ClinicError::InvalidInput(format!(
                "default page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let upload_dir = upload_dir.unwrap_or_else(|| data_dir.join(DEFAULT_UPLOAD_DIR_NAME));

        Ok(Self {
            data_dir,
            upload_dir,
            default_page_size,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }
}

/// Parse the default page size from an optional string value.
///
/// `None` or blank yields [`DEFAULT_PAGE_SIZE`].
pub fn page_size_from_env_value(value: Option<String>) -> ClinicResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| ClinicError::InvalidInput(format!("invalid page size: {}", v))),
    }
}

/// Parse a byte limit (e.g. for uploads) from an optional string value.
pub fn byte_limit_from_env_value(value: Option<String>, default: usize) -> ClinicResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| ClinicError::InvalidInput(format!("invalid byte limit: {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_dir_defaults_under_data_dir() {
        let cfg = CoreConfig::new(PathBuf::from("/srv/clinic"), None, 10).unwrap();
        assert_eq!(cfg.upload_dir(), Path::new("/srv/clinic/uploads"));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = CoreConfig::new(PathBuf::from("/srv/clinic"), None, 0).unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_page_size_from_env_value() {
        assert_eq!(page_size_from_env_value(None).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size_from_env_value(Some("  ".into())).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size_from_env_value(Some("25".into())).unwrap(), 25);
        assert!(page_size_from_env_value(Some("lots".into())).is_err());
    }

    #[test]
    fn test_byte_limit_from_env_value() {
        assert_eq!(byte_limit_from_env_value(None, 42).unwrap(), 42);
        assert_eq!(byte_limit_from_env_value(Some("1024".into()), 42).unwrap(), 1024);
        assert!(byte_limit_from_env_value(Some("-1".into()), 42).is_err());
    }
}
