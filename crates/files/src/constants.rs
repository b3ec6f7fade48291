/// Folder under the upload root holding content-addressed files.
pub const HASH_FOLDER_NAME: &str = "sha256";

/// URL prefix under which the upload root is served.
pub const PUBLIC_PREFIX: &str = "/Images";
