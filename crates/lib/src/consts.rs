pub const APP_NAME: &str = "stagehand";

/// Default manifest filename looked up in the working directory.
pub const MANIFEST_FILENAME: &str = "stack.toml";

/// Build root used when the manifest does not name one, relative to the manifest.
pub const DEFAULT_ROOT: &str = "build";

/// Prefix of completion marker filenames (`built_<component>`).
pub const MARKER_PREFIX: &str = "built_";

/// Fixed timestamp for reproducible builds (1980-01-01T00:00:00Z, the ZIP epoch).
pub const SOURCE_DATE_EPOCH: &str = "315532800";
