//! Default configuration values

/// Repository manifest file name
pub const MANIFEST_FILE: &str = "monobuild.toml";

/// Per-project package manifest file name
pub const PACKAGE_FILE: &str = "package.json";

/// Repository-wide build cache configuration, relative to the repo root
pub const CACHE_CONFIG_FILE: &str = "common/config/build-cache.json";

/// Per-project build cache override, relative to the project folder
pub const PROJECT_CACHE_CONFIG_FILE: &str = "config/build-cache.json";

/// Scratch directory for generated state, relative to the repo root
pub const TEMP_DIR: &str = "common/temp";

/// Link map file name inside [`TEMP_DIR`]
pub const LINK_MAP_FILE: &str = "link-map.json";

/// Local cache folder name inside [`TEMP_DIR`]
pub const BUILD_CACHE_DIR: &str = "build-cache";

/// Default build command run inside each project folder
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";

/// Default output folders archived into the cache
pub const DEFAULT_OUTPUT_FOLDERS: &[&str] = &["dist", "lib"];

/// Folders never hashed as project inputs
pub const IGNORED_INPUT_FOLDERS: &[&str] = &["node_modules", ".git"];

/// Seconds in-flight builds get to finish after cancellation
pub const DEFAULT_CANCEL_TIMEOUT_SECS: u64 = 30;

/// Total time budget for retrying a single remote cache request (in seconds)
pub const CACHE_RETRY_BUDGET_SECS: u64 = 30;
