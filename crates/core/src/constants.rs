/// Constants used throughout the ripple codebase
// Configuration files, searched in order inside the repository root
pub const CONFIG_FILENAMES: &[&str] = &["ripple.toml", ".ripple.toml"];
pub const DEFAULT_REGISTRY_FILENAME: &str = "project_map.json";

// Environment variable names
pub const RIPPLE_ROOT_VAR: &str = "RIPPLE_ROOT";
pub const RIPPLE_REGISTRY_VAR: &str = "RIPPLE_REGISTRY";
pub const RIPPLE_ADAPTER_VAR: &str = "RIPPLE_ADAPTER";
pub const RIPPLE_CACHE_URL_VAR: &str = "RIPPLE_CACHE_URL";
pub const RIPPLE_CACHE_TOKEN_VAR: &str = "RIPPLE_CACHE_TOKEN";
pub const RIPPLE_NO_WRITE_VAR: &str = "RIPPLE_NO_WRITE";
pub const RIPPLE_S3_ENDPOINT_VAR: &str = "RIPPLE_S3_ENDPOINT";

// Default state layout, relative to the repository root
pub const DEFAULT_STATE_DIR: &str = ".ripple";
pub const DEFAULT_CACHE_DIR: &str = ".ripple/cache";
pub const LAST_RESULTS_FILENAME: &str = "last_results.json";
pub const STATE_FILENAME: &str = "state.json";

// Cache blob names stored under each fingerprint key
pub const OUTPUTS_ARCHIVE_NAME: &str = "outputs.tar.gz";
pub const MANIFEST_NAME: &str = "manifest.json";
/// Prefix of the scratch directories archives are unpacked into
pub const UNPACK_DIR_PREFIX: &str = ".ripple-unpack-";

// Defaults
pub const DEFAULT_BASE_REF: &str = "origin/main";
pub const DEFAULT_TEST_COMMAND: &str = "python -m pytest {tests}";
pub const DEFAULT_SHELL: &str = "sh";

// Maximum characters kept from the last output line of a command
pub const LAST_LINE_MAX_CHARS: usize = 60;
