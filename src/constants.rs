//! File names and reserved tokens shared across cpkg.

/// Declarative recipe file name.
pub const RECIPE_FILE: &str = "cpkg.toml";

/// Default lock file name.
pub const LOCKFILE_NAME: &str = "cpkg.lock";

/// Install-folder record of the root reference used by the local flow.
pub const GRAPH_INFO_FILE: &str = "graph_info.toml";

/// Directory, inside a recipe folder of a directory index, holding binaries.
pub const PACKAGES_DIR: &str = "packages";

/// Profile pattern matching only the consumer root.
pub const CONSUMER_PATTERN: &str = "&";

/// Profile pattern matching every node except the consumer root.
pub const NON_CONSUMER_PATTERN: &str = "&!";

/// Placeholder for an absent user/channel in index paths.
pub const NO_USER_CHANNEL: &str = "_";

/// Lock file format version understood by this build.
pub const LOCKFILE_VERSION: u32 = 1;
