//! Common constants used throughout docpipe.

/// Supported configuration file names, tried in order
pub const CONFIG_FILES: [&str; 3] = ["docpipe.json", "docpipe.yml", "docpipe.yaml"];

/// Extension given to targets derived from the source file name
pub const DEFAULT_DATA_EXTENSION: &str = "yml";

/// Extensions recognised as structured data files in the store
pub const DATA_EXTENSIONS: [&str; 3] = ["yml", "yaml", "json"];

/// Template suffix stripped when deriving a filled document's name
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// Environment variable selecting the deployment mode
pub const ENVIRONMENT_VAR: &str = "DOCPIPE_ENV";

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_PREVIEW_PORT: u16 = 8000;

/// Key prefix for tables that appear before the first section
pub const ADDITIONAL_TABLE_PREFIX: &str = "additional_table";
