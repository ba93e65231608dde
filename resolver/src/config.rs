//! Resolver configuration
//!
//! Configuration is loaded from environment variables; command-line flags
//! override individual values. Nothing here is process-global: the loaded
//! `Config` is passed explicitly to every component that needs it.

use std::env;
use std::path::PathBuf;

use crate::resolve::ResolverConfig;
use crate::table::CoordinateColumns;

/// Main configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (serve mode)
    pub host: String,
    /// HTTP port (serve mode)
    pub port: u16,

    /// Atlas source configuration
    pub atlas: AtlasConfig,

    /// Output table configuration
    pub output: OutputConfig,

    /// Input column names
    pub columns: CoordinateColumns,

    /// Coordinate scaling and lookup settings
    pub resolver: ResolverConfig,
}

/// Atlas-related configuration
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Directory holding installed atlases
    pub atlas_dir: PathBuf,
    /// Maximum number of atlas volumes kept in memory
    pub max_cached_atlases: usize,
}

/// Output-related configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory the dated result table is written to
    pub output_dir: PathBuf,
    /// File name prefix, followed by `_YYYYMMDD.csv`
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            atlas: AtlasConfig::default(),
            output: OutputConfig::default(),
            columns: CoordinateColumns::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        let atlas_dir = env::var("HOME")
            .map(|home| PathBuf::from(home).join(".brainglobe"))
            .unwrap_or_else(|_| PathBuf::from(".brainglobe"));
        Self {
            atlas_dir,
            max_cached_atlases: 4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prefix: "ccf_subdivisions".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Atlas config
        if let Ok(dir) = env::var("ATLAS_DIR")
            && !dir.is_empty()
        {
            config.atlas.atlas_dir = PathBuf::from(dir);
        }
        if let Ok(val) = env::var("MAX_CACHED_ATLASES")
            && let Ok(v) = val.parse()
        {
            config.atlas.max_cached_atlases = v;
        }

        // Output config
        if let Ok(dir) = env::var("OUTPUT_DIR")
            && !dir.is_empty()
        {
            config.output.output_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = env::var("OUTPUT_PREFIX")
            && !prefix.is_empty()
        {
            config.output.prefix = prefix;
        }

        // Resolver config
        if let Ok(val) = env::var("ROUNDING_MODE")
            && let Ok(mode) = val.parse()
        {
            config.resolver.rounding = mode;
        }
        if let Ok(val) = env::var("SOURCE_RESOLUTION_UM")
            && let Ok(um) = val.parse()
        {
            config.resolver.source_resolution_um = um;
        }
        if let Ok(val) = env::var("HIERARCHY_LEVEL")
            && let Ok(level) = val.parse()
        {
            config.resolver.hierarchy_level = Some(level);
        }

        config
    }
}
