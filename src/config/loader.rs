//! Configuration loading with layered precedence.
//!
//! Precedence (lowest to highest): application defaults, configuration file,
//! environment variables.
//!
//! Layers are composed manually with `MergeComposer` rather than through the
//! derived `load()` because the derived environment layer silently ignores
//! unparseable values. This loader fails fast instead: a typed variable such
//! as `MYSQL_FIXTURE_READINESS_JITTER=maybe` is an error, not a silent
//! fallback to the default.
//!
//! Environment access goes through `mockable::Env` so the table below can be
//! exercised without mutating the process environment.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::FixtureConfig;
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`). Invalid values return an error.
    Bool,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name.
    env_var: &'static str,
    /// The JSON path segments (e.g., `["readiness", "jitter"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_IMAGE",
        path: &["image"],
        var_type: EnvVarType::String,
    },
    // Database fields
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_DATABASE_NAME",
        path: &["database", "name"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_DATABASE_ROOT_PASSWORD",
        path: &["database", "root_password"],
        var_type: EnvVarType::String,
    },
    // Readiness fields
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_READINESS_MAX_ELAPSED_SECS",
        path: &["readiness", "max_elapsed_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_READINESS_INITIAL_INTERVAL_MS",
        path: &["readiness", "initial_interval_ms"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_READINESS_MAX_INTERVAL_MS",
        path: &["readiness", "max_interval_ms"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_READINESS_JITTER",
        path: &["readiness", "jitter"],
        var_type: EnvVarType::Bool,
    },
    // Teardown fields
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_TEARDOWN_STOP_TIMEOUT_SECS",
        path: &["teardown", "stop_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "MYSQL_FIXTURE_TEARDOWN_CAPTURE_ERROR_LOG",
        path: &["teardown", "capture_error_log"],
        var_type: EnvVarType::Bool,
    },
];

/// Returns the environment variable names recognised by the loader.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir.read_to_string(file_name).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.as_std_path().to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                message: format!("failed to read {path}: {e}"),
            }
        }
    })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Discover a configuration file through the standard search paths.
fn discover_config_file() -> Option<Utf8PathBuf> {
    let discovery = ConfigDiscovery::builder("mysql-fixture")
        .env_var("MYSQL_FIXTURE_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".mysql-fixture.toml")
        .build();
    discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok())
}

/// Load configuration with full layer precedence.
///
/// An explicit `config_path` must exist; without one the standard search
/// paths are tried and a missing file is not an error. The merged result is
/// validated with [`FixtureConfig::validate`].
///
/// # Errors
///
/// Returns `ConfigError` if an explicit file is missing, a file is
/// malformed, a typed environment variable cannot be parsed, or the merged
/// configuration fails validation.
pub fn load_config<E: mockable::Env>(
    env: &E,
    config_path: Option<&Utf8Path>,
) -> Result<FixtureConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(FixtureConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let file = config_path
        .map(Utf8Path::to_path_buf)
        .or_else(discover_config_file);
    if let Some(ref path) = file {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let config =
        FixtureConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.validate()?;

    Ok(config)
}

/// Load configuration from the process environment and discovered files.
///
/// # Errors
///
/// Returns the same errors as [`load_config`].
pub fn load_config_from_env() -> Result<FixtureConfig> {
    load_config(&mockable::DefaultEnv::new(), None)
}

/// Collect recognised environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable has an
/// unparseable value.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::Bool => match raw_value.parse::<bool>() {
                Ok(b) => Value::Bool(b),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected bool (true/false), got '{raw_value}'"),
                    }
                    .into());
                }
            },
            EnvVarType::U64 => match raw_value.parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}
