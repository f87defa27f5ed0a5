use super::ConfigError;
use semver::{Version, VersionReq};
use serde_json::{Value, json};

/// A settings migration keyed by a semantic-version range.
///
/// A migration runs when the running application version satisfies `range`
/// and the version that last wrote the file does not. An unversioned file is
/// treated as `0.0.0`.
#[derive(Debug, Clone)]
pub struct Migration {
    pub range: &'static str,
    pub description: &'static str,
    pub apply: fn(&mut Value) -> Result<(), String>,
}

/// Migrations shipped with the application, in the order they must run.
pub fn builtin() -> Vec<Migration> {
    vec![
        Migration {
            range: ">=2.0.0",
            description: "zoom factor stored as percent",
            apply: zoom_factor_to_percent,
        },
        Migration {
            range: ">=2.1.0",
            description: "Last.fm session key moved to credentials",
            apply: move_last_fm_session_key,
        },
    ]
}

/// Apply every pending migration to `document` in order.
///
/// Returns the number of migrations applied.
pub fn run(
    document: &mut Value,
    stored: Option<&Version>,
    current: &Version,
    migrations: &[Migration],
) -> Result<usize, ConfigError> {
    let baseline = Version::new(0, 0, 0);
    let stored = stored.unwrap_or(&baseline);
    let mut applied = 0;

    for migration in migrations {
        let range = VersionReq::parse(migration.range).map_err(|e| ConfigError::Migration {
            range: migration.range.to_string(),
            message: format!("invalid range: {}", e),
        })?;

        if !range.matches(current) || range.matches(stored) {
            continue;
        }

        tracing::info!(
            "Running config migration {} ({})",
            migration.range,
            migration.description
        );
        (migration.apply)(document).map_err(|message| ConfigError::Migration {
            range: migration.range.to_string(),
            message,
        })?;
        applied += 1;
    }

    Ok(applied)
}

fn root_object(document: &mut Value) -> Result<&mut serde_json::Map<String, Value>, String> {
    document
        .as_object_mut()
        .ok_or_else(|| "config root is not a mapping".to_string())
}

fn zoom_factor_to_percent(document: &mut Value) -> Result<(), String> {
    let root = root_object(document)?;
    let Some(zoom) = root.get_mut("appearance").and_then(|a| a.get_mut("zoom")) else {
        return Ok(());
    };

    match zoom.as_f64() {
        Some(factor) if factor > 0.0 && factor <= 5.0 => {
            *zoom = json!((factor * 100.0).round() as u64);
            Ok(())
        }
        Some(_) => Ok(()),
        None if zoom.is_null() => Ok(()),
        None => Err(format!("appearance.zoom has unexpected value {}", zoom)),
    }
}

fn move_last_fm_session_key(document: &mut Value) -> Result<(), String> {
    let root = root_object(document)?;
    let legacy = root
        .get_mut("integrations")
        .and_then(Value::as_object_mut)
        .and_then(|integrations| integrations.remove("lastFMSessionKey"));

    let Some(key) = legacy.filter(|k| !k.is_null()) else {
        return Ok(());
    };

    let credentials = root
        .entry("credentials")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| "credentials is not a mapping".to_string())?;

    if credentials.get("lastFMSessionKey").is_none_or(Value::is_null) {
        credentials.insert("lastFMSessionKey".to_string(), key);
    }
    Ok(())
}
