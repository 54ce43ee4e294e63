use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration loaded from the environment (plus a local `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,

    /// Base URL of the book-metadata service; when unset the add-book wizard
    /// falls back to the manual title/author flow.
    pub metadata_base_url: Option<String>,
    pub metadata_timeout: Duration,

    /// Inline keyboard labels longer than this are truncated.
    pub button_label_max_length: usize,

    /// Fixed UTC offset (hours) applied to wizard-entered deadlines.
    pub deadline_utc_offset_hours: i32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let metadata_base_url = env_str("METADATA_BASE_URL").and_then(non_empty);
        let metadata_timeout =
            Duration::from_millis(env_u64("METADATA_TIMEOUT_MS").unwrap_or(10_000));

        let button_label_max_length = env_usize("BUTTON_LABEL_MAX_LENGTH").unwrap_or(30);

        let deadline_utc_offset_hours = env_i32("DEADLINE_UTC_OFFSET")
            .unwrap_or(0)
            .clamp(-12, 14);

        Ok(Self {
            bot_token,
            metadata_base_url,
            metadata_timeout,
            button_label_max_length,
            deadline_utc_offset_hours,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_i32(key: &str) -> Option<i32> {
    env_str(key).and_then(|s| s.trim().parse::<i32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_skips_comments_and_respects_existing_env() {
        let root = std::path::PathBuf::from(format!("/tmp/bcb-env-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let file = root.join(".env");
        std::fs::write(
            &file,
            "# comment\nBCB_TEST_A=one\nBCB_TEST_B='two'\nBCB_TEST_EXISTING=from_file\n",
        )
        .unwrap();

        env::set_var("BCB_TEST_EXISTING", "from_env");
        load_dotenv_if_present(&file);

        assert_eq!(env::var("BCB_TEST_A").unwrap(), "one");
        assert_eq!(env::var("BCB_TEST_B").unwrap(), "two");
        assert_eq!(env::var("BCB_TEST_EXISTING").unwrap(), "from_env");

        let _ = std::fs::remove_dir_all(&root);
    }
}
