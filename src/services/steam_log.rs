//! Reading the Steam client's download log.
//!
//! `<steam dir>/logs/content_log.txt` accumulates one block per client run,
//! blocks separated by two blank lines. Entries look like:
//!
//! ```text
//! [2024-03-02 18:04:11] AppID 220 state changed : Fully Installed,Update Started,
//! [2024-03-02 18:04:11] AppID 220 update started : download 0/4096, store 0/0
//! ```
//!
//! Only the last block is read; earlier runs are of no use for tracking the
//! current state of an app.

use camino::Utf8Path;
use chrono::NaiveDateTime;

/// Download log, relative to the Steam data directory.
pub const CONTENT_LOG_FILE: &str = "logs/content_log.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lines of the most recent block in the download log.
///
/// A missing or unreadable log yields no lines.
pub fn last_content_log(steam_dir: &Utf8Path) -> Vec<String> {
    let path = steam_dir.join(CONTENT_LOG_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("Cannot read Steam content log {}: {}", path, e);
            return Vec::new();
        }
    };

    let mut block = Vec::new();
    let mut previous_blank = false;
    for line in String::from_utf8_lossy(&bytes).lines() {
        if line.trim().is_empty() {
            if previous_blank {
                block.clear();
            }
            previous_blank = true;
            continue;
        }
        previous_blank = false;
        block.push(line.to_string());
    }
    block
}

/// When the entry was written, if the line carries a timestamp.
fn entry_time(line: &str) -> Option<NaiveDateTime> {
    let stamp = line.strip_prefix('[')?.get(..19)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Entries of the last client run that mention `app_id`.
///
/// With `since`, entries written before it (or without a timestamp) are dropped.
pub fn get_app_log(
    steam_dir: &Utf8Path,
    app_id: &str,
    since: Option<NaiveDateTime>,
) -> Vec<String> {
    let needle = format!(" {app_id} ");

    last_content_log(steam_dir)
        .into_iter()
        .filter(|line| match since {
            Some(since) => entry_time(line).is_some_and(|time| time >= since),
            None => true,
        })
        .filter(|line| line.get(21..).is_some_and(|message| message.contains(&needle)))
        .collect()
}

/// The state list of each `state changed` entry for `app_id`, oldest first.
///
/// `Fully Installed,AppRunning` means the app is running; a later
/// `Fully Installed` alone means it stopped.
pub fn get_app_state_log(
    steam_dir: &Utf8Path,
    app_id: &str,
    since: Option<NaiveDateTime>,
) -> Vec<String> {
    get_app_log(steam_dir, app_id, since)
        .iter()
        .filter_map(|line| line.split_once(" : "))
        .filter(|(event, _)| event.ends_with("state changed"))
        .map(|(_, states)| states.trim_end().trim_end_matches(',').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    const LOG: &str = "\
[2024-03-01 09:00:00] AppID 220 state changed : Fully Installed,\r
\r
\r
[2024-03-02 18:00:00] AppID 220 state changed : Update Required,\r
[2024-03-02 18:04:11] AppID 220 state changed : Fully Installed,AppRunning,\r
[2024-03-02 18:04:11] AppID 2200 state changed : Fully Installed,\r
[2024-03-02 18:10:00] AppID 220 update started : download 0/4096\r
\r
[2024-03-02 18:30:00] AppID 220 state changed : Fully Installed,\r
";

    fn steam_dir(log: &str) -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let steam_dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(steam_dir.join("logs")).unwrap();
        fs::write(steam_dir.join(CONTENT_LOG_FILE), log).unwrap();
        (temp_dir, steam_dir)
    }

    fn at(stamp: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_only_last_block_is_read() {
        let (_temp, dir) = steam_dir(LOG);
        let lines = last_content_log(&dir);

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("[2024-03-02 18:00:00]"));
        assert!(!lines.iter().any(|line| line.ends_with('\r')));
    }

    #[test]
    fn test_missing_log_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        assert!(last_content_log(&dir).is_empty());
        assert!(get_app_state_log(&dir, "220", None).is_empty());
    }

    #[test]
    fn test_app_log_matches_whole_app_id() {
        let (_temp, dir) = steam_dir(LOG);
        let log = get_app_log(&dir, "220", None);

        assert_eq!(log.len(), 4);
        assert!(log.iter().all(|line| !line.contains("AppID 2200")));
    }

    #[test]
    fn test_app_log_since() {
        let (_temp, dir) = steam_dir(LOG);
        let log = get_app_log(&dir, "220", Some(at("2024-03-02 18:04:11")));

        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("[2024-03-02 18:04:11]"));
    }

    #[test]
    fn test_app_state_log() {
        let (_temp, dir) = steam_dir(LOG);

        assert_eq!(
            get_app_state_log(&dir, "220", None),
            vec![
                "Update Required".to_string(),
                "Fully Installed,AppRunning".to_string(),
                "Fully Installed".to_string(),
            ]
        );
        assert_eq!(
            get_app_state_log(&dir, "220", Some(at("2024-03-02 18:20:00"))),
            vec!["Fully Installed".to_string()]
        );
    }
}
