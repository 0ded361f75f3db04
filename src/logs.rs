use std::path::Path;

use serde::Serialize;

pub const DEFAULT_LINES: usize = 50;

#[derive(Debug, Serialize)]
pub struct RecentLogs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<String>,
}

pub async fn recent(path: &Path, lines: usize) -> RecentLogs {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let all = contents.lines().collect::<Vec<_>>();
            let start = all.len().saturating_sub(lines);
            RecentLogs {
                error: None,
                logs: all[start..].iter().map(|line| (*line).to_owned()).collect(),
            }
        }
        Err(error) => RecentLogs {
            error: Some(format!("{}: {error}", path.display())),
            logs: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn returns_only_the_last_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        for index in 0..10 {
            writeln!(file, "line {index}").expect("write log line");
        }

        let recent = recent(file.path(), 3).await;
        assert_eq!(recent.error, None);
        assert_eq!(recent.logs, vec!["line 7", "line 8", "line 9"]);
    }

    #[tokio::test]
    async fn missing_file_is_reported_in_band() {
        let dir = tempfile::tempdir().expect("temp dir");
        let recent = recent(&dir.path().join("absent.log"), DEFAULT_LINES).await;

        assert!(recent.error.is_some());
        assert!(recent.logs.is_empty());
    }
}
