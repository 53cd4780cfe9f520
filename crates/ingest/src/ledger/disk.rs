//! 디스크 원장 백엔드 -- `{dir}/{tenant}processed.yaml`

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use super::ProcessedLogs;
use crate::error::IngestError;

/// 테넌트 원장 파일 경로
pub fn ledger_path(dir: &Path, tenant_id: Uuid) -> PathBuf {
    dir.join(format!("{tenant_id}processed.yaml"))
}

/// 디스크에서 원장을 로드합니다. 파일이 없으면 빈 원장을 반환합니다.
pub(crate) async fn load(dir: &Path, tenant_id: Uuid) -> Result<ProcessedLogs, IngestError> {
    let path = ledger_path(dir, tenant_id);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no ledger on disk yet, starting empty");
            return Ok(ProcessedLogs::new(tenant_id));
        }
        Err(e) => {
            return Err(IngestError::LedgerLoad {
                ledger_id: tenant_id.to_string(),
                reason: format!("{}: {e}", path.display()),
            });
        }
    };

    let mut ledger: ProcessedLogs =
        serde_yaml::from_str(&content).map_err(|e| IngestError::LedgerLoad {
            ledger_id: tenant_id.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
    ledger.id = tenant_id;
    Ok(ledger)
}

/// 원장을 디스크에 저장합니다.
///
/// 임시 파일에 쓴 뒤 rename하여 부분 기록된 파일이 남지 않게 합니다.
pub(crate) async fn save(
    dir: &Path,
    tenant_id: Uuid,
    ledger: &ProcessedLogs,
) -> Result<(), IngestError> {
    tokio::fs::create_dir_all(dir).await?;

    let path = ledger_path(dir, tenant_id);
    let tmp = path.with_extension("yaml.tmp");
    let content = serde_yaml::to_string(ledger)?;

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, &path).await?;

    debug!(path = %path.display(), entries = ledger.len(), "ledger saved to disk");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ProcessedLogItem;
    use chrono::Utc;

    #[tokio::test]
    async fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Uuid::new_v4();
        let ledger = load(dir.path(), tenant).await.unwrap();
        assert_eq!(ledger.id, tenant);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn record_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Uuid::new_v4();
        let mut ledger = load(dir.path(), tenant).await.unwrap();
        ledger.insert(ProcessedLogItem {
            date: Utc::now(),
            bucket: "logs".to_owned(),
            name: "2024-06-02-01-28-20-ABC".to_owned(),
            file_name: "/tmp/x".to_owned(),
            pruned: true,
        });
        save(dir.path(), tenant, &ledger).await.unwrap();

        assert!(ledger_path(dir.path(), tenant).exists());
        let reloaded = load(dir.path(), tenant).await.unwrap();
        assert!(reloaded.is_processed("logs", "2024-06-02-01-28-20-ABC"));
        assert_eq!(reloaded, ledger);
    }

    #[tokio::test]
    async fn corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Uuid::new_v4();
        std::fs::write(ledger_path(dir.path(), tenant), "processedItems: [unterminated").unwrap();

        let err = load(dir.path(), tenant).await.unwrap_err();
        assert!(matches!(err, IngestError::LedgerLoad { .. }));
    }

    #[test]
    fn file_name_is_tenant_id_plus_suffix() {
        let tenant = Uuid::nil();
        let path = ledger_path(Path::new("/var/lib/eventbridge/ledger"), tenant);
        assert_eq!(
            path,
            PathBuf::from(
                "/var/lib/eventbridge/ledger/00000000-0000-0000-0000-000000000000processed.yaml"
            )
        );
    }
}
