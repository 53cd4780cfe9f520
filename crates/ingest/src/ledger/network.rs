//! 네트워크 원장 백엔드 -- `GET/PUT {ledgerURL}/{ledgerID}`

use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use tracing::{debug, warn};
use uuid::Uuid;

use eventbridge_core::metrics as m;

use super::ProcessedLogs;
use crate::error::IngestError;

/// 재시도 간격 단위 (시도 횟수에 비례)
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// 원장 URL의 마지막 경로 세그먼트를 원장 ID로 해석합니다.
pub fn ledger_id_from_url(url: &str) -> Option<Uuid> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    Uuid::parse_str(segment).ok()
}

/// 네트워크에서 원장을 로드합니다.
///
/// 404는 아직 기록이 없는 원장으로 취급합니다.
/// 원장 ID는 URL에서 다시 해석하며, UUID가 아니면 테넌트 ID를 사용합니다.
pub(crate) async fn load(
    client: &reqwest::Client,
    url: &str,
    tenant_id: Uuid,
) -> Result<ProcessedLogs, IngestError> {
    let id = ledger_id_from_url(url).unwrap_or_else(|| {
        warn!(url, "ledger URL does not end in a UUID, using tenant id");
        tenant_id
    });
    let load_error = |reason: String| IngestError::LedgerLoad {
        ledger_id: id.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .header("content-type", "application/json")
        .send()
        .await
        .map_err(|e| load_error(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        debug!(url, "no ledger on server yet, starting empty");
        return Ok(ProcessedLogs::new(id));
    }
    if !status.is_success() {
        return Err(load_error(format!("HTTP {status}")));
    }

    let body = response.bytes().await.map_err(|e| load_error(e.to_string()))?;
    let mut ledger: ProcessedLogs =
        serde_json::from_slice(&body).map_err(|e| load_error(format!("malformed ledger: {e}")))?;
    ledger.id = id;
    Ok(ledger)
}

/// 원장을 네트워크에 저장합니다.
///
/// 2xx 응답을 받을 때까지 최대 `attempts`회 시도하며,
/// 시도 사이에 `200ms × 시도 횟수`만큼 대기합니다.
pub(crate) async fn save(
    client: &reqwest::Client,
    url: &str,
    ledger: &ProcessedLogs,
    attempts: u32,
) -> Result<(), IngestError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match client.put(url).json(ledger).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, attempt, entries = ledger.len(), "ledger saved to network");
                return Ok(());
            }
            Ok(response) => last_error = format!("HTTP {}", response.status()),
            Err(e) => last_error = e.to_string(),
        }

        if attempt < attempts {
            counter!(m::LEDGER_SAVE_RETRIES_TOTAL).increment(1);
            warn!(url, attempt, error = %last_error, "ledger save failed, retrying");
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }

    Err(IngestError::LedgerSave {
        ledger_id: ledger.id.to_string(),
        attempts,
        reason: last_error,
    })
}
