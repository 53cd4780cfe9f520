//! 웹훅 전달 -- 레코드 한 건을 JSON으로 POST

use serde::Serialize;
use tracing::debug;

use crate::error::IngestError;

/// 레코드를 웹훅으로 전달합니다. 2xx가 아닌 응답은 에러입니다.
pub async fn deliver<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    record: &T,
) -> Result<(), IngestError> {
    let response = client
        .post(url)
        .json(record)
        .send()
        .await
        .map_err(|source| IngestError::Delivery {
            url: url.to_owned(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::DeliveryStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    debug!(url, status = status.as_u16(), "event delivered");
    Ok(())
}
