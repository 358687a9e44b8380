use serde_json::Value;

use crate::client::BaseClient;
use crate::outcome::{resolve, BodyKind};
use crate::request::RequestType;

/// Retrieves the staging states of the session's datasets.
pub async fn staging_status(client: &BaseClient) -> Result<Value, String> {
    let outcome = resolve(
        client.token(),
        BodyKind::Json,
        "GET /transfer/status",
        || client.get("transfer/status", None, RequestType::Plain),
    )
    .await;

    if outcome.error {
        return Err(format!(
            "retrieving the staging status failed: {}",
            outcome.failure_detail()
        ));
    }

    outcome
        .content
        .into_json()
        .ok_or_else(|| "staging status returned no JSON body".to_string())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use crate::token::TokenCell;

    use super::*;

    #[tokio::test]
    async fn test_staging_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/transfer/status");
            then.status(200)
                .body("[{\"filename\":\"data.bin\",\"task_state\":\"SUCCESS\"}]");
        });

        let client =
            BaseClient::new(&server.base_url(), None, TokenCell::fixed("t")).unwrap();

        let status = staging_status(&client).await.expect("Failed to get status");

        assert_eq!(status[0]["task_state"], "SUCCESS");
        mock.assert();
    }
}
