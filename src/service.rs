//! Data-access façade over the crime API.

use async_trait::async_trait;
use reqwest::{multipart, StatusCode};

use crate::client::{ApiClient, ApiError};
use crate::models::{AggregationRecord, CsvUpload, Envelope, HealthStatus, Receipt, StatsSummary};

/// Operations the dashboard needs from the backend.
///
/// Implemented over HTTP by [`CrimeService`]; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait CrimeApi: Send + Sync {
    /// Sends a CSV file for ingestion. The server reprocesses aggregations
    /// asynchronously after accepting it.
    async fn upload_csv(&self, upload: CsvUpload) -> Result<Receipt, ApiError>;

    /// Fetches every neighborhood aggregation. A response without `data`
    /// yields an empty list.
    async fn get_aggregations(&self) -> Result<Vec<AggregationRecord>, ApiError>;

    /// Fetches one neighborhood by name.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the server answers 404 or sends
    /// no `data`.
    async fn get_aggregation_by_bairro(&self, bairro: &str) -> Result<AggregationRecord, ApiError>;

    /// Fetches dataset-wide totals. A response without `data` yields `None`.
    async fn get_stats(&self) -> Result<Option<StatsSummary>, ApiError>;

    /// Deletes all aggregated data on the server.
    async fn clear_data(&self) -> Result<Receipt, ApiError>;

    /// Probes the backend health route.
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

/// [`CrimeApi`] backed by the REST endpoints under `/crimes`.
#[derive(Debug, Clone)]
pub struct CrimeService {
    client: ApiClient,
}

impl CrimeService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl CrimeApi for CrimeService {
    async fn upload_csv(&self, upload: CsvUpload) -> Result<Receipt, ApiError> {
        log::info!("Uploading {} ({} bytes)", upload.file_name, upload.bytes.len());
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);
        self.client.post_multipart(&["crimes", "upload"], form).await
    }

    async fn get_aggregations(&self) -> Result<Vec<AggregationRecord>, ApiError> {
        let envelope: Envelope<Vec<AggregationRecord>> =
            self.client.get_json(&["crimes", "aggregations"]).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn get_aggregation_by_bairro(&self, bairro: &str) -> Result<AggregationRecord, ApiError> {
        let result: Result<Envelope<AggregationRecord>, ApiError> =
            self.client.get_json(&["crimes", "aggregations", bairro]).await;
        match result {
            Ok(Envelope { data: Some(record) }) => Ok(record),
            Ok(Envelope { data: None }) => Err(ApiError::NotFound {
                bairro: bairro.to_string(),
            }),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Err(ApiError::NotFound {
                bairro: bairro.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn get_stats(&self) -> Result<Option<StatsSummary>, ApiError> {
        let envelope: Envelope<StatsSummary> = self.client.get_json(&["crimes", "stats"]).await?;
        Ok(envelope.data)
    }

    async fn clear_data(&self) -> Result<Receipt, ApiError> {
        log::info!("Clearing all aggregated data");
        self.client.delete_json(&["crimes", "clear"]).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.client.get_json(&["health"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serves exactly one request with a canned JSON response. The join
    /// handle yields the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (CrimeService, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        let client = ApiClient::new(&format!("http://{addr}/api"), None).unwrap();
        (CrimeService::new(client), server)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let head = text[..head_end].to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let done = match content_length {
                Some(len) => buf.len() >= head_end + 4 + len,
                None if head.contains("transfer-encoding: chunked") => text.ends_with("0\r\n\r\n"),
                None => true,
            };
            if done {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_aggregations_without_data_is_empty() {
        let (service, server) = serve_once("200 OK", r#"{"success": true}"#).await;
        let records = service.get_aggregations().await.unwrap();
        assert!(records.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/crimes/aggregations HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_aggregations_with_string_counts() {
        let (service, _server) = serve_once(
            "200 OK",
            r#"{"data": [{"bairro": "Centro", "total_crimes": "41"}, {"bairro": "Pina", "total_crimes": "?"}]}"#,
        )
        .await;
        let records = service.get_aggregations().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].total_crimes, 41);
        assert_eq!(records[1].total_crimes, 0);
    }

    #[tokio::test]
    async fn test_stats_without_data_is_none() {
        let (service, server) = serve_once("200 OK", r#"{"success": true}"#).await;
        assert_eq!(service.get_stats().await.unwrap(), None);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/crimes/stats HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_lookup_encodes_name() {
        let (service, server) = serve_once(
            "200 OK",
            r#"{"data": {"bairro": "Boa Viagem", "total_crimes": 1500, "prejuizo_total": 99.5}}"#,
        )
        .await;
        let record = service.get_aggregation_by_bairro("Boa Viagem").await.unwrap();
        assert_eq!(record.total_crimes, 1500);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/crimes/aggregations/Boa%20Viagem HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_lookup_404_is_not_found() {
        let (service, _server) = serve_once("404 Not Found", r#"{"mensagem": "Bairro não encontrado"}"#).await;
        let err = service.get_aggregation_by_bairro("Atlantis").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { ref bairro } if bairro == "Atlantis"));
    }

    #[tokio::test]
    async fn test_lookup_without_data_is_not_found() {
        let (service, _server) = serve_once("200 OK", "{}").await;
        let err = service.get_aggregation_by_bairro("Atlantis").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_body() {
        let (service, _server) = serve_once(
            "500 Internal Server Error",
            r#"{"mensagem": "Erro ao calcular estatísticas"}"#,
        )
        .await;
        match service.get_stats().await {
            Err(ApiError::Http { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.contains("Erro ao calcular"));
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_csv_file_field() {
        let (service, server) = serve_once(
            "200 OK",
            r#"{"success": true, "mensagem": "Arquivo recebido", "rows_processed": 2}"#,
        )
        .await;
        let upload = CsvUpload {
            file_name: "dados.csv".to_string(),
            bytes: b"bairro,prejuizo\nPina,10\nCentro,20\n".to_vec(),
        };
        let receipt = service.upload_csv(upload).await.unwrap();
        assert_eq!(receipt.rows_processed, Some(2));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/crimes/upload HTTP/1.1"));
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert!(lower.contains(r#"name="file"; filename="dados.csv""#));
        assert!(lower.contains("content-type: text/csv"));
        assert!(request.contains("Pina,10\nCentro,20"));
    }
}
