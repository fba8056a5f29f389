//! HTTP client for the question-bank REST service.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use examomatic_core::model::{ExamResultRecord, Question, QuestionId, TestBank, TestBankId};
use examomatic_core::traits::{
    AnswerCheck, AnswerChecker, ImportFile, ImportReceipt, QuestionBank, ResultStore, SaveAck,
};

use crate::error::{from_reqwest, from_status, ServiceError};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Question bank, answer checker, and result store backed by the REST service.
pub struct HttpQuestionService {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpQuestionService {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and map transport failures and error statuses.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| from_reqwest(&e, &self.base_url, self.timeout_secs))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, &body));
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest(&e, &self.base_url, self.timeout_secs))?;
        serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("failed to parse response: {e}")))
    }
}

#[derive(Deserialize)]
struct TestBanksResponse {
    test_banks: Vec<TestBank>,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<Question>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Vec<ExamResultRecord>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    question_id: QuestionId,
    selected_answer: &'a str,
}

#[async_trait]
impl QuestionBank for HttpQuestionService {
    #[instrument(skip(self))]
    async fn list_test_banks(&self) -> anyhow::Result<Vec<TestBank>> {
        let response = self.send(self.client.get(self.url("/test_banks"))).await?;
        let body: TestBanksResponse = self.read_json(response).await?;
        Ok(body.test_banks)
    }

    #[instrument(skip(self))]
    async fn list_questions(
        &self,
        test_bank_id: TestBankId,
        shuffle: bool,
    ) -> anyhow::Result<Vec<Question>> {
        let url = self.url(&format!(
            "/questions?test_bank_id={test_bank_id}&shuffle={shuffle}"
        ));
        let response = self.send(self.client.get(url)).await?;
        let body: QuestionsResponse = self.read_json(response).await?;
        tracing::debug!(count = body.questions.len(), "questions loaded");
        Ok(body.questions)
    }

    #[instrument(skip(self))]
    async fn delete_test_bank(&self, test_bank_id: TestBankId) -> anyhow::Result<()> {
        let url = self.url(&format!("/test_banks/{test_bank_id}"));
        let response = self.send(self.client.delete(url)).await?;
        let body: MessageResponse = self.read_json(response).await?;
        tracing::info!(test_bank_id, message = %body.message, "test bank deleted");
        Ok(())
    }

    #[instrument(skip(self, file), fields(file_name = %file.file_name, bytes = file.contents.len()))]
    async fn import_questions(&self, file: ImportFile) -> anyhow::Result<ImportReceipt> {
        let part = reqwest::multipart::Part::bytes(file.contents)
            .file_name(file.file_name)
            .mime_str("application/json")
            .context("invalid import content type")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .send(self.client.post(self.url("/import")).multipart(form))
            .await?;
        let body: MessageResponse = self.read_json(response).await?;
        Ok(ImportReceipt {
            message: body.message,
        })
    }
}

#[async_trait]
impl AnswerChecker for HttpQuestionService {
    #[instrument(skip(self))]
    async fn check_answer(
        &self,
        question_id: QuestionId,
        selected: &str,
    ) -> anyhow::Result<AnswerCheck> {
        let request = AnswerRequest {
            question_id,
            selected_answer: selected,
        };
        let response = self
            .send(self.client.post(self.url("/answer")).json(&request))
            .await?;
        Ok(self.read_json(response).await?)
    }
}

#[async_trait]
impl ResultStore for HttpQuestionService {
    #[instrument(skip(self))]
    async fn save_result(
        &self,
        test_bank_id: TestBankId,
        score: u32,
        total_questions: u32,
    ) -> anyhow::Result<SaveAck> {
        let url = self.url(&format!(
            "/exam_results?test_bank_id={test_bank_id}&score={score}&total_questions={total_questions}"
        ));
        let response = self.send(self.client.post(url)).await?;
        Ok(self.read_json(response).await?)
    }

    #[instrument(skip(self))]
    async fn get_history(&self, test_bank_id: TestBankId) -> anyhow::Result<Vec<ExamResultRecord>> {
        let url = self.url(&format!("/exam_history/{test_bank_id}"));
        let response = self.send(self.client.get(url)).await?;
        let body: HistoryResponse = self.read_json(response).await?;
        Ok(body.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpQuestionService {
        HttpQuestionService::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn service_error(err: &anyhow::Error) -> &ServiceError {
        err.downcast_ref::<ServiceError>()
            .expect("error should be a ServiceError")
    }

    #[tokio::test]
    async fn lists_test_banks() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "test_banks": [
                {"id": 1, "name": "AWS SAA", "exam_code": "SAA-C03", "question_count": 65, "last_score": 81.5},
                {"id": 2, "name": "AZ-900", "exam_code": "AZ-900", "question_count": 40, "last_score": null}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/test_banks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let banks = service(&server).list_test_banks().await.unwrap();
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].exam_code, "SAA-C03");
        assert_eq!(banks[0].latest_score(), Some(81.5));
        assert_eq!(banks[1].latest_score(), None);
    }

    #[tokio::test]
    async fn fetches_questions_with_shuffle_flag() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "questions": [{
                "id": 11,
                "question": "Pick the EU regions [image1]",
                "options": {"A": "eu-west-1", "B": "us-east-1", "C": "eu-central-1"},
                "correct_answer": "A,C",
                "explanation": null
            }]
        });

        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("test_bank_id", "3"))
            .and(query_param("shuffle", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let questions = service(&server).list_questions(3, true).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].answer_key().unwrap().to_string(), "A,C");
        assert!(questions[0].explanation.is_none());
    }

    #[tokio::test]
    async fn missing_bank_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/questions"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"detail": "Test bank not found."})),
            )
            .mount(&server)
            .await;

        let err = service(&server).list_questions(99, false).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::NotFound(m) if m == "Test bank not found."
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/test_banks/4"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "disk full"})),
            )
            .mount(&server)
            .await;

        let err = service(&server).delete_test_bank(4).await.unwrap_err();
        match service_error(&err) {
            ServiceError::ApiError { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_body_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test_banks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = service(&server).list_test_banks().await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn checks_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/answer"))
            .and(body_json(serde_json::json!({"question_id": 11, "selected_answer": "A,C"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "correct": true,
                "correct_answer": "A,C",
                "explanation": "Both are EU regions."
            })))
            .mount(&server)
            .await;

        let check = service(&server).check_answer(11, "A,C").await.unwrap();
        assert!(check.correct);
        assert_eq!(check.explanation.as_deref(), Some("Both are EU regions."));
    }

    #[tokio::test]
    async fn saves_result_as_query_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exam_results"))
            .and(query_param("test_bank_id", "3"))
            .and(query_param("score", "7"))
            .and(query_param("total_questions", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 12,
                "message": "Result saved successfully"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ack = service(&server).save_result(3, 7, 10).await.unwrap();
        assert_eq!(ack.id, Some(12));
    }

    #[tokio::test]
    async fn reads_history() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exam_history/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "history": [
                    {"score": 9, "total_questions": 10, "timestamp": "2024-05-03T10:00:00", "percentage": 90.0},
                    {"score": 5, "total_questions": 10, "timestamp": "2024-05-01T10:00:00", "percentage": 50.0}
                ]
            })))
            .mount(&server)
            .await;

        let history = service(&server).get_history(3).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].percentage(), 90);
    }

    #[tokio::test]
    async fn uploads_import_file() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/import"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("exam.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Successfully imported questions into X (X-1)"
            })))
            .mount(&server)
            .await;

        let receipt = service(&server)
            .import_questions(ImportFile {
                file_name: "exam.json".into(),
                contents: br#"{"exam_name": "X"}"#.to_vec(),
            })
            .await
            .unwrap();
        assert!(receipt.message.contains("Successfully imported"));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let service =
            HttpQuestionService::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = service.list_test_banks().await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            ServiceError::NetworkError(_) | ServiceError::Timeout(_)
        ));
    }
}
