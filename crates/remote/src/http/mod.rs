mod wire;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};
use url::Url;

use super::error::{
    BuildClientSnafu, InvalidBaseUrlSnafu, OpaqueBaseUrlSnafu, RemoteError, RemoteResult,
};
use super::ids::{ThreadId, UserId};
use super::types::{AccountRecord, Credentials, ThreadRecord, TranscriptRecord};
use super::{AuthService, BoxFuture, RemoteStore};
use wire::{
    ChatMessage, ChatSummary, ErrorBody, NewChatRequest, NewChatResponse, RenameRequest,
    SendMessageRequest, SendMessageResponse,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_ID_HEADER: &str = "User-ID";

/// What a 404 on a given request refers to.
struct NotFoundTarget {
    entity: &'static str,
    id: String,
}

impl NotFoundTarget {
    fn thread(thread_id: &ThreadId) -> Self {
        Self {
            entity: "thread",
            id: thread_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRemoteStore {
    /// Builds a store whose requests fail with `Timeout` after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "http-store-build-client",
            })?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> RemoteResult<Self> {
        let base_url = Url::parse(base_url.trim()).context(InvalidBaseUrlSnafu {
            stage: "http-store-parse-base-url",
            raw: base_url.to_string(),
        })?;
        ensure!(
            !base_url.cannot_be_a_base(),
            OpaqueBaseUrlSnafu {
                stage: "http-store-check-base-url",
                raw: base_url.to_string(),
            }
        );

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::OpaqueBaseUrl {
                stage: "http-store-endpoint",
                raw: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, user_id: Option<&UserId>) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match user_id {
            Some(user_id) => builder.header(USER_ID_HEADER, user_id.as_str()),
            None => builder,
        }
    }

    async fn dispatch(
        stage: &'static str,
        builder: RequestBuilder,
        not_found: Option<NotFoundTarget>,
    ) -> RemoteResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| transport_error(stage, source))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::warn!(
            stage,
            status = status.as_u16(),
            error = %message,
            "remote request returned a failure status"
        );
        Err(status_error(stage, status, message, not_found))
    }

    async fn decode<T: DeserializeOwned>(stage: &'static str, response: Response) -> RemoteResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| transport_error(stage, source))?;
        serde_json::from_slice(&bytes).map_err(|source| RemoteError::Decode {
            stage,
            details: source.to_string(),
        })
    }
}

impl RemoteStore for HttpRemoteStore {
    fn list_threads<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, RemoteResult<Vec<ThreadRecord>>> {
        Box::pin(async move {
            let url = self.endpoint(&["get_chats", user_id.as_str()])?;
            let builder = self.request(Method::GET, url, Some(user_id));
            let response = Self::dispatch("list-threads", builder, None).await?;
            let summaries: Vec<ChatSummary> = Self::decode("list-threads-decode", response).await?;
            Ok(summaries.into_iter().map(ThreadRecord::from).collect())
        })
    }

    fn create_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<ThreadId>> {
        Box::pin(async move {
            let url = self.endpoint(&["new_chat"])?;
            let builder = self
                .request(Method::POST, url, Some(user_id))
                .json(&NewChatRequest { user_id, title });
            let response = Self::dispatch("create-thread", builder, None).await?;
            let created: NewChatResponse = Self::decode("create-thread-decode", response).await?;
            Ok(created.chat_id)
        })
    }

    fn get_transcript<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<Vec<TranscriptRecord>>> {
        Box::pin(async move {
            let url = self.endpoint(&["chat", user_id.as_str(), thread_id.as_str()])?;
            let builder = self.request(Method::GET, url, Some(user_id));
            let response = Self::dispatch(
                "get-transcript",
                builder,
                Some(NotFoundTarget::thread(thread_id)),
            )
            .await?;
            let messages: Vec<ChatMessage> =
                Self::decode("get-transcript-decode", response).await?;
            Ok(messages.into_iter().map(TranscriptRecord::from).collect())
        })
    }

    fn send_message<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        body: &'a str,
    ) -> BoxFuture<'a, RemoteResult<String>> {
        Box::pin(async move {
            let url = self.endpoint(&["send_message"])?;
            let builder = self
                .request(Method::POST, url, Some(user_id))
                .json(&SendMessageRequest {
                    user_id,
                    chat_id: thread_id,
                    message: body,
                });
            let response = Self::dispatch(
                "send-message",
                builder,
                Some(NotFoundTarget::thread(thread_id)),
            )
            .await?;
            let reply: SendMessageResponse = Self::decode("send-message-decode", response).await?;
            Ok(reply.response)
        })
    }

    fn delete_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let url = self.endpoint(&["chat", user_id.as_str(), thread_id.as_str()])?;
            let builder = self.request(Method::DELETE, url, Some(user_id));
            Self::dispatch(
                "delete-thread",
                builder,
                Some(NotFoundTarget::thread(thread_id)),
            )
            .await?;
            Ok(())
        })
    }

    fn rename_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let url = self.endpoint(&["chat", user_id.as_str(), thread_id.as_str(), "rename"])?;
            let builder = self
                .request(Method::PATCH, url, Some(user_id))
                .json(&RenameRequest { new_title: title });
            Self::dispatch(
                "rename-thread",
                builder,
                Some(NotFoundTarget::thread(thread_id)),
            )
            .await?;
            Ok(())
        })
    }
}

impl AuthService for HttpRemoteStore {
    fn login<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, RemoteResult<AccountRecord>> {
        Box::pin(async move {
            let url = self.endpoint(&["login"])?;
            let builder = self.request(Method::POST, url, None).json(credentials);
            let response = Self::dispatch("login", builder, None).await?;
            Self::decode("login-decode", response).await
        })
    }

    fn signup<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, RemoteResult<AccountRecord>> {
        Box::pin(async move {
            let url = self.endpoint(&["signup"])?;
            let builder = self.request(Method::POST, url, None).json(credentials);
            let response = Self::dispatch("signup", builder, None).await?;
            Self::decode("signup-decode", response).await
        })
    }

    fn health(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move {
            let url = self.endpoint(&["health"])?;
            let builder = self.request(Method::GET, url, None);
            Self::dispatch("health", builder, None).await?;
            Ok(())
        })
    }
}

fn transport_error(stage: &'static str, source: reqwest::Error) -> RemoteError {
    if source.is_timeout() {
        RemoteError::Timeout { stage }
    } else {
        RemoteError::Transport { stage, source }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorBody>(body) {
        return envelope.message();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn status_error(
    stage: &'static str,
    status: StatusCode,
    message: String,
    not_found: Option<NotFoundTarget>,
) -> RemoteError {
    match (status, not_found) {
        (StatusCode::UNAUTHORIZED, _) => RemoteError::Unauthorized { stage, message },
        (StatusCode::NOT_FOUND, Some(target)) => RemoteError::NotFound {
            stage,
            entity: target.entity,
            id: target.id,
        },
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            RemoteError::Rejected {
                stage,
                status: status.as_u16(),
                message,
            }
        }
        _ => RemoteError::Unavailable {
            stage,
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments_to_base_path() {
        let store = HttpRemoteStore::new("http://localhost:8000/api/", DEFAULT_REQUEST_TIMEOUT)
            .expect("store");
        let url = store.endpoint(&["chat", "u 1", "c/2"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:8000/api/chat/u%201/c%2F2");
    }

    #[test]
    fn opaque_base_urls_are_rejected() {
        let error = HttpRemoteStore::new("mailto:someone@example.com", DEFAULT_REQUEST_TIMEOUT)
            .err();
        assert!(matches!(error, Some(RemoteError::OpaqueBaseUrl { .. })));
    }

    #[test]
    fn fastapi_detail_is_preferred_over_raw_body() {
        let message = error_message(StatusCode::NOT_FOUND, r#"{"detail":"Chat not found"}"#);
        assert_eq!(message, "Chat not found");
    }

    #[test]
    fn empty_error_body_falls_back_to_reason_phrase() {
        let message = error_message(StatusCode::SERVICE_UNAVAILABLE, "  ");
        assert_eq!(message, "Service Unavailable");
    }

    #[test]
    fn not_found_without_target_is_treated_as_unavailable() {
        let error = status_error("remote", StatusCode::NOT_FOUND, "gone".to_string(), None);
        assert!(matches!(error, RemoteError::Unavailable { status: 404, .. }));
    }
}
