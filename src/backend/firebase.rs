//! Hosted realtime database and authentication provider over their REST
//! APIs.

use std::collections::VecDeque;

use axum::body::Bytes;
use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};
use reqwest::{Client, RequestBuilder, Response, header::ACCEPT};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{
    BackendError, BackendResult, Identity, IdentityProvider, Query, RealtimeDatabase,
    SnapshotStream, segments,
    sse::{self, SseDecoder, SseEvent, StreamUpdate},
    tree,
};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Clone)]
pub struct FirebaseDatabase {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl FirebaseDatabase {
    pub fn new(client: Client, base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn url(&self, path: &str) -> BackendResult<String> {
        let path = segments(path)?;
        Ok(format!("{}/{}.json", self.base_url, path.join("/")))
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn open_stream(request: BackendResult<RequestBuilder>) -> BackendResult<Response> {
        let response = request?.header(ACCEPT, "text/event-stream").send().await?;
        check_status(response).await
    }
}

/// Query string in the REST API's format: values are JSON encoded.
fn query_params(query: &Query) -> BackendResult<Vec<(&'static str, String)>> {
    let mut params = Vec::new();
    if let Some(child) = &query.order_by_child {
        params.push(("orderBy", serde_json::to_string(child)?));
    } else if query.equal_to.is_some() || query.limit_to_last.is_some() {
        params.push(("orderBy", serde_json::to_string("$key")?));
    }
    if let Some(value) = &query.equal_to {
        params.push(("equalTo", serde_json::to_string(value)?));
    }
    if let Some(limit) = query.limit_to_last {
        params.push(("limitToLast", limit.to_string()));
    }
    Ok(params)
}

struct StreamState {
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    snapshot: Value,
    pending_open: Option<BoxFuture<'static, BackendResult<Response>>>,
    done: bool,
}

impl RealtimeDatabase for FirebaseDatabase {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<Option<Value>>> {
        Box::pin(async move {
            let request = self.with_auth(self.client.get(self.url(path)?));
            let response = check_status(request.send().await?).await?;
            let value: Value = response.json().await?;
            Ok(if value.is_null() { None } else { Some(value) })
        })
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let value = tree::prune(value);
            if value.is_null() {
                return self.remove(path).await;
            }
            let request = self.with_auth(self.client.put(self.url(path)?).json(&value));
            check_status(request.send().await?).await?;
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        path: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let request = self.with_auth(self.client.patch(self.url(path)?).json(&fields));
            check_status(request.send().await?).await?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let request = self.with_auth(self.client.delete(self.url(path)?));
            check_status(request.send().await?).await?;
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        path: &'a str,
        query: &'a Query,
    ) -> BoxFuture<'a, BackendResult<Vec<(String, Value)>>> {
        Box::pin(async move {
            let request = self
                .with_auth(self.client.get(self.url(path)?))
                .query(&query_params(query)?);
            let response = check_status(request.send().await?).await?;
            let value: Value = response.json().await?;

            // The REST API answers with an unordered object; order it the
            // same way the server selected it.
            Ok(tree::apply_query(Some(value), query))
        })
    }

    fn subscribe(&self, path: &str) -> SnapshotStream {
        let request = self
            .url(path)
            .map(|url| self.with_auth(self.client.get(url)));
        let open: BoxFuture<'static, BackendResult<Response>> =
            Box::pin(Self::open_stream(request));

        let state = StreamState {
            body: None,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            snapshot: Value::Null,
            pending_open: Some(open),
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            if let Some(open) = state.pending_open.take() {
                match open.await {
                    Ok(response) => {
                        state.body = Some(response.bytes_stream().boxed());
                    }
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            loop {
                while let Some(event) = state.pending.pop_front() {
                    match sse::apply_event(&mut state.snapshot, &event) {
                        Ok(StreamUpdate::Changed) => {
                            let snapshot = tree::read(&state.snapshot, &[]);
                            return Some((Ok(snapshot), state));
                        }
                        Ok(StreamUpdate::Ignored) => continue,
                        Ok(StreamUpdate::Closed(reason)) => {
                            state.done = true;
                            return Some((Err(BackendError::SubscriptionClosed(reason)), state));
                        }
                        Err(e) => {
                            tracing::warn!("Skipping malformed stream event: {}", e);
                            continue;
                        }
                    }
                }

                let body = state.body.as_mut()?;
                match body.next().await {
                    Some(Ok(chunk)) => {
                        let events = state.decoder.feed(&chunk);
                        state.pending.extend(events);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(BackendError::Http(e)), state));
                    }
                    None => return None,
                }
            }
        })
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error: AuthErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AuthErrorDetail {
    message: String,
}

/// Maps the provider's error codes onto [`BackendError`].
fn map_auth_error(message: &str) -> BackendError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => BackendError::EmailExists,
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "INVALID_EMAIL" | "USER_DISABLED" => {
            BackendError::InvalidCredentials
        }
        "EMAIL_NOT_FOUND" => BackendError::UserNotFound,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => BackendError::TooManyAttempts,
        "WEAK_PASSWORD" => BackendError::WeakPassword,
        _ => BackendError::Provider(message.to_string()),
    }
}

/// Sign-in never tells an unknown email apart from a wrong password.
fn sign_in_error(error: BackendError) -> BackendError {
    match error {
        BackendError::UserNotFound => BackendError::InvalidCredentials,
        other => other,
    }
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirebaseAuth {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, IDENTITY_TOOLKIT_URL)
    }

    pub fn with_base_url(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, method: &str, body: Value) -> BackendResult<Value> {
        let response = self
            .client
            .post(format!("{}/accounts:{}", self.base_url, method))
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<AuthErrorBody>(&text) {
            Ok(body) => Err(map_auth_error(&body.error.message)),
            Err(_) => Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            }),
        }
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> BackendResult<Identity> {
        let value = self
            .call(
                method,
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;
        let response: AuthResponse = serde_json::from_value(value)?;

        Ok(Identity {
            uid: response.local_id,
            email: response.email,
            id_token: response.id_token,
        })
    }
}

impl IdentityProvider for FirebaseAuth {
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>> {
        Box::pin(self.password_call("signUp", email, password))
    }

    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>> {
        Box::pin(async move {
            self.password_call("signInWithPassword", email, password)
                .await
                .map_err(sign_in_error)
        })
    }

    fn send_password_reset<'a>(&'a self, email: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            self.call(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
            Ok(())
        })
    }
}
