//! REST client for ticket and message CRUD.
//!
//! `SupportApi` is the seam the session actor talks to; `HttpSupportApi` is
//! the reqwest implementation. Every response is an `{ "data": ... }`
//! envelope; a missing `data` field is logged and treated as empty.

use std::future::Future;

use helpdesk_protocol::{
    Envelope, Message, MessageQuery, MessagesPage, ReplyRequest, StatusRequest, Ticket,
    TicketStatus,
};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::ApiError;

const ERROR_BODY_MAX_CHARS: usize = 240;

/// Ticket/message operations of the backend
pub trait SupportApi: Send + Sync + 'static {
    /// `GET /tickets`
    fn fetch_tickets(&self) -> impl Future<Output = Result<Vec<Ticket>, ApiError>> + Send;

    /// `POST /tickets/{id}/messages`
    fn fetch_messages(
        &self,
        ticket_id: &str,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<MessagesPage, ApiError>> + Send;

    /// `POST /tickets/message/reply`; returns the confirmed record if the
    /// server sent one back
    fn reply(
        &self,
        ticket_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<Option<Message>, ApiError>> + Send;

    /// `POST /tickets/status/{id}`
    fn update_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> impl Future<Output = Result<Option<Ticket>, ApiError>> + Send;
}

/// reqwest-backed `SupportApi`
#[derive(Debug, Clone)]
pub struct HttpSupportApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpSupportApi {
    pub fn new(base_url: Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.api_url.clone(), config.api_token.clone())
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ApiError::Url(format!("{}: {}", joined, e)))
    }

    async fn send<T>(&self, request: RequestBuilder, op: &'static str) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned + Send,
    {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                component = "rest",
                event = "rest.response.error_status",
                op,
                status = status.as_u16(),
                "Request rejected by server"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, ERROR_BODY_MAX_CHARS),
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if envelope.data.is_none() {
            warn!(
                component = "rest",
                event = "rest.response.missing_data",
                op,
                payload_preview = %truncate_for_log(&body, ERROR_BODY_MAX_CHARS),
                "Response has no data field, treating as empty"
            );
        } else {
            debug!(component = "rest", event = "rest.response.ok", op, "Request succeeded");
        }
        Ok(envelope.data)
    }
}

impl SupportApi for HttpSupportApi {
    async fn fetch_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        let url = self.url("tickets")?;
        let tickets = self
            .send::<Vec<Ticket>>(self.client.get(url), "fetch_tickets")
            .await?;
        Ok(tickets.unwrap_or_default())
    }

    async fn fetch_messages(
        &self,
        ticket_id: &str,
        query: &MessageQuery,
    ) -> Result<MessagesPage, ApiError> {
        let url = self.url(&format!("tickets/{}/messages", urlencoding::encode(ticket_id)))?;
        let page = self
            .send::<MessagesPage>(self.client.post(url).query(query), "fetch_messages")
            .await?;

        let mut page = page.unwrap_or_default();
        if page.ticket_id.is_empty() {
            page.ticket_id = ticket_id.to_string();
        }
        Ok(page)
    }

    async fn reply(&self, ticket_id: &str, text: &str) -> Result<Option<Message>, ApiError> {
        let url = self.url("tickets/message/reply")?;
        let body = ReplyRequest {
            ticket_id: ticket_id.to_string(),
            text: text.to_string(),
        };
        self.send::<Message>(self.client.post(url).json(&body), "reply")
            .await
    }

    async fn update_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, ApiError> {
        let url = self.url(&format!("tickets/status/{}", urlencoding::encode(ticket_id)))?;
        self.send::<Ticket>(
            self.client.post(url).json(&StatusRequest { status }),
            "update_status",
        )
        .await
    }
}

pub(crate) fn truncate_for_log(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars).collect();
    out.push('…');
    out
}
