pub mod dto;

use std::env;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub api_base: String,
    pub api_token: String,
}

impl CalendarConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_base = env::var("CALENDAR_API_BASE")
            .map_err(|_| AppError::BadRequest("CALENDAR_API_BASE is not set".to_string()))?;
        let api_token = env::var("CALENDAR_API_TOKEN")
            .map_err(|_| AppError::BadRequest("CALENDAR_API_TOKEN is not set".to_string()))?;

        Ok(Self { api_base, api_token })
    }
}

/// Remote calendar operations used by the sync service.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_calendar(&self, req: dto::CreateCalendarRequest) -> Result<String, AppError>;
    async fn delete_calendar(&self, calendar_id: &str) -> Result<(), AppError>;
    async fn list_attendees(&self, calendar_id: &str) -> Result<Vec<String>, AppError>;
    async fn add_attendees(&self, calendar_id: &str, user_ids: &[String]) -> Result<(), AppError>;
    async fn remove_attendees(&self, calendar_id: &str, user_ids: &[String])
        -> Result<(), AppError>;
}

pub struct HttpCalendarClient {
    client: Client,
    config: CalendarConfig,
}

impl HttpCalendarClient {
    pub fn new(config: CalendarConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Calendar(format!("{}: {} {}", what, status, body)))
    }
}

#[async_trait]
impl CalendarClient for HttpCalendarClient {
    async fn create_calendar(&self, req: dto::CreateCalendarRequest) -> Result<String, AppError> {
        let url = self.url("/v1/calendars");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&req)
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("create calendar: {}", e)))?;

        let response = Self::check(response, "create calendar").await?;
        let parsed: dto::CreateCalendarResponse = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("create calendar: invalid response: {}", e)))?;

        Ok(parsed.calendar_id)
    }

    async fn delete_calendar(&self, calendar_id: &str) -> Result<(), AppError> {
        let url = self.url(&format!("/v1/calendars/{}", calendar_id));
        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("delete calendar: {}", e)))?;

        Self::check(response, "delete calendar").await?;
        Ok(())
    }

    async fn list_attendees(&self, calendar_id: &str) -> Result<Vec<String>, AppError> {
        let url = self.url(&format!("/v1/calendars/{}/attendees", calendar_id));
        let mut attendees = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.config.api_token));
            // Cursors are opaque; let reqwest encode them.
            if let Some(c) = &cursor {
                request = request.query(&[("cursor", c.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| AppError::Calendar(format!("list attendees: {}", e)))?;

            let response = Self::check(response, "list attendees").await?;
            let parsed: dto::AttendeeListResponse = response.json().await.map_err(|e| {
                AppError::Calendar(format!("list attendees: invalid response: {}", e))
            })?;

            attendees.extend(parsed.attendees.into_iter().map(|a| a.user_id));

            if !parsed.has_more {
                break;
            }
            match parsed.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        Ok(attendees)
    }

    async fn add_attendees(&self, calendar_id: &str, user_ids: &[String]) -> Result<(), AppError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let url = self.url(&format!("/v1/calendars/{}/attendees", calendar_id));
        let body = dto::ModifyAttendeesRequest { user_ids };
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("add attendees: {}", e)))?;

        Self::check(response, "add attendees").await?;
        Ok(())
    }

    async fn remove_attendees(
        &self,
        calendar_id: &str,
        user_ids: &[String],
    ) -> Result<(), AppError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let url = self.url(&format!("/v1/calendars/{}/attendees/remove", calendar_id));
        let body = dto::ModifyAttendeesRequest { user_ids };
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("remove attendees: {}", e)))?;

        Self::check(response, "remove attendees").await?;
        Ok(())
    }
}

/// Fallback used when the calendar API is not configured. Create still
/// hands out ids so local bindings keep working in development.
pub struct NoopCalendarClient;

#[async_trait]
impl CalendarClient for NoopCalendarClient {
    async fn create_calendar(&self, _req: dto::CreateCalendarRequest) -> Result<String, AppError> {
        Ok(format!("noop-{}", uuid::Uuid::new_v4()))
    }

    async fn delete_calendar(&self, _calendar_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_attendees(&self, _calendar_id: &str) -> Result<Vec<String>, AppError> {
        Ok(Vec::new())
    }

    async fn add_attendees(&self, _calendar_id: &str, _user_ids: &[String]) -> Result<(), AppError> {
        Ok(())
    }

    async fn remove_attendees(
        &self,
        _calendar_id: &str,
        _user_ids: &[String],
    ) -> Result<(), AppError> {
        Ok(())
    }
}
