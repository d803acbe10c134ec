//! SendGrid mail-send client.

use super::{EmailMessage, EmailSender};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const API_BASE: &str = "https://api.sendgrid.com";

pub struct SendGridSender {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl SendGridSender {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self::with_base_url(api_key, from_email, from_name, API_BASE)
    }

    pub fn with_base_url(api_key: &str, from_email: &str, from_name: &str, api_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, message: &EmailMessage) -> bool {
        let request = MailSendRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &message.to,
                    name: None,
                }],
            }],
            from: Address {
                email: &self.from_email,
                name: Some(&self.from_name),
            },
            subject: &message.subject,
            content: vec![Content {
                content_type: "text/html",
                value: &message.html_body,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Email delivered to {}", message.to);
                true
            }
            Ok(response) => {
                tracing::error!(
                    "Email to {} rejected with status {}",
                    message.to,
                    response.status()
                );
                false
            }
            Err(err) => {
                tracing::error!("Email to {} failed: {}", message.to, err);
                false
            }
        }
    }
}
