//! Outgoing account emails.
//!
//! Delivery is fire-and-forget: a failed send is logged and never fails the
//! request that triggered it.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{MailConfig, ServerConfig};

const MAILTRAP_ENDPOINT: &str = "https://send.api.mailtrap.io/api/send";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    #[must_use]
    pub fn verification(to: &str, name: &str, code: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome to Soundshelf".to_string(),
            body: format!(
                "Hi {name}, welcome to Soundshelf!\n\n\
                 Use this code to verify your email: {code}\n\n\
                 The code expires in one hour."
            ),
        }
    }

    #[must_use]
    pub fn password_reset(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body: format!(
                "We received a request to reset your password.\n\n\
                 Open this link to choose a new one: {link}\n\n\
                 If you didn't ask for this, ignore this email."
            ),
        }
    }

    #[must_use]
    pub fn password_changed(to: &str, name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Password reset successfully".to_string(),
            body: format!(
                "Hi {name}, your password was changed. You can now sign in with it."
            ),
        }
    }
}

pub trait Mailer: Send + Sync {
    fn deliver(&self, email: Email);
}

/// Writes emails to the log. The default for development.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn deliver(&self, email: Email) {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email (not sent):\n{}",
            email.body
        );
    }
}

/// Sends through the Mailtrap HTTP API.
pub struct MailtrapMailer {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    sender: String,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    text: &'a str,
}

impl MailtrapMailer {
    pub fn new(token: &str, sender: &str, endpoint: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or(MAILTRAP_ENDPOINT).to_string(),
            token: token.to_string(),
            sender: sender.to_string(),
        }
    }

    async fn send(
        http: reqwest::Client,
        endpoint: String,
        token: String,
        sender: String,
        email: Email,
    ) -> Result<(), String> {
        let request = SendRequest {
            from: Address { email: &sender },
            to: [Address { email: &email.to }],
            subject: &email.subject,
            text: &email.body,
        };
        let resp = http
            .post(&endpoint)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(format!("{status}: {body}"))
        }
    }
}

impl Mailer for MailtrapMailer {
    fn deliver(&self, email: Email) {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let token = self.token.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let to = email.to.clone();
            match Self::send(http, endpoint, token, sender, email).await {
                Ok(()) => tracing::debug!("Sent email to {}", to),
                Err(e) => tracing::warn!("Failed to send email to {}: {e}", to),
            }
        });
    }
}

pub fn from_config(config: &ServerConfig) -> Arc<dyn Mailer> {
    match &config.mail {
        MailConfig::Log => Arc::new(LogMailer),
        MailConfig::Mailtrap {
            token,
            sender,
            endpoint,
        } => Arc::new(MailtrapMailer::new(token, sender, endpoint.as_deref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_carry_their_secrets() {
        let email = Email::verification("ada@example.com", "Ada", "123456");
        assert_eq!(email.to, "ada@example.com");
        assert!(email.body.contains("123456"));
        assert!(email.body.contains("Ada"));

        let email = Email::password_reset("ada@example.com", "http://app/reset?token=t&userId=u");
        assert!(email.body.contains("http://app/reset?token=t&userId=u"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = SendRequest {
            from: Address { email: "noreply@example.com" },
            to: [Address { email: "ada@example.com" }],
            subject: "Hi",
            text: "Body",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["from"]["email"], "noreply@example.com");
        assert_eq!(json["to"][0]["email"], "ada@example.com");
        assert_eq!(json["text"], "Body");
    }
}
