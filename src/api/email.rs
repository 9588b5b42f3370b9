//! Outbound email delivery.
//!
//! Admission notices are delivered synchronously: the sign-up engine needs to
//! know whether the message was accepted before it changes any state, so there
//! is no outbox here. A `Mailer` takes `(recipient, subject, body)` and answers
//! `Ok`/`Err`.
//!
//! - `LogMailer` logs the message and always succeeds (local dev).
//! - `HttpMailer` posts the message as JSON to a transactional email API.
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use super::BoxFuture;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub html: String,
}

/// Email delivery abstraction used by the sign-up engine.
pub trait Mailer: Send + Sync {
    /// Deliver a message, or return an error when the provider did not accept it.
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, ()>;
}

/// Local dev mailer that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(
                to_email = %message.to_email,
                subject = %message.subject,
                "email send stub"
            );
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Mailer backed by an HTTP email API (`POST {url}` with a bearer key).
#[derive(Debug)]
pub struct HttpMailer {
    client: Client,
    url: String,
    api_key: SecretString,
    from: String,
}

impl HttpMailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String, api_key: SecretString, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build mailer HTTP client")?;
        Ok(Self {
            client,
            url,
            api_key,
            from,
        })
    }
}

impl Mailer for HttpMailer {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let body = SendEmailBody {
                from: &self.from,
                to: &message.to_email,
                subject: &message.subject,
                html: &message.html,
            };
            let span = info_span!("mailer.send", http.url = %self.url);
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .instrument(span)
                .await
                .context("mailer request failed")?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(anyhow!("mailer rejected message with status {status}"))
            }
        })
    }
}

/// Acknowledge a new sign-up request to the applicant.
pub(crate) fn signup_received(to_email: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your sign-up request was received".to_string(),
        html: format!(
            "<p>Hi {name},</p><p>Your request to join has been received. \
             The blog owner will review it within 24 hours.</p>"
        ),
    }
}

/// Tell the applicant they were accepted and where to finish the account.
pub(crate) fn signup_accepted(to_email: &str, name: &str, completion_url: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your sign-up request was approved".to_string(),
        html: format!(
            "<p>Hi {name},</p><p>Your request was approved. \
             Finish creating your account here: <a href=\"{completion_url}\">{completion_url}</a></p>"
        ),
    }
}

pub(crate) fn signup_rejected(to_email: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your sign-up request was declined".to_string(),
        html: format!("<p>Hi {name},</p><p>Your request to join was declined.</p>"),
    }
}
