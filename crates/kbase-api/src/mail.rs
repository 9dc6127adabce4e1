//! Outbound email. The portal only needs "send this HTML to that address";
//! delivery is delegated to a transactional-mail HTTP API.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

const PRODUCT_NAME: &str = "Knowledge Base";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Development mailer: writes the message to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        info!("Mail (not delivered) to {}: {}", to, subject);
        debug!("Mail body:\n{}", html);
        Ok(())
    }
}

pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let body = OutgoingMail {
            from: &self.from,
            to,
            subject,
            html,
        };

        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("mail API unreachable")?
            .error_for_status()
            .context("mail API rejected message")?;

        info!("Mail sent to {}: {}", to, subject);
        Ok(())
    }
}

pub fn register_otp_email(code: &str, email: &str) -> String {
    otp_email(
        &format!("Welcome, {}!", email),
        "Use this code to complete your registration.",
        code,
    )
}

pub fn forgot_otp_email(code: &str, email: &str) -> String {
    otp_email(
        &format!("Password reset for {}", email),
        "Use this code to reset your password. It expires in a few minutes.",
        code,
    )
}

fn otp_email(heading: &str, lead: &str, code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{PRODUCT_NAME}</title></head>
<body style="margin:0;font-family:Arial,sans-serif;background:#f9f9f9;color:#333;">
  <div style="max-width:600px;margin:40px auto;background:#fff;border-radius:12px;padding:30px;text-align:center;">
    <div style="font-size:22px;font-weight:bold;margin-bottom:10px;">{heading}</div>
    <div style="font-size:16px;font-weight:bold;margin-bottom:10px;">{PRODUCT_NAME}</div>
    <div style="font-size:14px;color:#555;margin-bottom:25px;">{lead}</div>
    <div class="otp" style="font-size:28px;font-weight:bold;color:#4f46e5;margin-bottom:25px;">{code}</div>
    <div style="font-size:12px;color:#777;">If you did not request this, please ignore this email.</div>
  </div>
</body>
</html>"#
    )
}
