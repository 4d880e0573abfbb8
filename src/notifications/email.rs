//! System email service for account-recovery mail.
//!
//! Sends the password-reset, password-setup, and username-recovery
//! messages using the SMTP configuration from the main config file.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Service for sending system emails
#[derive(Debug, Clone)]
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a password reset link
    pub async fn send_password_reset(
        &self,
        to_email: &str,
        reset_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping password reset email to {}", to_email);
            return Ok(());
        }

        let subject = "Reset your Atrium password";
        let html_body = render_link_html(
            "Reset your password",
            "We received a request to reset the password for your account. Click the button below to choose a new one.",
            reset_url,
            "Reset password",
            expires_in_minutes,
        );
        let text_body = render_link_text(
            "We received a request to reset the password for your account.",
            reset_url,
            expires_in_minutes,
        );

        self.send_email(to_email, subject, &html_body, &text_body).await
    }

    /// Send a password setup link for an account that signed up via OAuth
    pub async fn send_password_setup(
        &self,
        to_email: &str,
        setup_url: &str,
        expires_in_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping password setup email to {}", to_email);
            return Ok(());
        }

        let subject = "Set a password for your Atrium account";
        let html_body = render_link_html(
            "Set a password",
            "Your account currently signs in with Google only. Click the button below to add a password so you can also sign in directly.",
            setup_url,
            "Set password",
            expires_in_minutes,
        );
        let text_body = render_link_text(
            "Your account currently signs in with Google only. Use the link below to add a password.",
            setup_url,
            expires_in_minutes,
        );

        self.send_email(to_email, subject, &html_body, &text_body).await
    }

    /// Send a username reminder
    pub async fn send_username_recovery(&self, to_email: &str, username: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping username recovery email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = "Your Atrium username";
        let html_body = format!(
            "<p>Hi there,</p><p>The username for your account is <strong>{}</strong>.</p>\
             <p>If you didn't request this reminder, you can safely ignore this email.</p>",
            html_escape(username)
        );
        let text_body = format!(
            "Hi there,\n\nThe username for your account is: {username}\n\n\
             If you didn't request this reminder, you can safely ignore this email.\n"
        );

        self.send_email(to_email, subject, &html_body, &text_body).await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");

        Ok(())
    }
}

/// Render the HTML version of a single-link email
fn render_link_html(
    heading: &str,
    intro: &str,
    url: &str,
    button_label: &str,
    expires_in_minutes: i64,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{heading}</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f5; margin: 0; padding: 0;">
    <div style="max-width: 560px; margin: 0 auto; padding: 40px 20px;">
        <div style="background-color: #ffffff; border-radius: 8px; padding: 32px 24px;">
            <h1 style="font-size: 22px; margin: 0 0 16px;">{heading}</h1>
            <p style="color: #374151; line-height: 1.6;">{intro}</p>
            <div style="text-align: center; margin: 32px 0;">
                <a href="{url}" style="display: inline-block; background-color: #2563eb; color: #ffffff; text-decoration: none; padding: 14px 32px; border-radius: 6px; font-weight: 500;">{button_label}</a>
            </div>
            <p style="color: #6b7280; font-size: 13px;">This link expires in {expires_in_minutes} minutes and can be used once. If you didn't request it, you can safely ignore this email.</p>
        </div>
    </div>
</body>
</html>"#,
        heading = html_escape(heading),
        intro = html_escape(intro),
        url = url,
        button_label = html_escape(button_label),
        expires_in_minutes = expires_in_minutes,
    )
}

/// Render the plain text version of a single-link email
fn render_link_text(intro: &str, url: &str, expires_in_minutes: i64) -> String {
    format!(
        "{intro}\n\n{url}\n\nThis link expires in {expires_in_minutes} minutes and can be used once.\n\
         If you didn't request it, you can safely ignore this email.\n"
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
