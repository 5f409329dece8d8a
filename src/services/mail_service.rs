use std::fmt::{self, Display};
use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{Config, SmtpConfig};
use crate::error::{Error, Result};

pub trait MailTemplate: Display {
    fn subject(&self) -> &'static str;
}

pub struct VerificationEmail<'a> {
    pub link: &'a str,
}

pub struct PasswordResetEmail<'a> {
    pub link: &'a str,
}

pub struct TwoFactorCodeEmail<'a> {
    pub code: &'a str,
}

const STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; line-height: 1.6; margin: 0; padding: 0; background-color: #f9fafb; }
    .container { max-width: 600px; margin: 0 auto; padding: 20px; }
    .card { text-align: center; margin: 40px 0; padding: 30px; background-color: #ffffff; border-radius: 8px; }
    .button { display: inline-block; padding: 12px 24px; background-color: #18181b; color: #ffffff; text-decoration: none; border-radius: 6px; }
    .code { font-size: 32px; font-weight: bold; letter-spacing: 4px; color: #059669; margin: 20px 0; }
    .note { color: #4b5563; font-size: 13px; }
"#;

fn layout(f: &mut fmt::Formatter<'_>, title: &str, content: &str) -> fmt::Result {
    write!(
        f,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h2>{title}</h2>
            {content}
        </div>
    </div>
</body>
</html>"#
    )
}

impl Display for VerificationEmail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = format!(
            r#"<p>Click the button below to confirm your e-mail address.</p>
            <p><a class="button" href="{link}">Confirm e-mail</a></p>
            <p class="note">The link expires in one hour. If you did not create an account, ignore this message.</p>"#,
            link = self.link
        );
        layout(f, "Confirm your e-mail", &content)
    }
}

impl MailTemplate for VerificationEmail<'_> {
    fn subject(&self) -> &'static str {
        "Confirm your email"
    }
}

impl Display for PasswordResetEmail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = format!(
            r#"<p>Someone asked to reset the password of this account.</p>
            <p><a class="button" href="{link}">Choose a new password</a></p>
            <p class="note">The link expires in one hour. If it was not you, ignore this message.</p>"#,
            link = self.link
        );
        layout(f, "Reset your password", &content)
    }
}

impl MailTemplate for PasswordResetEmail<'_> {
    fn subject(&self) -> &'static str {
        "Reset your password"
    }
}

impl Display for TwoFactorCodeEmail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = format!(
            r#"<div class="code">{code}</div>
            <p class="note">This code is for one-time use and expires in 5 minutes.<br>
            Do not share it with anyone.</p>"#,
            code = self.code
        );
        layout(f, "Your sign-in code", &content)
    }
}

impl MailTemplate for TwoFactorCodeEmail<'_> {
    fn subject(&self) -> &'static str {
        "2FA Code"
    }
}

#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        from: Mailbox,
    },
    /// Writes messages to the log instead of sending them. Used when no SMTP host is configured.
    Log { from: Mailbox },
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for MAIL_FROM: {}", e)))?;

        let Some(smtp) = config.smtp.as_ref() else {
            tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
            return Ok(Mailer::Log { from });
        };

        Ok(Mailer::Smtp {
            transport: Arc::new(build_transport(smtp)?),
            from,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, html: String) -> Result<()> {
        match self {
            Mailer::Smtp { transport, from } => {
                let recipient: Mailbox = to
                    .parse()
                    .map_err(|e| Error::Mail(format!("invalid recipient {}: {}", to, e)))?;
                let message = Message::builder()
                    .from(from.clone())
                    .to(recipient)
                    .subject(subject)
                    .header(ContentType::TEXT_HTML)
                    .body(html)
                    .map_err(|e| Error::Mail(e.to_string()))?;

                transport.send(message).await.map_err(|e| {
                    tracing::error!(error = %e, to, "failed to send mail");
                    Error::Mail(e.to_string())
                })?;
                tracing::info!(to, subject, "mail sent");
                Ok(())
            }
            Mailer::Log { from } => {
                tracing::info!(%from, to, subject, "mail delivery disabled, logging message");
                tracing::debug!(body = %html, "mail body");
                Ok(())
            }
        }
    }
}

fn build_transport(smtp: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = match smtp.port {
        465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| Error::Config(format!("Invalid SMTP relay: {}", e)))?,
        587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| Error::Config(format!("Invalid SMTP relay: {}", e)))?,
        _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host),
    };
    let builder = builder.port(smtp.port);
    let builder = match (&smtp.username, &smtp.password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };
    Ok(builder.build())
}

#[derive(Clone)]
pub struct MailService {
    mailer: Mailer,
    app_url: String,
}

impl MailService {
    pub fn new(mailer: Mailer, app_url: String) -> Self {
        Self {
            mailer,
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/auth/new-verification?token={}", self.app_url, token)
    }

    pub fn password_reset_link(&self, token: &str) -> String {
        format!("{}/auth/new-password?token={}", self.app_url, token)
    }

    async fn deliver<T: MailTemplate>(&self, to: &str, template: T) -> Result<()> {
        self.mailer
            .send(to, template.subject(), template.to_string())
            .await
    }

    pub async fn send_verification_email(&self, email: &str, token: &str) -> Result<()> {
        let link = self.verification_link(token);
        self.deliver(email, VerificationEmail { link: &link }).await
    }

    pub async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<()> {
        let link = self.password_reset_link(token);
        self.deliver(email, PasswordResetEmail { link: &link }).await
    }

    pub async fn send_two_factor_token_email(&self, email: &str, token: &str) -> Result<()> {
        self.deliver(email, TwoFactorCodeEmail { code: token }).await
    }
}
