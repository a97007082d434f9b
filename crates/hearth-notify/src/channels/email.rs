use crate::config::EmailConfig;
use crate::error::{NotifyError, Result};
use crate::utils::escape_html;
use crate::NotificationChannel;
use async_trait::async_trait;
use hearth_common::types::{Alert, Severity};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidConfig(format!("invalid address '{addr}': {e}")))
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.to.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "email channel needs at least one recipient".to_string(),
            ));
        }
        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>>>()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?
            .port(config.port);
        if let Some(auth) = &config.auth {
            builder = builder.credentials(Credentials::new(
                auth.username.clone(),
                auth.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn subject(alert: &Alert) -> String {
        format!(
            "[hearth][{}] {} ({})",
            alert.severity, alert.rule_name, alert.category
        )
    }

    pub fn render_html(alert: &Alert) -> String {
        let color = match alert.severity {
            Severity::Critical => "#d32f2f",
            Severity::Warning => "#f9a825",
            Severity::Info => "#1976d2",
        };
        format!(
            "<html><body>\
             <h2 style=\"color:{color}\">{severity}: {rule}</h2>\
             <table>\
             <tr><td><b>Rule</b></td><td>{rule}</td></tr>\
             <tr><td><b>Category</b></td><td>{category}</td></tr>\
             <tr><td><b>Message</b></td><td>{message}</td></tr>\
             <tr><td><b>Time</b></td><td>{time}</td></tr>\
             </table>\
             </body></html>",
            severity = alert.severity.to_string().to_uppercase(),
            rule = escape_html(&alert.rule_name),
            category = escape_html(&alert.category),
            message = escape_html(&alert.message),
            time = alert.timestamp.to_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &Alert) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(Self::subject(alert))
            .header(ContentType::TEXT_HTML);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let email = builder
            .body(Self::render_html(alert))
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SmtpError(e.to_string()))?;
        tracing::debug!(recipients = self.to.len(), rule = %alert.rule_name, "Alert email sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
