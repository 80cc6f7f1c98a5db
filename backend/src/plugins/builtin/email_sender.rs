use crate::config::PluginSettings;
use crate::plugins::{
    ActionError, ActionHandler, ActionRegistration, PluginRegistration, RegistrationError,
    required_str,
};
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const NAME: &str = "email_sender";
/// Implicit TLS submission port; every other port upgrades with STARTTLS.
pub const SUBMISSIONS_PORT: u16 = 465;

#[derive(Clone, Deserialize)]
pub struct SmtpSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn message(&self) -> Result<Message, ActionError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| ActionError::InvalidParameters(format!("from '{}': {e}", self.from)))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| ActionError::InvalidParameters(format!("to '{}': {e}", self.to)))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| ActionError::Failed(e.to_string()))
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, settings: &SmtpSettings, mail: &OutgoingMail) -> Result<(), ActionError>;
}

/// Submits over SMTP to the configured server, authenticating as the
/// configured account. A transport is built per send from the settings in
/// effect at that moment.
#[derive(Default)]
pub struct SmtpRelay;

impl SmtpRelay {
    fn mailer(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, ActionError> {
        let builder = if settings.smtp_port == SUBMISSIONS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
        }
        .map_err(|e| ActionError::Failed(format!("SMTP setup failed: {e}")))?;

        Ok(builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.email.clone(),
                settings.password.clone(),
            ))
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn send(&self, settings: &SmtpSettings, mail: &OutgoingMail) -> Result<(), ActionError> {
        let message = mail.message()?;
        let mailer = Self::mailer(settings)?;
        debug!(
            server = %settings.smtp_server,
            port = settings.smtp_port,
            "Submitting mail"
        );
        mailer
            .send(message)
            .await
            .map_err(|e| ActionError::Failed(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

/// Mail plugin state. Credentials are only touched with the mutex held, so a
/// send never observes a half-applied configure.
pub struct EmailSender {
    settings: Mutex<Option<SmtpSettings>>,
    transport: Arc<dyn MailTransport>,
}

impl EmailSender {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            settings: Mutex::new(None),
            transport,
        }
    }

    pub async fn configure(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        let settings: SmtpSettings = serde_json::from_value(Value::Object(parameters.clone()))
            .map_err(|e| ActionError::InvalidParameters(e.to_string()))?;
        if settings.smtp_server.trim().is_empty()
            || settings.email.trim().is_empty()
            || settings.password.is_empty()
        {
            return Err(ActionError::InvalidParameters(
                "All parameters are required".into(),
            ));
        }
        if settings.email.contains(['\r', '\n']) || settings.smtp_server.contains(['\r', '\n']) {
            return Err(ActionError::InvalidParameters(
                "email and smtp_server must be a single line".into(),
            ));
        }

        let mut guard = self.settings.lock().await;
        info!(
            server = %settings.smtp_server,
            port = settings.smtp_port,
            "SMTP settings updated"
        );
        *guard = Some(settings);
        Ok(json!({ "message": "SMTP settings saved" }))
    }

    pub async fn send(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        let to = required_str(parameters, "to")?;
        let subject = required_str(parameters, "subject")?;
        let body = parameters
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if [to, subject].iter().any(|s| s.contains(['\r', '\n'])) {
            return Err(ActionError::InvalidParameters(
                "header fields must be a single line".into(),
            ));
        }

        // Held across the transport call: configure waits for in-flight sends.
        let guard = self.settings.lock().await;
        let settings = guard
            .as_ref()
            .ok_or_else(|| ActionError::NotConfigured("SMTP settings are not defined".into()))?;

        let mail = OutgoingMail {
            from: settings.email.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        self.transport.send(settings, &mail).await?;
        info!("Email sent to {}", to);
        Ok(json!({ "message": format!("Email sent to {to}") }))
    }

    pub async fn is_configured(&self) -> bool {
        self.settings.lock().await.is_some()
    }
}

enum Op {
    Configure,
    Send,
    Status,
}

struct EmailAction {
    sender: Arc<EmailSender>,
    op: Op,
}

#[async_trait]
impl ActionHandler for EmailAction {
    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        match self.op {
            Op::Configure => self.sender.configure(parameters).await,
            Op::Send => self.sender.send(parameters).await,
            Op::Status => Ok(json!({ "email_configured": self.sender.is_configured().await })),
        }
    }
}

pub fn register(_settings: &PluginSettings) -> Result<PluginRegistration, RegistrationError> {
    Ok(registration(Arc::new(EmailSender::new(Arc::new(SmtpRelay)))))
}

pub fn registration(sender: Arc<EmailSender>) -> PluginRegistration {
    let action = |op| -> Arc<dyn ActionHandler> {
        Arc::new(EmailAction {
            sender: sender.clone(),
            op,
        })
    };

    PluginRegistration::new(NAME, "Configurable e-mail sending")
        .action(
            ActionRegistration::new("configure_email", "Configures the SMTP account", action(Op::Configure))
                .param("smtp_server", "string (ex: smtp.gmail.com)")
                .param("smtp_port", "number (ex: 587)")
                .param("email", "string (your e-mail address)")
                .param("password", "string (your password)"),
        )
        .action(
            ActionRegistration::new("send_email", "Sends an e-mail", action(Op::Send))
                .param("to", "string (recipient e-mail)")
                .param("subject", "string")
                .param("body", "string"),
        )
        .action(ActionRegistration::new(
            "email_status",
            "Reports whether SMTP settings are configured",
            action(Op::Status),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingTransport {
        sent: std::sync::Mutex<Vec<(SmtpSettings, OutgoingMail)>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, settings: &SmtpSettings, mail: &OutgoingMail) -> Result<(), ActionError> {
            self.sent
                .lock()
                .unwrap()
                .push((settings.clone(), mail.clone()));
            Ok(())
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn smtp() -> Map<String, Value> {
        params(json!({
            "smtp_server": "smtp.example.com",
            "smtp_port": 587,
            "email": "me@example.com",
            "password": "secret"
        }))
    }

    #[tokio::test]
    async fn send_requires_configuration() {
        let sender = EmailSender::new(Arc::new(RecordingTransport::default()));
        let err = sender
            .send(&params(json!({"to": "a@b.c", "subject": "hi", "body": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn configure_then_send_uses_settings() {
        let transport = Arc::new(RecordingTransport::default());
        let sender = EmailSender::new(transport.clone());

        sender.configure(&smtp()).await.unwrap();
        assert!(sender.is_configured().await);

        sender
            .send(&params(json!({"to": "a@b.c", "subject": "Meeting", "body": "See you"})))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.smtp_server, "smtp.example.com");
        assert_eq!(sent[0].1.from, "me@example.com");
        assert_eq!(sent[0].1.subject, "Meeting");
    }

    #[tokio::test]
    async fn configure_rejects_bad_port() {
        let sender = EmailSender::new(Arc::new(RecordingTransport::default()));
        let mut bad = smtp();
        bad.insert("smtp_port".into(), json!("not a port"));
        assert!(matches!(
            sender.configure(&bad).await,
            Err(ActionError::InvalidParameters(_))
        ));
        assert!(!sender.is_configured().await);
    }

    #[tokio::test]
    async fn header_injection_is_refused() {
        let sender = EmailSender::new(Arc::new(RecordingTransport::default()));
        sender.configure(&smtp()).await.unwrap();
        let err = sender
            .send(&params(json!({"to": "a@b.c\r\nBcc: x@y.z", "subject": "s"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn status_action_reflects_configuration() {
        let sender = Arc::new(EmailSender::new(Arc::new(RecordingTransport::default())));
        let registration = registration(sender.clone());
        assert!(registration.check().is_ok());

        let status = registration
            .actions
            .iter()
            .find(|a| a.name == "email_status")
            .unwrap();
        assert_eq!(
            status.handler.execute(&Map::new()).await.unwrap(),
            json!({"email_configured": false})
        );
        sender.configure(&smtp()).await.unwrap();
        assert_eq!(
            status.handler.execute(&Map::new()).await.unwrap(),
            json!({"email_configured": true})
        );
    }

    #[tokio::test]
    async fn configure_rejects_multiline_email() {
        let sender = EmailSender::new(Arc::new(RecordingTransport::default()));
        let mut bad = smtp();
        bad.insert("email".into(), json!("me@example.com\r\nBcc: spy@example.com"));
        assert!(matches!(
            sender.configure(&bad).await,
            Err(ActionError::InvalidParameters(_))
        ));
        assert!(!sender.is_configured().await);
    }

    #[derive(Default)]
    struct BlockingTransport {
        entered: Notify,
        release: Notify,
        seen: std::sync::Mutex<Vec<SmtpSettings>>,
    }

    #[async_trait]
    impl MailTransport for BlockingTransport {
        async fn send(&self, settings: &SmtpSettings, _mail: &OutgoingMail) -> Result<(), ActionError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.seen.lock().unwrap().push(settings.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn configure_waits_for_in_flight_send() {
        let transport = Arc::new(BlockingTransport::default());
        let sender = Arc::new(EmailSender::new(transport.clone()));
        sender.configure(&smtp()).await.unwrap();

        let mail = params(json!({"to": "a@b.c", "subject": "hi", "body": "x"}));
        let sending = tokio::spawn({
            let sender = sender.clone();
            let mail = mail.clone();
            async move { sender.send(&mail).await }
        });
        transport.entered.notified().await;

        let mut next = smtp();
        next.insert("smtp_server".into(), json!("smtp.other.org"));
        next.insert("password".into(), json!("rotated"));
        let mut configuring = tokio::spawn({
            let sender = sender.clone();
            async move { sender.configure(&next).await }
        });

        // configure cannot take the lock while the send is parked in the transport
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut configuring)
                .await
                .is_err()
        );

        transport.release.notify_one();
        sending.await.unwrap().unwrap();
        configuring.await.unwrap().unwrap();

        {
            let seen = transport.seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].smtp_server, "smtp.example.com");
            assert_eq!(seen[0].password, "secret");
        }

        // the next send picks up the new account
        transport.release.notify_one();
        sender.send(&mail).await.unwrap();
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[1].smtp_server, "smtp.other.org");
        assert_eq!(seen[1].password, "rotated");
    }

    #[test]
    fn message_keeps_headers_and_refuses_bad_addresses() {
        let mail = OutgoingMail {
            from: "me@example.com".into(),
            to: "you@example.com".into(),
            subject: "Hello".into(),
            body: "line one\nline two".into(),
        };
        let formatted = String::from_utf8(mail.message().unwrap().formatted()).unwrap();
        assert!(formatted.contains("From: me@example.com\r\n"));
        assert!(formatted.contains("To: you@example.com\r\n"));
        assert!(formatted.contains("Subject: Hello\r\n"));

        let bad = OutgoingMail {
            to: "not an address".into(),
            ..mail
        };
        assert!(matches!(
            bad.message(),
            Err(ActionError::InvalidParameters(_))
        ));
    }
}
