#![allow(async_fn_in_trait)]

use log::{error, info};
use reqwest::multipart::{Form, Part};

use super::email::Message;
use crate::{config::MailConfig, errors::ScheduleError};

/// Delivers an assembled invitation. No retries: a failure is returned as-is.
pub trait Mailer {
    async fn send(&self, message: &Message) -> Result<(), ScheduleError>;
}

/// Posts raw MIME to a transactional mail API (Mailgun `messages.mime` contract).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(HttpMailer {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, message: &Message) -> Result<(), ScheduleError> {
        let part = Part::text(message.to_mime())
            .file_name("message.mime")
            .mime_str("message/rfc822")
            .map_err(ScheduleError::transport)?;
        let form = Form::new().text("to", message.to_header()).part("message", part);

        let response = self
            .client
            .post(&self.api_url)
            .basic_auth("api", Some(&self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                error!("mail api unreachable: {}", err);
                ScheduleError::transport(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("mail api rejected message {} with {}: {}", message.message_id, status, body);
            return Err(ScheduleError::transport(format!("mail api responded {status}")));
        }
        info!("mail api accepted message {} for {}", message.message_id, message.to_header());
        Ok(())
    }
}
