//! 新着求人メールの作成と送信
//!
//! SMTPホストが `smtp.example.com` の場合は送信せずログ出力のみ行う（モックモード）。

use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use tracing::{debug, info};

use crate::config::MailConfig;
use crate::error::MailError;
use crate::store::Listing;
use crate::traits::Mailer;

const LISTINGS_TEMPLATE: &str = "listings_html";

const LISTINGS_HTML: &str = r#"<h2>New Jobs Found in Your Area</h2>
{{#each listings}}
<div style="margin-bottom: 20px; border-bottom: 1px solid #eee; padding-bottom: 10px;">
  <h3><a href="{{link}}">{{title}}</a></h3>
  <p><strong>Location:</strong> {{location}}</p>
</div>
{{/each}}
<p><small>You are receiving this because you subscribed to job alerts.</small></p>
"#;

/// 作成済みメール本文
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// SMTPメーラー
pub struct SmtpMailer {
    config: MailConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    templates: Handlebars<'static>,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let transport = if config.is_mock() {
            info!(
                "SMTP host is {}, emails will be logged instead of sent",
                config.host
            );
            None
        } else {
            Some(build_transport(&config)?)
        };

        let mut templates = Handlebars::new();
        templates
            .register_template_string(LISTINGS_TEMPLATE, LISTINGS_HTML)
            .map_err(|e| MailError::Template(e.to_string()))?;

        Ok(Self {
            config,
            transport,
            templates,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.transport.is_none()
    }

    /// 件名・HTML・テキスト本文を作成する
    pub fn render(&self, listings: &[Listing]) -> Result<RenderedEmail, MailError> {
        let subject = format!("New student jobs found! ({})", listings.len());

        let html = self
            .templates
            .render(LISTINGS_TEMPLATE, &json!({ "listings": listings }))
            .map_err(|e| MailError::Template(e.to_string()))?;

        let mut text = String::from("New jobs found in your area:\n\n");
        for listing in listings {
            text.push_str(&format!(
                "- {} ({})\n  {}\n",
                listing.title, listing.location, listing.link
            ));
        }

        Ok(RenderedEmail {
            subject,
            html,
            text,
        })
    }

    fn build_message(&self, to: &str, email: RenderedEmail) -> Result<Message, MailError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| MailError::Address(format!("{}: {}", self.config.from, e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| MailError::Address(format!("{}: {}", to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn build_transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay configuration error: {}", e)))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };

    let mut builder = builder.port(config.port).timeout(Some(config.timeout));
    if !config.username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
    }

    Ok(builder.build())
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_listings(&self, to: &str, listings: &[Listing]) -> Result<(), MailError> {
        if listings.is_empty() {
            return Ok(());
        }

        let email = self.render(listings)?;

        let Some(transport) = &self.transport else {
            let preview = listings
                .iter()
                .map(|l| l.title.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            info!("Mock email sent to: {}", to);
            info!("Subject: {}", email.subject);
            info!("Content preview: {}", preview);
            return Ok(());
        };

        let message = self.build_message(to, email)?;
        let response = transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!("Message sent to {}: {}", to, response.code());
        debug!("SMTP response: {:?}", response.message().collect::<Vec<_>>());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::fetcher::ScrapedListing;

    fn listing(title: &str) -> Listing {
        Listing::from_scraped(
            ScrapedListing::new(title, "https://jobs.iai.co.il/job/1/", "חיפה"),
            Utc::now(),
        )
    }

    #[test]
    fn test_subject_includes_count() {
        let mailer = SmtpMailer::new(MailConfig::default()).unwrap();
        let email = mailer
            .render(&[listing("QA"), listing("Dev")])
            .unwrap();

        assert_eq!(email.subject, "New student jobs found! (2)");
        assert!(email.html.contains(r#"<a href="https://jobs.iai.co.il/job/1/">QA</a>"#));
        assert!(email.html.contains("<strong>Location:</strong> חיפה"));
        assert!(email.text.contains("- Dev (חיפה)"));
    }

    #[test]
    fn test_titles_are_html_escaped() {
        let mailer = SmtpMailer::new(MailConfig::default()).unwrap();
        let email = mailer.render(&[listing("<b>R&D</b>")]).unwrap();

        assert!(email.html.contains("&lt;b&gt;R&amp;D&lt;/b&gt;"));
        assert!(!email.html.contains("<b>R&D</b>"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let mailer = SmtpMailer::new(MailConfig::default()).unwrap();
        let email = mailer.render(&[listing("QA")]).unwrap();

        assert!(matches!(
            mailer.build_message("not-an-address", email),
            Err(MailError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_mode_does_not_send() {
        let mailer = SmtpMailer::new(MailConfig::default()).unwrap();
        assert!(mailer.is_mock());

        mailer
            .send_listings("user@example.com", &[listing("QA")])
            .await
            .unwrap();
        mailer.send_listings("user@example.com", &[]).await.unwrap();
    }
}
