//! Message rendering for campaign and test sends.

use askama::Template;
use thiserror::Error;

use crate::domain::entities::Campaign;
use crate::domain::transport::OutgoingMessage;
use crate::utils::html_text::html_to_text;

/// Subject prefix marking test sends.
pub const TEST_SUBJECT_PREFIX: &str = "[TEST] ";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Template)]
#[template(path = "email/campaign.html")]
struct CampaignHtml<'a> {
    body: &'a str,
    unsubscribe_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/test.html")]
struct TestHtml<'a> {
    campaign_name: &'a str,
    body: &'a str,
}

/// Builds the public unsubscribe link for a token.
pub fn unsubscribe_url(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/unsubscribe/{}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

/// Plain-text body: the explicit fallback, or the HTML with tags stripped.
fn text_body(campaign: &Campaign) -> String {
    match campaign.text_content.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => html_to_text(&campaign.html_content),
    }
}

/// Renders the final message for one recipient, including their unsubscribe link.
///
/// # Errors
///
/// Returns [`RenderError`] if a template fails to render.
pub fn render_for_recipient(
    campaign: &Campaign,
    to: &str,
    unsubscribe_url: &str,
) -> Result<OutgoingMessage, RenderError> {
    let html = CampaignHtml {
        body: &campaign.html_content,
        unsubscribe_url,
    }
    .render()?;

    let text = format!(
        "{}\n\n--\nYou are receiving this email because you opted in to news and offers.\nUnsubscribe: {}\n",
        text_body(campaign).trim_end(),
        unsubscribe_url
    );

    Ok(OutgoingMessage {
        to: to.to_string(),
        subject: campaign.subject.clone(),
        html,
        text: Some(text),
        list_unsubscribe: Some(unsubscribe_url.to_string()),
    })
}

/// Renders a preview message with a visible test banner and no unsubscribe link.
///
/// # Errors
///
/// Returns [`RenderError`] if a template fails to render.
pub fn render_test(campaign: &Campaign, to: &str) -> Result<OutgoingMessage, RenderError> {
    let html = TestHtml {
        campaign_name: &campaign.name,
        body: &campaign.html_content,
    }
    .render()?;

    let text = format!(
        "*** TEST MESSAGE: preview of campaign \"{}\". It was not sent to any audience. ***\n\n{}\n",
        campaign.name,
        text_body(campaign).trim_end()
    );

    Ok(OutgoingMessage {
        to: to.to_string(),
        subject: format!("{TEST_SUBJECT_PREFIX}{}", campaign.subject),
        html,
        text: Some(text),
        list_unsubscribe: None,
    })
}
