use std::fmt::Write as _;

use super::{NotificationKind, TemplateVariables};

/// Composed default message before addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Replace `{{name}}` placeholders with known variables. Unknown names and names without a
/// value are left exactly as written.
pub fn render_placeholders(template: &str, variables: &TemplateVariables) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                match variables.lookup(name) {
                    Some(value) => output.push_str(value),
                    None => output.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

pub fn default_message(kind: NotificationKind, variables: &TemplateVariables) -> DefaultMessage {
    match kind {
        NotificationKind::Confirmation => confirmation(variables),
        NotificationKind::Approved => approved(variables),
        NotificationKind::Rejected => rejected(variables),
        NotificationKind::ManualFulfillment => manual_fulfillment(variables),
    }
}

fn confirmation(vars: &TemplateVariables) -> DefaultMessage {
    let subject = format!("We received your {} submission", vars.content());
    let mut paragraphs = vec![format!(
        "Thanks for sharing your {} with {}! Our team will review it and email you as soon as a decision is made.",
        vars.content(),
        vars.shop()
    )];
    if let Some(number) = &vars.submission_number {
        paragraphs.push(format!("Your submission number is #{number}."));
    }
    build(subject, vars.greeting_name(), paragraphs, None)
}

fn approved(vars: &TemplateVariables) -> DefaultMessage {
    let subject = format!("Your {} submission was approved!", vars.content());
    let mut paragraphs = vec![format!(
        "Great news: {} approved your {}.",
        vars.shop(),
        vars.content()
    )];
    let mut highlight = None;

    match (&vars.discount_code, &vars.reward_value) {
        (Some(code), value) => {
            let reward = value.as_deref().unwrap_or("your reward");
            paragraphs.push(format!("Here is {reward}. Use this code at checkout:"));
            highlight = Some(Highlight {
                after: paragraphs.len() - 1,
                code: code.clone(),
            });
            if let Some(expires) = &vars.expires_on {
                paragraphs.push(format!("The code can be used once and expires on {expires}."));
            }
        }
        (None, Some(value)) => {
            paragraphs.push(format!(
                "Your reward ({value}) is being prepared and will be sent to you shortly."
            ));
        }
        (None, None) => paragraphs.push("Thank you for contributing!".to_string()),
    }

    if let Some(message) = vars
        .additional_message
        .as_ref()
        .filter(|message| !message.trim().is_empty())
    {
        paragraphs.push(message.clone());
    }

    build(subject, vars.greeting_name(), paragraphs, highlight)
}

fn rejected(vars: &TemplateVariables) -> DefaultMessage {
    let subject = format!("An update on your {} submission", vars.content());
    let mut paragraphs = vec![format!(
        "Thank you for sending your {} to {}. Unfortunately it was not approved this time.",
        vars.content(),
        vars.shop()
    )];
    if let Some(message) = vars
        .additional_message
        .as_ref()
        .filter(|message| !message.trim().is_empty())
    {
        paragraphs.push(format!("Note from the team: {message}"));
    }
    paragraphs.push("You are welcome to submit again.".to_string());
    build(subject, vars.greeting_name(), paragraphs, None)
}

fn manual_fulfillment(vars: &TemplateVariables) -> DefaultMessage {
    let reward = vars.reward_value.as_deref().unwrap_or("a reward");
    let number = vars.submission_number.as_deref().unwrap_or("?");
    let subject = format!("Action needed: send {reward} for submission #{number}");
    let mut paragraphs = vec![format!(
        "Submission #{number} was approved and its reward ({reward}) must be fulfilled manually."
    )];
    if let Some(email) = &vars.customer_email {
        paragraphs.push(format!("Customer email: {email}"));
    }
    if let Some(paypal) = &vars.paypal_email {
        paragraphs.push(format!("PayPal email on file: {paypal}"));
    }
    if let Some(job) = &vars.job_title {
        paragraphs.push(format!("Job: {job}"));
    }
    paragraphs.push("Record the fulfillment in the rewards dashboard once it is sent.".to_string());
    build(subject, "team", paragraphs, None)
}

/// Code block rendered right after the paragraph at index `after`.
struct Highlight {
    after: usize,
    code: String,
}

impl Highlight {
    fn follows(highlight: &Option<Highlight>, index: usize) -> Option<&str> {
        highlight
            .as_ref()
            .filter(|highlight| highlight.after == index)
            .map(|highlight| highlight.code.as_str())
    }
}

fn build(
    subject: String,
    greeting_name: &str,
    paragraphs: Vec<String>,
    highlight: Option<Highlight>,
) -> DefaultMessage {
    let mut text = format!("Hi {greeting_name},\n\n");
    for (index, paragraph) in paragraphs.iter().enumerate() {
        text.push_str(paragraph);
        text.push_str("\n\n");
        if let Some(code) = Highlight::follows(&highlight, index) {
            text.push_str(code);
            text.push_str("\n\n");
        }
    }

    let mut body = String::new();
    let _ = write!(
        body,
        "<p style=\"margin:0 0 16px;\">Hi {},</p>",
        escape_html(greeting_name)
    );
    for (index, paragraph) in paragraphs.iter().enumerate() {
        let _ = write!(
            body,
            "<p style=\"margin:0 0 16px;\">{}</p>",
            escape_html(paragraph)
        );
        if let Some(code) = Highlight::follows(&highlight, index) {
            let _ = write!(
                body,
                "<p style=\"margin:0 0 16px;padding:12px 16px;background:#f4f6f8;border:1px dashed #5c6ac4;font-family:monospace;font-size:20px;letter-spacing:2px;text-align:center;\">{}</p>",
                escape_html(code)
            );
        }
    }

    DefaultMessage {
        subject,
        text: text.trim_end().to_string(),
        html: wrap_html(&body),
    }
}

/// HTML rendition of a plain-text custom body.
pub fn html_from_text(text: &str) -> String {
    let body = text
        .split("\n\n")
        .map(|paragraph| {
            format!(
                "<p style=\"margin:0 0 16px;\">{}</p>",
                escape_html(paragraph).replace('\n', "<br>")
            )
        })
        .collect::<Vec<_>>()
        .join("");
    wrap_html(&body)
}

fn wrap_html(body: &str) -> String {
    format!(
        "<div style=\"font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;max-width:560px;margin:0 auto;padding:24px;color:#212b36;line-height:1.5;\">{body}</div>"
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables() -> TemplateVariables {
        TemplateVariables {
            content_type: Some("photo".to_string()),
            customer_name: Some("Ada".to_string()),
            discount_code: Some("UGC-1A2B3C4D".to_string()),
            reward_value: Some("20% off".to_string()),
            ..TemplateVariables::default()
        }
    }

    #[test]
    fn known_placeholders_are_substituted() {
        let rendered = render_placeholders(
            "Hi {{customerName}}, use {{ discountCode }} on your next {{type}} order",
            &variables(),
        );
        assert_eq!(rendered, "Hi Ada, use UGC-1A2B3C4D on your next photo order");
    }

    #[test]
    fn unmatched_placeholders_are_left_verbatim() {
        let rendered = render_placeholders(
            "{{unknownThing}} and {{additionalMessage}} and {{ broken",
            &variables(),
        );
        assert_eq!(
            rendered,
            "{{unknownThing}} and {{additionalMessage}} and {{ broken"
        );
    }

    #[test]
    fn approved_default_highlights_the_code() {
        let message = default_message(NotificationKind::Approved, &variables());
        assert!(message.subject.contains("approved"));
        assert!(message.text.contains("UGC-1A2B3C4D"));
        assert!(message.html.contains("UGC-1A2B3C4D"));
        assert!(message.html.contains("style="));
    }

    #[test]
    fn code_appears_once_when_the_merchant_note_ends_with_a_colon() {
        let mut vars = variables();
        vars.additional_message = Some("Note:".to_string());
        let message = default_message(NotificationKind::Approved, &vars);
        assert_eq!(message.text.matches("UGC-1A2B3C4D").count(), 1);
        assert_eq!(message.html.matches("UGC-1A2B3C4D").count(), 1);
        assert!(message.text.ends_with("Note:"));
    }

    #[test]
    fn rejected_default_includes_additional_message() {
        let mut vars = variables();
        vars.additional_message = Some("Please show the product label".to_string());
        let message = default_message(NotificationKind::Rejected, &vars);
        assert!(message.text.contains("Please show the product label"));
    }

    #[test]
    fn html_from_text_escapes_markup() {
        let html = html_from_text("<b>bold</b>\nline two");
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;<br>line two"));
    }
}
