use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{Datelike, Days, NaiveDate};

use crate::domain::email::Email;
use crate::gmail::MailApi;
use crate::gmail::types::{Message, MessagePart};

/// Subject filter plus an `after:` lower bound of yesterday, in Gmail's
/// unpadded y/m/d form.
pub fn build_query(subject: &str, today: NaiveDate) -> String {
    let after = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    format!(
        "subject:({}) AND after:{}/{}/{}",
        subject,
        after.year(),
        after.month(),
        after.day()
    )
}

/// List ids matching the query, then get and reduce each message, in order.
/// Zero matches is a normal empty result; any get failure aborts the run.
pub fn fetch_matching(api: &dyn MailApi, query: &str) -> Result<Vec<Email>> {
    let ids = api.list_message_ids(query)?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut emails = Vec::with_capacity(ids.len());
    for id in ids {
        log::debug!("fetching message {id}");
        let msg = api
            .get_message(&id)
            .with_context(|| format!("unable to retrieve message {id}"))?;
        emails.push(email_from(msg));
    }
    Ok(emails)
}

fn email_from(msg: Message) -> Email {
    let id = msg.id.unwrap_or_default();
    let date = msg
        .internal_date
        .as_deref()
        .and_then(|d| d.parse().ok())
        .unwrap_or(0);
    let (from, subject) = msg.payload.as_ref().map(extract_headers).unwrap_or_default();
    let body = msg.payload.as_ref().map(extract_plain_body).unwrap_or_default();

    Email {
        id,
        date,
        body,
        subject,
        from,
    }
}

/// Exact-case "From"/"Subject" scan; the last occurrence wins when a header repeats.
fn extract_headers(payload: &MessagePart) -> (String, String) {
    let mut from = String::new();
    let mut subject = String::new();
    for h in payload.headers.as_deref().unwrap_or_default() {
        match (h.name.as_deref(), h.value.as_deref()) {
            (Some("From"), Some(v)) => from = v.to_string(),
            (Some("Subject"), Some(v)) => subject = v.to_string(),
            _ => {}
        }
    }
    (from, subject)
}

/// Top-level text/plain part, URL-safe base64 decoded. No matching part,
/// a decode failure, or non-UTF-8 content all yield an empty body.
fn extract_plain_body(payload: &MessagePart) -> String {
    let mut body = String::new();
    for part in payload.parts.as_deref().unwrap_or_default() {
        if part.mime_type.as_deref() == Some("text/plain") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                body = decode_body(data);
            }
        }
    }
    body
}

fn decode_body(data: &str) -> String {
    // Gmail sends unpadded base64url; accept padded input too.
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::MockMailApi;
    use crate::gmail::types::{Header, MessagePartBody};
    use anyhow::anyhow;

    fn header(name: &str, value: &str) -> Header {
        Header {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn part(mime_type: &str, data: Option<&str>) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: data.map(|d| MessagePartBody {
                data: Some(d.to_string()),
            }),
            ..MessagePart::default()
        }
    }

    fn message(id: &str, headers: Vec<Header>, parts: Vec<MessagePart>) -> Message {
        Message {
            id: Some(id.to_string()),
            internal_date: Some("1710500000000".to_string()),
            payload: Some(MessagePart {
                headers: Some(headers),
                parts: Some(parts),
                ..MessagePart::default()
            }),
        }
    }

    #[test]
    fn query_uses_yesterday_unpadded() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let q = build_query("Thank you for applying", today);
        assert_eq!(q, "subject:(Thank you for applying) AND after:2024/3/14");
    }

    #[test]
    fn query_handles_month_and_year_boundaries() {
        let march_first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(build_query("x", march_first).ends_with("after:2024/2/29"));

        let new_year = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(build_query("x", new_year).ends_with("after:2023/12/31"));
    }

    #[test]
    fn last_duplicate_header_wins() {
        let msg = message(
            "m1",
            vec![
                header("Subject", "first"),
                header("From", "a@example.com"),
                header("Subject", "second"),
            ],
            vec![],
        );
        let email = email_from(msg);
        assert_eq!(email.subject, "second");
        assert_eq!(email.from, "a@example.com");
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let msg = message("m1", vec![header("subject", "lowercase")], vec![]);
        assert_eq!(email_from(msg).subject, "");
    }

    #[test]
    fn plain_text_body_is_decoded() {
        let encoded = URL_SAFE.encode("hello");
        let msg = message("m1", vec![], vec![part("text/plain", Some(&encoded))]);
        assert_eq!(email_from(msg).body, "hello");
    }

    #[test]
    fn unpadded_body_is_decoded() {
        let msg = message("m1", vec![], vec![part("text/plain", Some("aGVsbG8"))]);
        assert_eq!(email_from(msg).body, "hello");
    }

    #[test]
    fn missing_plain_part_yields_empty_body() {
        let msg = message(
            "m1",
            vec![],
            vec![part("text/html", Some(&URL_SAFE.encode("<b>hi</b>")))],
        );
        assert_eq!(email_from(msg).body, "");
    }

    #[test]
    fn undecodable_body_is_silently_empty() {
        let msg = message("m1", vec![], vec![part("text/plain", Some("%%%"))]);
        assert_eq!(email_from(msg).body, "");
    }

    #[test]
    fn internal_date_is_parsed_with_zero_fallback() {
        let mut msg = message("m1", vec![], vec![]);
        assert_eq!(email_from(msg.clone()).date, 1_710_500_000_000);

        msg.internal_date = Some("not-a-number".to_string());
        assert_eq!(email_from(msg).date, 0);
    }

    #[test]
    fn zero_results_is_an_empty_ok() {
        let mut api = MockMailApi::new();
        api.expect_list_message_ids().returning(|_| Ok(Vec::new()));
        api.expect_get_message().times(0);

        let emails = fetch_matching(&api, "subject:(x)").unwrap();
        assert!(emails.is_empty());
    }

    #[test]
    fn fetches_every_listed_message() {
        let mut api = MockMailApi::new();
        api.expect_list_message_ids()
            .returning(|_| Ok(vec!["a".into(), "b".into()]));
        api.expect_get_message()
            .times(2)
            .returning(|id| Ok(message(id, vec![header("Subject", id)], vec![])));

        let emails = fetch_matching(&api, "q").unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].id, "a");
        assert_eq!(emails[1].subject, "b");
    }

    #[test]
    fn get_failure_aborts_the_whole_run() {
        let mut api = MockMailApi::new();
        api.expect_list_message_ids()
            .returning(|_| Ok(vec!["a".into(), "b".into()]));
        api.expect_get_message()
            .withf(|id| id == "a")
            .returning(|id| Ok(message(id, vec![], vec![])));
        api.expect_get_message()
            .withf(|id| id == "b")
            .returning(|_| Err(anyhow!("server error")));

        assert!(fetch_matching(&api, "q").is_err());
    }

    #[test]
    fn list_failure_aborts() {
        let mut api = MockMailApi::new();
        api.expect_list_message_ids()
            .returning(|_| Err(anyhow!("unauthorized")));
        api.expect_get_message().times(0);

        assert!(fetch_matching(&api, "q").is_err());
    }
}
