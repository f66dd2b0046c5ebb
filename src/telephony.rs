use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::Error;

pub const EMERGENCY_MESSAGE: &str =
    "This is an emergency alert from MindMate. A student has triggered an SOS \
     and needs immediate support. Please respond as soon as possible.";

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// Client for the provider's outbound call-creation API. Delivery failures
/// are returned to the caller, never swallowed, so the SOS handler can tell
/// "alert recorded" apart from "call failed".
#[derive(Debug, Clone)]
pub struct Telephony {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

enum CallFailure {
    Transient(String),
    Permanent(String),
}

impl Telephony {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_from_number.clone(),
        }
    }

    /// Places one emergency call, retrying transient provider failures with
    /// backoff. Transport errors and 5xx responses are retried up to
    /// [`MAX_ATTEMPTS`] times; a 4xx response fails immediately.
    pub async fn place_call(&self, to: &str) -> Result<(), Error> {
        let mut attempt = 1;
        loop {
            match self.try_call(to).await {
                Ok(()) => {
                    log::info!("Emergency call to `{}` accepted by provider", to);
                    return Ok(());
                }
                Err(CallFailure::Permanent(message)) => {
                    log::error!("Emergency call to `{}` rejected: {}", to, message);
                    return Err(Error::TelephonyFailure { message });
                }
                Err(CallFailure::Transient(message)) => {
                    if attempt >= MAX_ATTEMPTS {
                        log::error!(
                            "Emergency call to `{}` failed after {} attempts: {}",
                            to,
                            attempt,
                            message
                        );
                        return Err(Error::TelephonyFailure { message });
                    }
                    let delay = backoff_ms(attempt);
                    log::warn!(
                        "Emergency call attempt {} to `{}` failed ({}), retrying in {}ms",
                        attempt,
                        to,
                        message,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_call(&self, to: &str) -> Result<(), CallFailure> {
        let twiml = twiml_say(EMERGENCY_MESSAGE);
        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Twiml", twiml.as_str()),
        ];
        let response = self
            .client
            .post(self.calls_endpoint())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|err| CallFailure::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("Call provider returned {}: {}", status, body);
        if is_retryable(status) {
            Err(CallFailure::Transient(message))
        } else {
            Err(CallFailure::Permanent(message))
        }
    }

    fn calls_endpoint(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.account_sid
        )
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn backoff_ms(attempt: u32) -> u64 {
    BACKOFF_BASE_MS * 2u64.pow(attempt - 1)
}

fn twiml_say(message: &str) -> String {
    format!("<Response><Say>{}</Say></Response>", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_embeds_emergency_message() {
        let twiml = twiml_say(EMERGENCY_MESSAGE);
        assert!(twiml.starts_with("<Response><Say>"));
        assert!(twiml.contains(EMERGENCY_MESSAGE));
        assert!(twiml.ends_with("</Say></Response>"));
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_ms(1), 500);
        assert_eq!(backoff_ms(2), 1000);
    }
}
