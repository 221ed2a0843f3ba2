/// Failures talking to the live API. None of them escape the driver; each is
/// logged and handled by the next transport transition or tick.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {path}")]
    Status {
        status: reqwest::StatusCode,
        path: &'static str,
    },
}
