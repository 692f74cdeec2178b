use anyhow::bail;
use serde::Deserialize;
use serde_json::Value;

/// Status part of the Sol-Ark Cloud response envelope.
///
/// The payload itself stays raw: its shape is not stable enough to deserialize into a structure.
/// Some deployments do not wrap the responses at all, in which case there is nothing to check.
#[derive(Default, Deserialize)]
pub struct Status {
    /// Error code: anything but zero means the request failed.
    #[serde(default)]
    code: Option<Value>,

    #[serde(default, rename = "msg")]
    message: Option<Value>,
}

impl Status {
    pub fn check(body: &Value) -> crate::prelude::Result {
        if !body.is_object() {
            return Ok(());
        }
        Self::deserialize(body).unwrap_or_default().into()
    }

    fn is_success(&self) -> bool {
        match &self.code {
            None | Some(Value::Null) => true,
            Some(Value::Number(code)) => code.as_i64() == Some(0),
            Some(Value::String(code)) => code == "0",
            Some(_) => false,
        }
    }
}

impl From<Status> for crate::prelude::Result {
    fn from(status: Status) -> Self {
        if status.is_success() {
            return Ok(());
        }
        let code = status.code.unwrap_or_default();
        match status.message.as_ref().and_then(Value::as_str) {
            Some(message) => bail!(r#"Sol-Ark Cloud error {code} ("{message}")"#),
            None => bail!("Sol-Ark Cloud error {code}"),
        }
    }
}
