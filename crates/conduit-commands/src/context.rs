use crate::deployment::DeploymentInfoProvider;

/// Everything a handler needs to inspect the triggering message and touch
/// the identity/history stores, without depending on any particular ingress
/// transport (§4.5).
pub struct CommandContext<'a> {
    pub identity_conn: &'a rusqlite::Connection,
    pub history_conn: &'a rusqlite::Connection,
    pub chat_id: i64,
    pub username: Option<String>,
    pub text: String,
    /// The full, unredacted ingress payload — only `/debug` reads this.
    pub raw_event: serde_json::Value,
    pub deployment: &'a dyn DeploymentInfoProvider,
}

impl<'a> CommandContext<'a> {
    /// The argument portion of the command, i.e. everything after the verb
    /// and its following whitespace. `"/bind 482013"` → `"482013"`.
    pub fn args(&self) -> &str {
        self.text.splitn(2, char::is_whitespace).nth(1).unwrap_or("").trim()
    }

    pub fn verb(&self) -> &str {
        self.text.splitn(2, char::is_whitespace).next().unwrap_or("")
    }
}
