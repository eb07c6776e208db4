use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

// https://docs.nextcloud.com/server/latest/developer_manual/client_apis/LoginFlow/index.html#login-flow-v2
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginFlowInit {
    pub poll: PollEndpoint,
    pub login: SmolStr,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PollEndpoint {
    pub token: SmolStr,
    pub endpoint: SmolStr,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PollRequest<'a> {
    pub token: &'a str,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginFlowCredentials {
    pub server: SmolStr,
    pub login_name: SmolStr,
    pub app_password: SmolStr,
}

impl std::fmt::Debug for LoginFlowCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlowCredentials")
            .field("server", &self.server)
            .field("login_name", &self.login_name)
            .field("app_password", &"<redacted>")
            .finish()
    }
}
