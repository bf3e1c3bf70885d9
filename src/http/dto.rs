// author: kodeholic
// HTTP 응답 DTO

use serde::{Deserialize, Serialize};

use crate::core::SessionSnapshot;
use crate::ui::UiSnapshot;

/// GET /admin/status 응답
#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub session:     SessionSnapshot,
    pub ui:          UiSnapshot,
}

/// POST /admin/* 조작 응답: 명령은 owner 루프에 접수만 된다
#[derive(Serialize, Deserialize, Debug)]
pub struct CommandAccepted {
    pub ok:      bool,
    pub command: String,
}

impl CommandAccepted {
    pub fn new(command: &str) -> Self {
        Self { ok: true, command: command.to_string() }
    }
}
