// author: kodeholic
//
// cdadmin: mini-conductor 컨트롤 CLI
//
// 사용법:
//   cdadmin [--host HOST] [--port PORT] <COMMAND>
//
// 조회 명령
//   cdadmin status             세션 상태 요약 (phase, 피어, 큐, 트랜잭션)
//   cdadmin peers              시그널링 서버 피어 목록
//   cdadmin notices            최근 UI 알림
//
// 조작 명령
//   cdadmin login              시그널링 서버 로그인
//   cdadmin logout             로그아웃
//   cdadmin connect <peer_id>  피어에 offer
//   cdadmin hangup             현재 피어와 통화 종료

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tabled::{Table, Tabled};

// ----------------------------------------------------------------------------
// [CLI 정의]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "cdadmin",
    about   = "mini-conductor 컨트롤 CLI",
    version,
)]
struct Cli {
    /// 컨트롤 API 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 컨트롤 API 포트
    #[arg(long, default_value_t = 8090)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 세션 상태 요약
    Status,

    /// 피어 목록 (피어 목록 화면 기준)
    Peers,

    /// 최근 UI 알림
    Notices,

    /// 시그널링 서버 로그인
    Login,

    /// 로그아웃
    Logout,

    /// 피어에 연결 (offer)
    Connect {
        /// 대상 peer_id
        peer_id: i32,
    },

    /// 현재 피어와 통화 종료
    Hangup,
}

// ----------------------------------------------------------------------------
// [응답 타입]: http/dto.rs 와 대응
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct StatusResponse {
    uptime_secs: u64,
    session:     SessionStatus,
    ui:          UiStatus,
}

#[derive(Deserialize)]
struct SessionStatus {
    phase:                String,
    peer:                 Option<i32>,
    role:                 Option<String>,
    mode:                 Option<String>,
    loopback_pending:     bool,
    signed_in:            bool,
    queue_len:            usize,
    in_flight:            bool,
    pending_transactions: usize,
}

#[derive(Deserialize)]
struct UiStatus {
    view:            String,
    peers:           Vec<PeerRow>,
    local_renderer:  Option<String>,
    remote_renderer: Option<String>,
    notices:         Vec<NoticeRow>,
}

#[derive(Deserialize, Tabled)]
struct PeerRow {
    #[tabled(rename = "PEER ID")]
    id:   i32,
    #[tabled(rename = "NAME")]
    name: String,
}

#[derive(Deserialize, Tabled)]
struct NoticeRow {
    #[tabled(rename = "TIME")]
    #[serde(deserialize_with = "deser_ts")]
    ts:    String,
    #[tabled(rename = "TITLE")]
    title: String,
    #[tabled(rename = "TEXT")]
    text:  String,
    #[tabled(rename = "FATAL")]
    fatal: bool,
}

#[derive(Deserialize)]
struct CommandAccepted {
    command: String,
}

// ----------------------------------------------------------------------------
// [main]
// ----------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status             => cmd_status(&base),
        Command::Peers              => cmd_peers(&base),
        Command::Notices            => cmd_notices(&base),
        Command::Login              => cmd_post(&base, "/admin/login"),
        Command::Logout             => cmd_post(&base, "/admin/logout"),
        Command::Connect { peer_id } => cmd_post(&base, &format!("/admin/connect/{}", peer_id)),
        Command::Hangup             => cmd_post(&base, "/admin/hangup"),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

// ----------------------------------------------------------------------------
// [커맨드 구현]
// ----------------------------------------------------------------------------

fn cmd_status(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: StatusResponse = get_json(&format!("{}/admin/status", base))?;
    let session = &s.session;

    let hours   = s.uptime_secs / 3600;
    let minutes = (s.uptime_secs % 3600) / 60;
    let secs    = s.uptime_secs % 60;

    println!();
    println!("{}", "  mini-conductor Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}",
        "Uptime:".bold(),
        format!("{}h {}m {}s", hours, minutes, secs).green()
    );
    println!("  {:16} {}",
        "Signed In:".bold(),
        if session.signed_in { "✓ yes".green().to_string() } else { "✗ no".red().to_string() }
    );
    println!("  {:16} {}", "Phase:".bold(), colorize_phase(&session.phase));
    println!("  {:16} {}",
        "Peer:".bold(),
        session.peer.map(|p| p.to_string().yellow().to_string()).unwrap_or_else(|| "-".dimmed().to_string())
    );
    println!("  {:16} {}", "Role:".bold(), session.role.as_deref().unwrap_or("-"));
    println!("  {:16} {}{}",
        "Mode:".bold(),
        session.mode.as_deref().unwrap_or("-"),
        if session.loopback_pending { " (pending)".yellow().to_string() } else { String::new() }
    );
    println!("  {:16} {}{}",
        "Queue:".bold(),
        session.queue_len.to_string().yellow(),
        if session.in_flight { " + 1 in flight".dimmed().to_string() } else { String::new() }
    );
    println!("  {:16} {}", "Transactions:".bold(), session.pending_transactions.to_string().yellow());
    println!("  {:16} {}", "View:".bold(), s.ui.view.cyan());
    println!("  {:16} {}", "Local Video:".bold(),  s.ui.local_renderer.as_deref().unwrap_or("-").dimmed());
    println!("  {:16} {}", "Remote Video:".bold(), s.ui.remote_renderer.as_deref().unwrap_or("-").dimmed());
    println!();
    Ok(())
}

fn cmd_peers(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: StatusResponse = get_json(&format!("{}/admin/status", base))?;

    if s.ui.peers.is_empty() {
        println!("{}", "  표시 중인 피어 없음".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", Table::new(&s.ui.peers).to_string());
    println!("  {} peer(s)", s.ui.peers.len());
    println!();
    Ok(())
}

fn cmd_notices(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: StatusResponse = get_json(&format!("{}/admin/status", base))?;

    if s.ui.notices.is_empty() {
        println!("{}", "  알림 없음".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", Table::new(&s.ui.notices).to_string());
    println!();
    Ok(())
}

fn cmd_post(base: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::blocking::Client::new();
    let resp   = client.post(format!("{}{}", base, path)).send()?;

    let status = resp.status();
    if status.is_success() {
        let body: CommandAccepted = resp.json()?;
        println!();
        println!("  {} {}", "Accepted".green().bold(), body.command.cyan());
        println!();
        return Ok(());
    }

    let body: serde_json::Value = resp.json().unwrap_or_default();
    let msg = body["error"].as_str().unwrap_or("unknown error");
    match body["phase"].as_str() {
        Some(phase) => Err(format!("[{}] {} (phase={})", status, msg, phase).into()),
        None        => Err(format!("[{}] {}", status, msg).into()),
    }
}

// ----------------------------------------------------------------------------
// [공통 유틸]
// ----------------------------------------------------------------------------

fn colorize_phase(phase: &str) -> String {
    match phase {
        "active"      => phase.green().bold().to_string(),
        "negotiating" => phase.yellow().to_string(),
        _             => phase.dimmed().to_string(),
    }
}

/// Unix millis JSON → "HH:MM:SS" 문자열
fn deser_ts<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let ms: u64 = serde::Deserialize::deserialize(d)?;
    Ok(format_ts(ms))
}

/// GET 요청 + JSON 역직렬화
fn get_json<T: for<'de> serde::Deserialize<'de>>(url: &str) -> Result<T, Box<dyn std::error::Error>> {
    let resp = reqwest::blocking::get(url)?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }
    Ok(resp.json()?)
}

/// Unix millis → "HH:MM:SS" (UTC)
fn format_ts(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
