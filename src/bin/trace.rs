// author: kodeholic
//
// cdtrace: mini-conductor 실시간 협상 이벤트 관찰 CLI
//
// 사용법:
//   cdtrace [--host HOST] [--port PORT] [--filter KIND] [PEER_ID]
//
// 예시:
//   cdtrace                      # 전체 이벤트 스트림
//   cdtrace 0                    # peer 0 (janus) 관련만
//   cdtrace --filter candidate   # CANDIDATE 이벤트만
//   cdtrace -f teardown 0        # peer 0 + TEARDOWN 만
//   cdtrace --session            # 세션 생명주기(NEGOTIATING/ACTIVE/TEARDOWN...)만
//
// PHASE 컬럼은 스트림에서 추적한 세션 phase (idle / negotiating / active).
// 스트림 종료 시 협상 성공/종료/드롭 건수를 요약한다.

use clap::Parser;
use colored::Colorize;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::{BufRead, BufReader};

// ----------------------------------------------------------------------------
// [CLI 인자]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "cdtrace",
    about   = "mini-conductor 실시간 협상 이벤트 스트림 관찰",
    version,
)]
struct Cli {
    /// 컨트롤 API 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 컨트롤 API 포트
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// 이벤트 종류 필터 (예: offer, candidate, teardown)
    /// 대소문자 무관, kind 부분 일치
    #[arg(long, short = 'f')]
    filter: Option<String>,

    /// 세션 생명주기 이벤트만 표시
    #[arg(long, short = 's')]
    session: bool,

    /// 관찰할 peer_id (생략 시 전체)
    peer_id: Option<i32>,
}

// ----------------------------------------------------------------------------
// [TraceEvent 역직렬화]: src/trace.rs 와 동일 구조
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TraceEvent {
    ts:      u64,
    dir:     String, // "in" | "out" | "sys"
    peer_id: Option<i32>,
    kind:    String,
    summary: String,
}

// ----------------------------------------------------------------------------
// [세션 phase 추적]: 컨덕터가 발행하는 생명주기 kind 로 phase 를 따라간다
// ----------------------------------------------------------------------------

const LIFECYCLE_KINDS: [&str; 7] = [
    "SIGNED_IN", "NEGOTIATING", "LOOPBACK", "ACTIVE", "TEARDOWN", "DROPPED", "EXPIRED",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Negotiating,
    Active,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle        => "idle",
            Phase::Negotiating => "negotiating",
            Phase::Active      => "active",
        }
    }
}

#[derive(Debug)]
struct PhaseTracker {
    phase:       Phase,
    established: u64,
    teardowns:   u64,
    dropped:     u64,
}

impl PhaseTracker {
    fn new() -> Self {
        Self { phase: Phase::Idle, established: 0, teardowns: 0, dropped: 0 }
    }

    /// kind 반영 후 현재 phase 반환
    fn observe(&mut self, kind: &str) -> Phase {
        match kind {
            "NEGOTIATING" | "LOOPBACK" => self.phase = Phase::Negotiating,
            "ACTIVE" => {
                if self.phase != Phase::Active {
                    self.established += 1;
                }
                self.phase = Phase::Active;
            }
            "TEARDOWN" => {
                self.teardowns += 1;
                self.phase = Phase::Idle;
            }
            "DROPPED" => self.dropped += 1,
            _ => {}
        }
        self.phase
    }
}

fn is_lifecycle(kind: &str) -> bool {
    LIFECYCLE_KINDS.contains(&kind)
}

// ----------------------------------------------------------------------------
// [메인]
// ----------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    let url = match cli.peer_id {
        Some(id) => format!("http://{}:{}/trace/{}", cli.host, cli.port, id),
        None     => format!("http://{}:{}/trace",    cli.host, cli.port),
    };

    let filter = cli.filter.as_ref().map(|s| s.to_lowercase());

    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {} {}  {}  {}",
        "cdtrace".bold().cyan(),
        "▶".green(),
        url.dimmed(),
        filter.as_deref()
            .map(|f| format!("[filter: {}]", f).yellow().to_string())
            .unwrap_or_default(),
    );
    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {:<12} {:<6} {:<5} {:<11} {:<18} {}",
        "TIME".dimmed(),
        "DIR".dimmed(),
        "PEER".dimmed(),
        "PHASE".dimmed(),
        "KIND".dimmed(),
        "SUMMARY".dimmed(),
    );
    println!("{}", "─".repeat(90).dimmed());

    // SSE 스트림이라 타임아웃 없음
    let client = match Client::builder().timeout(None).build() {
        Ok(c)  => c,
        Err(e) => {
            eprintln!("{} reqwest client 생성 실패: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    let resp = match client
        .get(&url)
        .header("Accept", "text/event-stream")
        .send()
    {
        Ok(r)  => r,
        Err(e) => {
            eprintln!("{} 컨덕터 연결 실패: {}", "✗".red(), e);
            eprintln!("  컨덕터가 실행 중인지 확인하세요: {}", url.dimmed());
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        eprintln!("{} HTTP {}", "✗".red(), resp.status());
        std::process::exit(1);
    }

    let reader = BufReader::new(resp);
    let mut event_count: u64 = 0;
    let mut tracker = PhaseTracker::new();

    for line in reader.lines() {
        let line = match line {
            Ok(l)  => l,
            Err(e) => {
                eprintln!("{} 스트림 읽기 실패: {}", "✗".red(), e);
                break;
            }
        };

        // SSE 포맷: "data: {JSON}" 또는 ": keep-alive" 또는 빈 줄
        let json_str = match line.strip_prefix("data: ") {
            Some(rest) => rest,
            None       => continue,
        };

        let event: TraceEvent = match serde_json::from_str(json_str) {
            Ok(e)  => e,
            Err(e) => {
                eprintln!("{} JSON 파싱 실패: {} ({})", "⚠".yellow(), e, json_str);
                continue;
            }
        };

        // 필터와 무관하게 phase 는 모든 이벤트로 추적
        let phase = tracker.observe(&event.kind);

        if cli.session && !is_lifecycle(&event.kind) {
            continue;
        }
        if let Some(ref f) = filter {
            if !event.kind.to_lowercase().contains(f.as_str()) {
                continue;
            }
        }

        print_event(&event, phase);
        event_count += 1;
    }

    println!("{}", "─".repeat(90).dimmed());
    println!("  스트림 종료 (총 {} 이벤트)", event_count);
    println!(
        "  세션 성립 {} / 종료 {} / 드롭 {} (마지막 phase: {})",
        tracker.established.to_string().green(),
        tracker.teardowns.to_string().red(),
        tracker.dropped.to_string().yellow(),
        colorize_phase(tracker.phase),
    );
}

// ----------------------------------------------------------------------------
// [이벤트 출력]
// ----------------------------------------------------------------------------

fn print_event(e: &TraceEvent, phase: Phase) {
    let dir_str = match e.dir.as_str() {
        "in"  => "↓ IN ".bright_blue().to_string(),
        "out" => "↑ OUT".bright_green().to_string(),
        "sys" => "· SYS".bright_yellow().to_string(),
        other => other.dimmed().to_string(),
    };

    let peer_str = e.peer_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());

    println!(
        "  {} {} {:<5} {:<11} {:<18} {}",
        format_ts(e.ts).dimmed(),
        dir_str,
        peer_str.bright_white(),
        colorize_phase(phase),
        colorize_kind(&e.kind),
        e.summary.dimmed(),
    );
}

fn colorize_kind(kind: &str) -> String {
    match kind {
        "ACTIVE" | "SIGNED_IN"         => kind.bright_green().bold().to_string(),
        "NEGOTIATING" | "LOOPBACK"     => kind.yellow().bold().to_string(),
        "TEARDOWN" | "UI_ERROR"        => kind.bright_red().bold().to_string(),
        "DROPPED" | "UNMATCHED" | "EXPIRED" => kind.red().to_string(),
        "OFFER" | "ANSWER"             => kind.bright_cyan().to_string(),
        "CANDIDATE"                    => kind.bright_magenta().to_string(),
        k if k.starts_with("JANUS_")   => kind.blue().to_string(),
        k if k.starts_with("UI_")      => kind.bright_yellow().to_string(),
        _                              => kind.normal().to_string(),
    }
}

fn colorize_phase(phase: Phase) -> String {
    let label = format!("{:<11}", phase.as_str());
    match phase {
        Phase::Idle        => label.dimmed().to_string(),
        Phase::Negotiating => label.yellow().to_string(),
        Phase::Active      => label.green().bold().to_string(),
    }
}

/// Unix millis → "HH:MM:SS.mmm" (UTC)
fn format_ts(ts_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_follows_session_lifecycle() {
        let mut t = PhaseTracker::new();
        assert_eq!(t.observe("OFFER"), Phase::Idle);
        assert_eq!(t.observe("NEGOTIATING"), Phase::Negotiating);
        assert_eq!(t.observe("CANDIDATE"), Phase::Negotiating);
        assert_eq!(t.observe("ACTIVE"), Phase::Active);
        assert_eq!(t.observe("ACTIVE"), Phase::Active);
        assert_eq!(t.observe("DROPPED"), Phase::Active);
        assert_eq!(t.observe("TEARDOWN"), Phase::Idle);
        assert_eq!((t.established, t.teardowns, t.dropped), (1, 1, 1));
    }

    #[test]
    fn loopback_enters_negotiating() {
        let mut t = PhaseTracker::new();
        assert_eq!(t.observe("LOOPBACK"), Phase::Negotiating);
        assert_eq!(t.observe("ACTIVE"), Phase::Active);
        assert_eq!(t.established, 1);
    }

    #[test]
    fn lifecycle_kinds_exclude_signaling_payloads() {
        assert!(is_lifecycle("TEARDOWN"));
        assert!(!is_lifecycle("CANDIDATE"));
        assert!(!is_lifecycle("JANUS_ACK"));
    }
}
