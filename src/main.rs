// author: kodeholic

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mini_conductor::{config, run_conductor, ConductorArgs};

#[derive(Parser)]
#[command(
    name    = "conductor",
    about   = "mini-conductor WebRTC 협상 컨덕터 (Janus 시그널링)",
    version,
)]
struct Cli {
    /// 시그널링 서버 WebSocket URL
    #[arg(long, default_value = config::DEFAULT_SIGNALING_URL)]
    signaling_url: String,

    /// 로그인 사용자
    #[arg(long, default_value = config::DEFAULT_LOGIN_USER)]
    user: String,

    /// 로그인 비밀값
    #[arg(long, env = "CONDUCTOR_SECRET", default_value = config::DEFAULT_LOGIN_SECRET, hide_env_values = true)]
    secret: String,

    /// 컨트롤 API 포트
    #[arg(long, default_value_t = config::CONTROL_PORT)]
    control_port: u16,

    /// 시작 시 자동 로그인 하지 않음
    #[arg(long)]
    no_login: bool,
}

#[tokio::main]
async fn main() {
    // 환경 변수 기반 로깅 초기화 (기본값: info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let args = ConductorArgs {
        signaling_url: cli.signaling_url,
        user:          cli.user,
        secret:        cli.secret,
        control_port:  cli.control_port,
        auto_login:    !cli.no_login,
    };

    if let Err(e) = run_conductor(args).await {
        error!("[mini-conductor] {}", e);
        std::process::exit(1);
    }
}
