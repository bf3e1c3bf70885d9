// author: kodeholic
// 매직 넘버를 배제하고 컨덕터 전체의 동작과 한계를 제어하는 상수 모음입니다.

// ----------------------------------------------------------------------------
// 시그널링 서버 접속
// ----------------------------------------------------------------------------

/// 기본 시그널링 서버 (Janus WebSocket 엔드포인트)
pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:8188";

/// Janus WS 서브프로토콜
pub const SIGNALING_SUBPROTOCOL: &str = "janus-protocol";

/// 로그인 자격증명 기본값
/// 운영 환경에서는 환경변수 CONDUCTOR_SECRET 으로 오버라이드 할 것
pub const DEFAULT_LOGIN_USER: &str = "1234";
pub const DEFAULT_LOGIN_SECRET: &str = "1111";

/// Janus 서버는 그 자체가 통화 상대: peer id 고정
pub const SIGNALING_SERVER_PEER_ID: i32 = 0;

/// 시그널링 서버 표시 이름 (피어 목록용)
pub const SIGNALING_SERVER_PEER_NAME: &str = "janus";

/// Janus 세션 keepalive 주기 (서버 세션 타임아웃 60초보다 짧게)
pub const KEEPALIVE_INTERVAL_MS: u64 = 25_000;

// ----------------------------------------------------------------------------
// 엔진 세션 설정
// ----------------------------------------------------------------------------

/// ICE 서버 URI
pub const ICE_SERVER_URI: &str = "stun:stun.l.google.com:19302";

/// 로컬 미디어 스트림/트랙 라벨
pub const STREAM_ID: &str = "stream_id";
pub const AUDIO_LABEL: &str = "audio_label";
pub const VIDEO_LABEL: &str = "video_label";

// ----------------------------------------------------------------------------
// owner 루프 / 큐
// ----------------------------------------------------------------------------

/// WS writer 태스크 송신 큐 사이즈 (in-flight 1건 원칙이므로 작게)
pub const TRANSPORT_QUEUE_SIZE: usize = 16;

/// 트레이스 브로드캐스트 버퍼: 초과 시 오래된 이벤트 drop
pub const TRACE_BUF: usize = 512;

// ----------------------------------------------------------------------------
// 트랜잭션 상관관계 (success/error 응답 매칭)
// ----------------------------------------------------------------------------

/// 트랜잭션 토큰 길이 (영숫자)
pub const TRANSACTION_TOKEN_LEN: usize = 12;

/// 응답 없는 트랜잭션 만료 시간 (30초)
pub const TRANSACTION_TIMEOUT_MS: u64 = 30_000;

/// 트랜잭션 reaper 실행 주기 (10초)
pub const TRANSACTION_REAPER_INTERVAL_MS: u64 = 10_000;

// ----------------------------------------------------------------------------
// 컨트롤 HTTP API
// ----------------------------------------------------------------------------

/// 컨트롤 API TCP 포트
pub const CONTROL_PORT: u16 = 8090;

/// ControlSurface 가 보관하는 최근 알림 수
pub const UI_NOTICE_HISTORY: usize = 32;

/// SSE keep-alive 주기 (15초)
pub const SSE_KEEP_ALIVE_SECS: u64 = 15;
