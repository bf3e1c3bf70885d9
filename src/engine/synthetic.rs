// author: kodeholic
// SyntheticEngine: 네이티브 미디어 스택 없이 협상만 수행하는 내장 엔진
//
// 시그널링 진단용 (루프백 자가진단 포함):
//   - create_offer  : audio/video 2개 섹션 BUNDLE offer 조립
//   - create_answer : 원격 offer 의 미디어 라인(m=, a=rtpmap 등) 미러링
//   - set_local     : 섹션마다 host candidate 1개 trickle
//   - set_remote    : 원격 섹션마다 RemoteTrackAdded, 사라진 섹션은 RemoteTrackRemoved
//   - DTLS 활성 세션만 a=fingerprint / a=setup 라인 포함
//
// 모든 결과는 EngineSink 로 보고. 세션 락을 쥔 채로 emit 하지 않는다.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config;
use crate::engine::{
    EngineEvent, EngineOp, EngineSink, MediaEngine, MediaTrack, SessionConfig, SessionHandle,
    TrackKind,
};
use crate::protocol::dispatch::validate_candidate;
use crate::protocol::message::{IceCandidate, SdpType, SessionDescription};
use crate::utils::{current_timestamp, random_token};

// ICE/DTLS/방향/연결 라인은 로컬 값으로 교체: 원격 offer 에서 제외
const SKIP_PREFIXES: [&str; 11] = [
    "a=ice-", "a=fingerprint", "a=setup", "a=candidate",
    "a=sendrecv", "a=sendonly", "a=recvonly", "a=inactive",
    "a=rtcp-mux", "a=rtcp-rsize", "c=",
];

struct SyntheticSession {
    sink:             EngineSink,
    config:           SessionConfig,
    ufrag:            String,
    pwd:              String,
    fingerprint:      String,
    port:             u16,
    local:            Option<SessionDescription>,
    remote:           Option<SessionDescription>,
    remote_tracks:    Vec<MediaTrack>,
    remote_candidates: usize,
    tracks_added:     bool,
}

pub struct SyntheticEngine {
    local_ip: String,
    sessions: Mutex<HashMap<SessionHandle, SyntheticSession>>,
}

impl SyntheticEngine {
    pub fn new(local_ip: impl Into<String>) -> Self {
        Self { local_ip: local_ip.into(), sessions: Mutex::new(HashMap::new()) }
    }

    /// 라우팅 테이블 기반 로컬 IP 로 생성
    pub fn detect() -> Self {
        Self::new(detect_local_ip())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// 세션에 작업 적용 후 락 해제, 결과 이벤트 emit
    fn with_session<F>(&self, handle: SessionHandle, op: &str, f: F)
    where
        F: FnOnce(&mut SyntheticSession, &str) -> Vec<EngineEvent>,
    {
        let (sink, events) = {
            let mut sessions = self.sessions.lock();
            let session = match sessions.get_mut(&handle) {
                Some(s) => s,
                None => {
                    warn!("[engine] {} on unknown session {}", op, handle);
                    return;
                }
            };
            let events = f(session, self.local_ip.as_str());
            (session.sink.clone(), events)
        };
        for event in events {
            sink.emit(event);
        }
    }
}

impl MediaEngine for SyntheticEngine {
    fn open_session(
        &self,
        handle: SessionHandle,
        config: &SessionConfig,
        sink:   EngineSink,
    ) -> Result<(), String> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&handle) {
            return Err(format!("session {} already open", handle));
        }
        sessions.insert(handle, SyntheticSession {
            sink,
            config:            config.clone(),
            ufrag:             random_token(16),
            pwd:               random_token(22),
            fingerprint:       random_fingerprint(),
            port:              rand::thread_rng().gen_range(40000..50000),
            local:             None,
            remote:            None,
            remote_tracks:     Vec::new(),
            remote_candidates: 0,
            tracks_added:      false,
        });
        debug!("[engine] synthetic session {} opened (ice={:?})", handle, config.ice_servers);
        Ok(())
    }

    fn create_offer(&self, handle: SessionHandle) {
        self.with_session(handle, "create_offer", |s, ip| {
            vec![EngineEvent::LocalDescription(SessionDescription::offer(build_offer(s, ip)))]
        });
    }

    fn create_answer(&self, handle: SessionHandle) {
        self.with_session(handle, "create_answer", |s, ip| {
            match &s.remote {
                Some(remote) if remote.kind == SdpType::Offer => {
                    let sdp = build_answer(&remote.sdp, s, ip);
                    vec![EngineEvent::LocalDescription(SessionDescription::answer(sdp))]
                }
                _ => vec![failed(EngineOp::CreateAnswer, "no remote offer to answer")],
            }
        });
    }

    fn set_local_description(&self, handle: SessionHandle, description: SessionDescription) {
        self.with_session(handle, "set_local_description", |s, ip| {
            let sections = media_sections(&description.sdp);
            if sections.is_empty() {
                return vec![failed(EngineOp::SetLocalDescription, "no media sections")];
            }
            let candidates = sections
                .iter()
                .enumerate()
                .map(|(index, sec)| EngineEvent::LocalCandidate(IceCandidate {
                    sdp_mid:         sec.mid.clone(),
                    sdp_mline_index: index as u32,
                    candidate:       host_candidate(ip, s.port),
                }))
                .collect();
            s.local = Some(description);
            candidates
        });
    }

    fn set_remote_description(&self, handle: SessionHandle, description: SessionDescription) {
        self.with_session(handle, "set_remote_description", |s, _| {
            let sections = media_sections(&description.sdp);
            if sections.is_empty() {
                return vec![failed(EngineOp::SetRemoteDescription, "no media sections")];
            }
            if s.config.dtls_enabled && !description.sdp.contains("a=fingerprint") {
                return vec![failed(EngineOp::SetRemoteDescription, "DTLS required but no fingerprint")];
            }

            let incoming: Vec<MediaTrack> = sections
                .iter()
                .filter_map(|sec| sec.kind.map(|k| MediaTrack::new(format!("remote-{}-{}", sec.mid, k), k)))
                .collect();

            let mut events: Vec<EngineEvent> = s.remote_tracks
                .iter()
                .filter(|t| !incoming.contains(t))
                .cloned()
                .map(EngineEvent::RemoteTrackRemoved)
                .collect();
            events.extend(
                incoming.iter()
                    .filter(|t| !s.remote_tracks.contains(t))
                    .cloned()
                    .map(EngineEvent::RemoteTrackAdded),
            );

            s.remote_tracks = incoming;
            s.remote = Some(description);
            events
        });
    }

    fn add_ice_candidate(&self, handle: SessionHandle, candidate: IceCandidate) {
        self.with_session(handle, "add_ice_candidate", |s, _| {
            match validate_candidate(&candidate.candidate) {
                Ok(()) => {
                    s.remote_candidates += 1;
                    debug!("[engine] candidate #{} mid={} accepted", s.remote_candidates, candidate.sdp_mid);
                    Vec::new()
                }
                Err(e) => vec![failed(EngineOp::AddIceCandidate, &e.to_string())],
            }
        });
    }

    fn add_local_tracks(&self, handle: SessionHandle) {
        self.with_session(handle, "add_local_tracks", |s, _| {
            if s.tracks_added {
                return Vec::new();
            }
            s.tracks_added = true;
            vec![
                EngineEvent::LocalTrackAdded(MediaTrack::new(config::AUDIO_LABEL, TrackKind::Audio)),
                EngineEvent::LocalTrackAdded(MediaTrack::new(config::VIDEO_LABEL, TrackKind::Video)),
            ]
        });
    }

    fn close_session(&self, handle: SessionHandle) {
        if self.sessions.lock().remove(&handle).is_some() {
            debug!("[engine] synthetic session {} closed", handle);
        }
    }
}

// ----------------------------------------------------------------------------
// [SDP 조립]
// ----------------------------------------------------------------------------

struct MediaSection {
    kind:        Option<TrackKind>,
    m_line:      String,
    codec_lines: Vec<String>,
    mid:         String,
}

fn media_sections(sdp: &str) -> Vec<MediaSection> {
    let mut sections: Vec<MediaSection> = Vec::new();
    let mut current: Option<MediaSection> = None;

    for line in sdp.lines().map(str::trim_end) {
        if let Some(rest) = line.strip_prefix("m=") {
            if let Some(sec) = current.take() {
                sections.push(sec);
            }
            let kind = match rest.split_whitespace().next() {
                Some("audio") => Some(TrackKind::Audio),
                Some("video") => Some(TrackKind::Video),
                _             => None,
            };
            current = Some(MediaSection {
                kind,
                m_line: line.to_string(),
                codec_lines: Vec::new(),
                mid: sections.len().to_string(),
            });
            continue;
        }

        let sec = match current.as_mut() {
            Some(s) => s,
            None    => continue,
        };

        if let Some(mid) = line.strip_prefix("a=mid:") {
            sec.mid = mid.trim().to_string();
        }
        if SKIP_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        sec.codec_lines.push(line.to_string());
    }
    if let Some(sec) = current.take() {
        sections.push(sec);
    }
    sections
}

fn session_header(sdp: &mut String, ip: &str, bundle: &[&str]) {
    let session_id = current_timestamp();
    sdp.push_str("v=0\r\n");
    sdp.push_str(&format!("o=mini-conductor {} 2 IN IP4 {}\r\n", session_id, ip));
    sdp.push_str("s=-\r\n");
    sdp.push_str("t=0 0\r\n");
    sdp.push_str(&format!("a=group:BUNDLE {}\r\n", bundle.join(" ")));
    sdp.push_str(&format!("a=msid-semantic: WMS {}\r\n", config::STREAM_ID));
}

fn transport_lines(sdp: &mut String, s: &SyntheticSession, ip: &str, setup: &str) {
    sdp.push_str(&format!("c=IN IP4 {}\r\n", ip));
    sdp.push_str(&format!("a=ice-ufrag:{}\r\n", s.ufrag));
    sdp.push_str(&format!("a=ice-pwd:{}\r\n", s.pwd));
    if s.config.dtls_enabled {
        sdp.push_str(&format!("a=fingerprint:sha-256 {}\r\n", s.fingerprint));
        sdp.push_str(&format!("a=setup:{}\r\n", setup));
    }
    sdp.push_str("a=sendrecv\r\n");
    sdp.push_str("a=rtcp-mux\r\n");
}

fn build_offer(s: &SyntheticSession, ip: &str) -> String {
    let mut sdp = String::new();
    session_header(&mut sdp, ip, &["0", "1"]);

    let media = [
        ("0", "audio", "111", "opus/48000/2", config::AUDIO_LABEL),
        ("1", "video", "96",  "VP8/90000",    config::VIDEO_LABEL),
    ];
    for (mid, kind, pt, codec, label) in media {
        sdp.push_str(&format!("m={} {} UDP/TLS/RTP/SAVPF {}\r\n", kind, s.port, pt));
        transport_lines(&mut sdp, s, ip, "actpass");
        sdp.push_str(&format!("a=mid:{}\r\n", mid));
        sdp.push_str(&format!("a=rtpmap:{} {}\r\n", pt, codec));
        sdp.push_str(&format!("a=msid:{} {}\r\n", config::STREAM_ID, label));
    }
    sdp
}

fn build_answer(offer: &str, s: &SyntheticSession, ip: &str) -> String {
    let sections = media_sections(offer);
    let bundle: Vec<&str> = sections.iter().map(|sec| sec.mid.as_str()).collect();

    let mut sdp = String::new();
    session_header(&mut sdp, ip, &bundle);

    for sec in &sections {
        // 포트만 로컬 포트로 교체
        let parts: Vec<&str> = sec.m_line.splitn(4, ' ').collect();
        let m_line = if parts.len() == 4 {
            format!("{} {} {} {}", parts[0], s.port, parts[2], parts[3])
        } else {
            sec.m_line.clone()
        };
        sdp.push_str(&m_line);
        sdp.push_str("\r\n");
        transport_lines(&mut sdp, s, ip, "active");
        for line in &sec.codec_lines {
            sdp.push_str(line);
            sdp.push_str("\r\n");
        }
    }
    sdp
}

fn host_candidate(ip: &str, port: u16) -> String {
    format!("candidate:1 1 udp 2113937151 {} {} typ host generation 0", ip, port)
}

fn random_fingerprint() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(":")
}

fn failed(op: EngineOp, reason: &str) -> EngineEvent {
    EngineEvent::Failed { op, reason: reason.to_string() }
}

/// 라우팅 테이블 기반 로컬 IP 자동 감지
/// UDP 소켓으로 8.8.8.8:80 connect (실제 패킷 없음) → local_addr() 조회
pub fn detect_local_ip() -> String {
    use std::net::UdpSocket;
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| { s.connect("8.8.8.8:80")?; s.local_addr() })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| {
            warn!("[engine] 로컬 IP 감지 실패: 127.0.0.1 폴백");
            "127.0.0.1".to_string()
        })
}
