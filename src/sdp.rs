// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session description extraction (§6.2) — reads RTP parameters, RTP
//! capabilities, and DTLS parameters out of a client-supplied SDP offer or
//! answer. No SDP crate exists anywhere in the teacher's or the pack's
//! dependency stacks, so this is a hand-rolled line scanner over the
//! narrow, fixed input shape the core actually needs, in the same spirit
//! as the teacher's hand-rolled JSON field extraction for upstream
//! responses.

use crate::engine::{DtlsParameters, RtpCapabilities, RtpParameters};

pub struct ExtractedSession {
    pub rtp_parameters: RtpParameters,
    pub rtp_capabilities: RtpCapabilities,
    pub dtls_parameters: DtlsParameters,
}

/// Slice of SDP lines belonging to the first `m=audio` section.
fn audio_section(lines: &[&str]) -> Option<&[&str]> {
    let start = lines.iter().position(|l| l.starts_with("m=audio"))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("m="))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());
    Some(&lines[start..end])
}

fn payload_types(m_line: &str) -> Vec<u8> {
    m_line.split_whitespace().skip(3).filter_map(|tok| tok.parse().ok()).collect()
}

/// Parses `a=rtpmap:<pt> <encoding>/<clockRate>[/<channels>]`.
fn parse_rtpmap(line: &str) -> Option<(u8, String, u32, u8)> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let (pt_str, desc) = rest.split_once(' ')?;
    let pt = pt_str.trim().parse().ok()?;
    let mut parts = desc.trim().splitn(3, '/');
    let encoding = parts.next()?.to_owned();
    let clock_rate: u32 = parts.next()?.parse().ok()?;
    let channels: u8 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(1);
    Some((pt, encoding, clock_rate, channels))
}

fn parse_fmtp_useinbandfec(section: &[&str], pt: u8) -> bool {
    let prefix = format!("a=fmtp:{pt} ");
    section
        .iter()
        .find_map(|l| l.strip_prefix(&prefix))
        .map(|params| {
            params
                .split(';')
                .filter_map(|kv| kv.split_once('='))
                .any(|(k, v)| k.trim().eq_ignore_ascii_case("useinbandfec") && v.trim() == "1")
        })
        .unwrap_or(false)
}

fn has_simulcast_send(section: &[&str]) -> bool {
    section.iter().any(|l| l.starts_with("a=simulcast:send"))
}

fn parse_fingerprint(lines: &[&str]) -> Option<(String, String)> {
    lines.iter().find_map(|l| {
        let rest = l.strip_prefix("a=fingerprint:")?;
        let (algo, value) = rest.split_once(' ')?;
        Some((algo.to_owned(), value.trim().to_owned()))
    })
}

fn parse_setup_role(lines: &[&str]) -> String {
    lines
        .iter()
        .find_map(|l| l.strip_prefix("a=setup:"))
        .map(str::to_owned)
        .unwrap_or_else(|| "actpass".to_owned())
}

/// Extracts RTP parameters/capabilities and DTLS parameters from the first
/// audio m-section. Returns `None` (surfaced by the hub as `error{400}`) if
/// there is no audio section, or the client's only codecs are non-opus.
pub fn extract_session(sdp: &str) -> Option<ExtractedSession> {
    let lines: Vec<&str> = sdp.lines().map(str::trim).collect();
    let section = audio_section(&lines)?;
    let m_line = section.first()?;
    let pts = payload_types(m_line);

    let rtpmaps: Vec<(u8, String, u32, u8)> =
        section.iter().filter_map(|l| parse_rtpmap(l)).collect();

    let opus_pt = pts.iter().find_map(|pt| {
        rtpmaps
            .iter()
            .find(|(rpt, encoding, _, _)| rpt == pt && encoding.eq_ignore_ascii_case("opus"))
    })?;

    let payload_type = opus_pt.0;
    let clock_rate = opus_pt.2;
    let channels = opus_pt.3;
    let use_inband_fec = parse_fmtp_useinbandfec(section, payload_type);
    let encodings = if has_simulcast_send(section) {
        vec!["low".to_owned(), "mid".to_owned(), "high".to_owned()]
    } else {
        Vec::new()
    };

    let mut codecs: Vec<String> = Vec::new();
    for (_, encoding, _, _) in &rtpmaps {
        if !codecs.iter().any(|c| c.eq_ignore_ascii_case(encoding)) {
            codecs.push(encoding.clone());
        }
    }

    let header_extensions: Vec<String> = section
        .iter()
        .filter_map(|l| l.strip_prefix("a=extmap:"))
        .filter_map(|rest| rest.split_whitespace().nth(1))
        .map(str::to_owned)
        .collect();

    // Fingerprint/setup are commonly declared once at session level and
    // shared across all m-sections (BUNDLE); search the whole document,
    // not just the audio section, but prefer an in-section declaration.
    let (fingerprint_algorithm, fingerprint_value) =
        parse_fingerprint(section).or_else(|| parse_fingerprint(&lines))?;
    let role = parse_setup_role(section);
    let role = if section.iter().any(|l| l.starts_with("a=setup:")) {
        role
    } else {
        parse_setup_role(&lines)
    };

    Some(ExtractedSession {
        rtp_parameters: RtpParameters { payload_type, clock_rate, channels, use_inband_fec, encodings },
        rtp_capabilities: RtpCapabilities { codecs, header_extensions },
        dtls_parameters: DtlsParameters { role, fingerprint_algorithm, fingerprint_value },
    })
}

#[cfg(test)]
#[path = "sdp_tests.rs"]
mod tests;
